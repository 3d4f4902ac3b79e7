//! Host object <-> variable mapping conversion.
//!
//! A [`Codec`] knows how to flatten one host type into named string
//! variables and how to fold such variables back into the object. The bridge
//! never looks inside host objects; everything it moves is text.

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Errors raised while converting between host objects and variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("invalid variable name '{name}'")]
    InvalidName { name: String },

    #[error("variable '{name}' missing from mapping")]
    Missing { name: String },

    #[error("variable '{name}' holds unparseable value '{value}': {reason}")]
    Parse {
        name: String,
        value: String,
        reason: String,
    },

    #[error("variable '{name}' has invalid length {len} (max {max})")]
    TooLong { name: String, len: usize, max: usize },

    #[error("variable '{name}' is not valid UTF-8 text")]
    NotUtf8 { name: String },

    #[error("{0}")]
    Custom(String),
}

/// Ordered (name, text) pairs crossing the host/script boundary.
///
/// Names are unique: inserting an existing name replaces its value in place
/// and keeps the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableMapping {
    entries: Vec<(String, String)>,
}

impl VariableMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace a variable, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(existing, value));
        }
        self.entries.push((name, value));
        None
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get), but a missing name is a [`MarshalError`].
    pub fn require(&self, name: &str) -> Result<&str, MarshalError> {
        self.get(name).ok_or_else(|| MarshalError::Missing {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for VariableMapping {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (name, value) in iter {
            mapping.insert(name, value);
        }
        mapping
    }
}

impl IntoIterator for VariableMapping {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Per-type conversion contract between a host object and its variables.
///
/// `to_external` must be a pure function of the object: the bridge calls it
/// once before injection and again before extraction to learn which variables
/// to read back.
pub trait Codec<T: ?Sized> {
    fn to_external(&self, object: &T) -> Result<VariableMapping, MarshalError>;

    fn from_external(&self, object: &mut T, mapping: &VariableMapping) -> Result<(), MarshalError>;
}

/// A host type that acts as its own codec.
///
/// Usually implemented through [`variable_codec!`](crate::variable_codec).
pub trait Variables {
    fn to_variables(&self) -> Result<VariableMapping, MarshalError>;

    fn update_from_variables(&mut self, mapping: &VariableMapping) -> Result<(), MarshalError>;
}

/// Adapts any [`Variables`] type to the [`Codec`] interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfCodec;

impl<T: Variables + ?Sized> Codec<T> for SelfCodec {
    fn to_external(&self, object: &T) -> Result<VariableMapping, MarshalError> {
        object.to_variables()
    }

    fn from_external(&self, object: &mut T, mapping: &VariableMapping) -> Result<(), MarshalError> {
        object.update_from_variables(mapping)
    }
}

/// Whether `name` can be used as a top-level Lua variable.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !LUA_KEYWORDS.contains(&name)
}

pub fn validate_identifier(name: &str) -> Result<(), MarshalError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(MarshalError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Render a field value as variable text.
pub fn encode_value<T: Display + ?Sized>(value: &T) -> String {
    value.to_string()
}

/// Parse the variable `name` from `mapping` into a field value.
pub fn decode_value<T>(mapping: &VariableMapping, name: &str) -> Result<T, MarshalError>
where
    T: FromStr,
    T::Err: Display,
{
    let text = mapping.require(name)?;
    text.parse::<T>().map_err(|err| MarshalError::Parse {
        name: name.to_string(),
        value: text.to_string(),
        reason: err.to_string(),
    })
}

/// Reject text longer than `max` bytes for the variable `name`.
pub fn check_len(name: &str, text: &str, max: usize) -> Result<(), MarshalError> {
    if text.len() > max {
        return Err(MarshalError::TooLong {
            name: name.to_string(),
            len: text.len(),
            max,
        });
    }
    Ok(())
}

/// Implement [`Variables`] for a struct from a field table.
///
/// Each field becomes the variable `<Prefix>_<Name>`. Field types need
/// `Display` and `FromStr`. An optional `(max_len = N)` rejects longer text
/// during extraction.
///
/// ```ignore
/// scriptbridge::variable_codec! {
///     Sensor as "Sensor" {
///         reading => "Reading",
///         label => "Label" (max_len = 16),
///     }
/// }
/// ```
///
/// Fields are updated in table order; a failure leaves earlier fields updated.
#[macro_export]
macro_rules! variable_codec {
    ($ty:ty as $prefix:literal { $( $field:ident => $name:literal $( (max_len = $max:expr) )? ),* $(,)? }) => {
        impl $crate::codec::Variables for $ty {
            fn to_variables(
                &self,
            ) -> ::std::result::Result<$crate::codec::VariableMapping, $crate::codec::MarshalError> {
                let mut mapping = $crate::codec::VariableMapping::new();
                $(
                    mapping.insert(
                        concat!($prefix, "_", $name),
                        $crate::codec::encode_value(&self.$field),
                    );
                )*
                ::std::result::Result::Ok(mapping)
            }

            fn update_from_variables(
                &mut self,
                mapping: &$crate::codec::VariableMapping,
            ) -> ::std::result::Result<(), $crate::codec::MarshalError> {
                $(
                    $(
                        $crate::codec::check_len(
                            concat!($prefix, "_", $name),
                            mapping.require(concat!($prefix, "_", $name))?,
                            $max,
                        )?;
                    )?
                    self.$field = $crate::codec::decode_value(mapping, concat!($prefix, "_", $name))?;
                )*
                ::std::result::Result::Ok(())
            }
        }
    };
}
