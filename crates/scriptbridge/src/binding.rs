//! Object bindings: a host object paired with the codec that moves it.
//!
//! Host objects are shared with the caller through [`SharedObject`], so the
//! caller keeps a handle and observes extracted values once the cycle ends.

use crate::codec::{Codec, SelfCodec, VariableMapping, Variables};
use crate::error::{BridgeError, Result};
use crate::runtime::Namespace;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A host object reachable from both the caller and a binding.
pub type SharedObject<T> = Arc<Mutex<T>>;

/// Wrap `object` for use in a binding.
pub fn shared<T>(object: T) -> SharedObject<T> {
    Arc::new(Mutex::new(object))
}

/// One object taking part in an execution cycle.
///
/// `inject` runs before the main script and `extract` after it. Bindings
/// are processed in the order they were supplied.
pub trait Binding: Send {
    /// Name used in log events and lock errors.
    fn label(&self) -> &str;

    fn inject(&mut self, namespace: &Namespace<'_>) -> Result<()>;

    fn extract(&mut self, namespace: &Namespace<'_>) -> Result<()>;
}

/// Binding of a shared host object through a [`Codec`].
pub struct ObjectBinding<T, C> {
    object: SharedObject<T>,
    codec: C,
    label: String,
}

impl<T, C> fmt::Debug for ObjectBinding<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBinding")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<T, C> ObjectBinding<T, C>
where
    T: Send + 'static,
    C: Codec<T> + Send + 'static,
{
    pub fn new(object: SharedObject<T>, codec: C) -> Self {
        Self {
            object,
            codec,
            label: std::any::type_name::<T>().to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn boxed(self) -> Box<dyn Binding> {
        Box::new(self)
    }

    pub fn object(&self) -> &SharedObject<T> {
        &self.object
    }

    fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.object
            .lock()
            .map_err(|_| BridgeError::LockPoisoned(self.label.clone()))
    }
}

impl<T> ObjectBinding<T, SelfCodec>
where
    T: Variables + Send + 'static,
{
    /// Bind a type that is its own codec.
    pub fn from_variables(object: SharedObject<T>) -> Self {
        Self::new(object, SelfCodec)
    }
}

impl<T, C> Binding for ObjectBinding<T, C>
where
    T: Send + 'static,
    C: Codec<T> + Send + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn inject(&mut self, namespace: &Namespace<'_>) -> Result<()> {
        let mapping = {
            let object = self.lock()?;
            self.codec.to_external(&object)?
        };
        for (name, value) in mapping.iter() {
            namespace.set_text(name, value)?;
        }
        tracing::debug!(binding = %self.label, variables = mapping.len(), "injected binding");
        Ok(())
    }

    fn extract(&mut self, namespace: &Namespace<'_>) -> Result<()> {
        let mut object = self.lock()?;
        let names = self.codec.to_external(&object)?;

        let mut refreshed = VariableMapping::with_capacity(names.len());
        for name in names.names() {
            refreshed.insert(name, namespace.stringify(name)?);
        }

        self.codec.from_external(&mut object, &refreshed)?;
        tracing::debug!(binding = %self.label, variables = refreshed.len(), "extracted binding");
        Ok(())
    }
}
