//! Lua runtime lifecycle and the shared namespace.
//!
//! [`ScriptRuntime`] owns the one Lua state used by a bridge. It is built
//! uninitialized; [`ScriptRuntime::initialize`] creates the state on first
//! call and is a no-op afterward. The globals table of that state is the
//! namespace every script runs against; it persists across executions.

use crate::codec::{MarshalError, validate_identifier};
use crate::config::{BridgeConfig, LuaLibrary};
use crate::error::{BridgeError, Result};
use crate::fault::{self, FaultStage};
use mlua::{Function, Lua, LuaOptions, RegistryKey, String as LuaString, Value as LuaValue};
use std::fmt;

struct RuntimeState {
    lua: Lua,
    /// The base library `tostring`, captured before any script runs.
    tostring: RegistryKey,
}

/// Owner of the embedded Lua state.
pub struct ScriptRuntime {
    libraries: Vec<LuaLibrary>,
    memory_limit: Option<usize>,
    state: Option<RuntimeState>,
}

impl fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("libraries", &self.libraries)
            .field("memory_limit", &self.memory_limit)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

fn init_error(err: mlua::Error) -> BridgeError {
    BridgeError::Initialization(err.to_string())
}

impl ScriptRuntime {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            libraries: config.libraries.clone(),
            memory_limit: config.memory_limit_bytes,
            state: None,
        }
    }

    /// Create the Lua state if it does not exist yet.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }

        let lua = Lua::new_with(LuaLibrary::combine(&self.libraries), LuaOptions::new())
            .map_err(init_error)?;
        if let Some(limit) = self.memory_limit {
            lua.set_memory_limit(limit).map_err(init_error)?;
        }
        let tostring = {
            let function: Function = lua.globals().get("tostring").map_err(init_error)?;
            lua.create_registry_value(function).map_err(init_error)?
        };

        self.state = Some(RuntimeState { lua, tostring });
        tracing::info!(
            libraries = ?self.libraries,
            memory_limit = ?self.memory_limit,
            "script runtime initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Drop the Lua state. A later [`initialize`](Self::initialize) starts
    /// from an empty namespace.
    pub fn teardown(&mut self) {
        if self.state.take().is_some() {
            tracing::info!("script runtime torn down");
        }
    }

    fn state(&self) -> Result<&RuntimeState> {
        self.state.as_ref().ok_or(BridgeError::NotInitialized)
    }

    pub fn namespace(&self) -> Result<Namespace<'_>> {
        let state = self.state()?;
        Ok(Namespace {
            lua: &state.lua,
            tostring: &state.tostring,
        })
    }

    /// Run `source` against the globals table.
    ///
    /// `chunk_name` shows up in fault positions and tracebacks.
    pub fn exec(&self, chunk_name: &str, source: &str, stage: FaultStage) -> Result<()> {
        let state = self.state()?;
        tracing::trace!(chunk = chunk_name, %stage, "running chunk");
        state
            .lua
            .load(source)
            .set_name(format!("={chunk_name}"))
            .exec()
            .map_err(|err| fault::translate(stage, &err))
    }
}

/// A native value placed in the namespace outside the binding mechanism.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl From<bool> for ConstantValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for ConstantValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for ConstantValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for ConstantValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ConstantValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ConstantValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ConstantValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Handle on the globals table of an initialized runtime.
///
/// Names are checked against Lua identifier rules before any access.
pub struct Namespace<'a> {
    lua: &'a Lua,
    tostring: &'a RegistryKey,
}

impl<'a> Namespace<'a> {
    /// Set a global to a string value.
    pub fn set_text(&self, name: &str, value: &str) -> Result<()> {
        validate_identifier(name)?;
        self.lua
            .globals()
            .set(name, value)
            .map_err(|err| fault::translate(FaultStage::Injection, &err))
    }

    /// Set a global to a native value.
    pub fn set_constant(&self, name: &str, value: &ConstantValue) -> Result<()> {
        validate_identifier(name)?;
        let globals = self.lua.globals();
        let result = match value {
            ConstantValue::Nil => globals.set(name, LuaValue::Nil),
            ConstantValue::Boolean(flag) => globals.set(name, *flag),
            ConstantValue::Integer(number) => globals.set(name, *number),
            ConstantValue::Number(number) => globals.set(name, *number),
            ConstantValue::Text(text) => globals.set(name, text.as_str()),
        };
        result.map_err(|err| fault::translate(FaultStage::Constant, &err))
    }

    /// Force `name` to its string form inside Lua and return that string.
    ///
    /// The global is rebound to the converted string, so the namespace holds
    /// exactly what the host read.
    pub fn stringify(&self, name: &str) -> Result<String> {
        validate_identifier(name)?;
        let globals = self.lua.globals();
        let value: LuaValue = globals
            .get(name)
            .map_err(|err| fault::translate(FaultStage::Extraction, &err))?;
        let text = self.to_text(name, value, FaultStage::Extraction)?;
        globals
            .set(name, text.as_str())
            .map_err(|err| fault::translate(FaultStage::Extraction, &err))?;
        Ok(text)
    }

    /// Read a global as text without rebinding it; `None` when it is nil.
    pub fn get_text(&self, name: &str) -> Result<Option<String>> {
        validate_identifier(name)?;
        let value: LuaValue = self
            .lua
            .globals()
            .get(name)
            .map_err(|err| fault::translate(FaultStage::Extraction, &err))?;
        if value.is_nil() {
            return Ok(None);
        }
        self.to_text(name, value, FaultStage::Extraction).map(Some)
    }

    pub fn clear(&self, name: &str) -> Result<()> {
        self.set_constant(name, &ConstantValue::Nil)
    }

    fn to_text(&self, name: &str, value: LuaValue<'a>, stage: FaultStage) -> Result<String> {
        let tostring: Function = self
            .lua
            .registry_value(self.tostring)
            .map_err(|err| fault::translate(stage, &err))?;
        let text: LuaString = tostring
            .call(value)
            .map_err(|err| fault::translate(stage, &err))?;
        let text = text.to_str().map_err(|_| MarshalError::NotUtf8 {
            name: name.to_string(),
        })?;
        Ok(text.to_owned())
    }
}
