//! scriptbridge: run externally-authored Lua snippets against host objects
//!
//! Scripts never see host memory. Host objects cross the boundary as named
//! string variables in the Lua globals table, and come back the same way.
//!
//! # Architecture
//!
//! ```text
//! Codec ─► ObjectBinding ─► inject ─► Namespace (Lua globals)
//!                                         │
//! ScriptRegistry ─► selector script ─► main script
//!                                         │
//!            host object ◄─ from_external ◄─ tostring ◄─ extract
//! ```
//!
//! # Modules
//!
//! - `codec`: `Codec` trait, `VariableMapping`, value helpers, `variable_codec!`
//! - `binding`: `ObjectBinding`, the type-erased `Binding` trait
//! - `registry`: selector key to script body map, plus the selector script
//! - `runtime`: Lua state lifecycle and the `Namespace` handle
//! - `pipeline`: one selector + main execution cycle
//! - `fault`: Lua fault capture and diagnostic formatting
//! - `bridge`: `ScriptBridge`, the public facade
//! - `config`: TOML configuration
//! - `logging`: tracing subscriber setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod binding;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod fault;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod runtime;

pub use binding::{Binding, ObjectBinding, SharedObject, shared};
pub use bridge::ScriptBridge;
pub use codec::{Codec, MarshalError, SelfCodec, VariableMapping, Variables};
pub use config::{BindingRetention, BridgeConfig, ConfigError, LuaLibrary};
pub use error::{BridgeError, ErrorKind, Result};
pub use fault::{FaultStage, FaultState, TraceCapture};
pub use pipeline::{PipelineState, ScriptSelector};
pub use registry::ScriptRegistry;
pub use runtime::{ConstantValue, Namespace, ScriptRuntime};
