//! The public facade tying runtime, registry and pipeline together.

use crate::binding::Binding;
use crate::config::{BindingRetention, BridgeConfig};
use crate::error::Result;
use crate::pipeline::{ExecutionPipeline, PipelineState};
use crate::registry::ScriptRegistry;
use crate::runtime::{ConstantValue, Namespace, ScriptRuntime};
use std::fmt;

/// Host side of the script bridge.
///
/// Register scripts and a selector script once, then per cycle bind objects
/// and call [`execute`](Self::execute). The Lua namespace outlives cycles:
/// globals set by one script are visible to the next.
pub struct ScriptBridge {
    config: BridgeConfig,
    runtime: ScriptRuntime,
    registry: ScriptRegistry,
    bound: Vec<Box<dyn Binding>>,
    cycles: u64,
}

impl fmt::Debug for ScriptBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("config", &self.config)
            .field("runtime", &self.runtime)
            .field("scripts", &self.registry.len())
            .field("bound", &self.bound.len())
            .field("cycles", &self.cycles)
            .finish()
    }
}

impl ScriptBridge {
    /// Validate `config` and initialize the runtime.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let mut runtime = ScriptRuntime::new(&config);
        runtime.initialize()?;
        Ok(Self {
            config,
            runtime,
            registry: ScriptRegistry::new(),
            bound: Vec::new(),
            cycles: 0,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(BridgeConfig::default())
    }

    pub fn register_script(&mut self, key: impl Into<String>, body: impl Into<String>) {
        self.registry.register(key, body);
    }

    pub fn set_selector_script(&mut self, body: impl Into<String>) {
        self.registry.set_selector_script(body);
    }

    /// Replace the objects bound for the next cycle.
    pub fn bind_objects(&mut self, bindings: Vec<Box<dyn Binding>>) {
        if !self.bound.is_empty() {
            tracing::debug!(discarded = self.bound.len(), "replacing unexecuted bindings");
        }
        self.bound = bindings;
    }

    /// Append one object to the next cycle.
    pub fn bind(&mut self, binding: Box<dyn Binding>) {
        tracing::trace!(binding = %binding.label(), "bound object");
        self.bound.push(binding);
    }

    /// Run one cycle: selector, main script, extraction.
    ///
    /// Bound objects are consumed by the cycle. After a failure they are
    /// kept only under [`BindingRetention::RetainOnFailure`].
    ///
    /// Extraction stops at the first failing binding. Objects extracted
    /// before it keep their new values.
    pub fn execute(&mut self) -> Result<()> {
        self.cycles += 1;
        let span = tracing::debug_span!(
            "execute",
            cycle = self.cycles,
            bound = self.bound.len(),
            script = tracing::field::Empty
        );
        let _enter = span.enter();

        let mut bindings = std::mem::take(&mut self.bound);
        let mut pipeline = ExecutionPipeline::new(
            &self.runtime,
            &self.registry,
            &self.config.selector_variable,
        );
        let result = pipeline.run(&mut bindings);
        debug_assert_eq!(pipeline.state(), PipelineState::Idle);

        match result {
            Ok(key) => {
                tracing::debug!(script = %key, "execution cycle complete");
                Ok(())
            }
            Err(err) => {
                if self.config.binding_retention == BindingRetention::RetainOnFailure {
                    tracing::debug!(retained = bindings.len(), "keeping bindings after failed cycle");
                    self.bound = bindings;
                }
                Err(err)
            }
        }
    }

    /// Set a global outside the binding mechanism. It stays until a script or
    /// a later call overwrites it.
    pub fn add_global_constant(&mut self, name: &str, value: impl Into<ConstantValue>) -> Result<()> {
        let value = value.into();
        self.runtime.namespace()?.set_constant(name, &value)?;
        tracing::debug!(constant = name, "global constant set");
        Ok(())
    }

    /// Drop bound objects that have not been executed.
    pub fn reset(&mut self) {
        if !self.bound.is_empty() {
            tracing::debug!(discarded = self.bound.len(), "reset bindings");
        }
        self.bound.clear();
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn namespace(&self) -> Result<Namespace<'_>> {
        self.runtime.namespace()
    }

    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of `execute` calls so far, failed ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ObjectBinding, shared};
    use crate::error::{BridgeError, ErrorKind};

    #[derive(Debug, Default)]
    struct Cell {
        value: String,
    }

    crate::variable_codec! {
        Cell as "Cell" {
            value => "Value",
        }
    }

    fn cell_binding() -> Box<dyn Binding> {
        ObjectBinding::from_variables(shared(Cell::default())).boxed()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = BridgeConfig {
            selector_variable: "1st".to_string(),
            ..BridgeConfig::default()
        };
        let err = ScriptBridge::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn with_defaults_initializes_runtime() {
        let bridge = ScriptBridge::with_defaults().unwrap();
        assert!(bridge.runtime().is_initialized());
        assert_eq!(bridge.config().selector_variable, "ScriptSelector_Name");
        assert_eq!(bridge.cycles(), 0);
        assert!(bridge.registry().is_empty());
    }

    #[test]
    fn bind_appends_and_bind_objects_replaces() {
        let mut bridge = ScriptBridge::with_defaults().unwrap();
        bridge.bind(cell_binding());
        bridge.bind(cell_binding());
        assert_eq!(bridge.bound_count(), 2);
        bridge.bind_objects(vec![cell_binding()]);
        assert_eq!(bridge.bound_count(), 1);
        bridge.reset();
        assert_eq!(bridge.bound_count(), 0);
    }

    #[test]
    fn cycles_count_failed_attempts() {
        let mut bridge = ScriptBridge::with_defaults().unwrap();
        bridge.register_script("ok", "");
        bridge.set_selector_script(r#"ScriptSelector_Name = "ok""#);
        bridge.execute().unwrap();
        bridge.set_selector_script(r#"ScriptSelector_Name = "nope""#);
        assert!(matches!(
            bridge.execute(),
            Err(BridgeError::SelectorResolution { .. })
        ));
        assert_eq!(bridge.cycles(), 2);
    }

    #[test]
    fn success_consumes_bindings() {
        let mut bridge = ScriptBridge::with_defaults().unwrap();
        bridge.register_script("ok", "");
        bridge.set_selector_script(r#"ScriptSelector_Name = "ok""#);
        bridge.bind(cell_binding());
        bridge.execute().unwrap();
        assert_eq!(bridge.bound_count(), 0);
    }

    #[test]
    fn add_global_constant_validates_name() {
        let mut bridge = ScriptBridge::with_defaults().unwrap();
        bridge.add_global_constant("Limit", 3).unwrap();
        assert_eq!(
            bridge.namespace().unwrap().get_text("Limit").unwrap(),
            Some("3".to_string())
        );
        let err = bridge.add_global_constant("for", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Marshal);
    }
}
