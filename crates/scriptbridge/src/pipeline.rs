//! One execution cycle, run as an explicit state machine.
//!
//! ```text
//! Idle -> SelectorBound -> SelectorRun -> Selected -> MainBound -> MainRun -> Extracted -> Idle
//! ```
//!
//! Any failure returns straight to `Idle`. The namespace is left as the
//! scripts made it in both cases.

use crate::binding::{Binding, ObjectBinding, shared};
use crate::codec::{Codec, MarshalError, VariableMapping};
use crate::error::{BridgeError, Result};
use crate::fault::FaultStage;
use crate::registry::ScriptRegistry;
use crate::runtime::ScriptRuntime;
use std::fmt;

/// Chunk name given to the selector script.
const SELECTOR_CHUNK: &str = "selector";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SelectorBound,
    SelectorRun,
    Selected,
    MainBound,
    MainRun,
    Extracted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SelectorBound => "selector_bound",
            Self::SelectorRun => "selector_run",
            Self::Selected => "selected",
            Self::MainBound => "main_bound",
            Self::MainRun => "main_run",
            Self::Extracted => "extracted",
        };
        f.write_str(name)
    }
}

/// The entity the selector script fills in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSelector {
    pub name: String,
}

/// Moves a [`ScriptSelector`] through a configurable global.
#[derive(Debug, Clone)]
pub(crate) struct SelectorCodec {
    variable: String,
}

impl SelectorCodec {
    pub(crate) fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Codec<ScriptSelector> for SelectorCodec {
    fn to_external(&self, object: &ScriptSelector) -> std::result::Result<VariableMapping, MarshalError> {
        let mut mapping = VariableMapping::with_capacity(1);
        mapping.insert(self.variable.as_str(), object.name.as_str());
        Ok(mapping)
    }

    fn from_external(
        &self,
        object: &mut ScriptSelector,
        mapping: &VariableMapping,
    ) -> std::result::Result<(), MarshalError> {
        object.name = mapping.require(&self.variable)?.to_string();
        Ok(())
    }
}

pub(crate) struct ExecutionPipeline<'a> {
    runtime: &'a ScriptRuntime,
    registry: &'a ScriptRegistry,
    selector_variable: &'a str,
    state: PipelineState,
}

impl<'a> ExecutionPipeline<'a> {
    pub(crate) fn new(
        runtime: &'a ScriptRuntime,
        registry: &'a ScriptRegistry,
        selector_variable: &'a str,
    ) -> Self {
        Self {
            runtime,
            registry,
            selector_variable,
            state: PipelineState::Idle,
        }
    }

    pub(crate) fn state(&self) -> PipelineState {
        self.state
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::trace!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }

    /// Run one cycle over `bindings` and return the key of the script that ran.
    pub(crate) fn run(&mut self, bindings: &mut [Box<dyn Binding>]) -> Result<String> {
        let result = self.cycle(bindings);
        self.advance(PipelineState::Idle);
        result
    }

    fn cycle(&mut self, bindings: &mut [Box<dyn Binding>]) -> Result<String> {
        let runtime = self.runtime;
        let registry = self.registry;
        let namespace = runtime.namespace()?;

        let selector = shared(ScriptSelector::default());
        let mut selector_binding =
            ObjectBinding::new(selector.clone(), SelectorCodec::new(self.selector_variable))
                .with_label(SELECTOR_CHUNK);
        selector_binding.inject(&namespace)?;
        self.advance(PipelineState::SelectorBound);

        runtime.exec(SELECTOR_CHUNK, registry.selector_script(), FaultStage::Selector)?;
        self.advance(PipelineState::SelectorRun);

        selector_binding.extract(&namespace)?;
        let key = selector
            .lock()
            .map_err(|_| BridgeError::LockPoisoned(SELECTOR_CHUNK.to_string()))?
            .name
            .clone();
        let Some(body) = registry.lookup(&key) else {
            tracing::warn!(script = %key, "selector chose an unregistered script");
            return Err(BridgeError::SelectorResolution { key });
        };
        tracing::Span::current().record("script", key.as_str());
        self.advance(PipelineState::Selected);

        for binding in bindings.iter_mut() {
            binding.inject(&namespace)?;
        }
        self.advance(PipelineState::MainBound);

        runtime.exec(&key, body, FaultStage::Main)?;
        self.advance(PipelineState::MainRun);

        for binding in bindings.iter_mut() {
            binding.extract(&namespace)?;
        }
        self.advance(PipelineState::Extracted);

        Ok(key)
    }
}
