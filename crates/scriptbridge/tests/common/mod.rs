//! Shared host types and codecs for the integration tests.

#![allow(dead_code)]

use scriptbridge::{
    Binding, BridgeConfig, Codec, MarshalError, ObjectBinding, ScriptBridge, SharedObject,
    VariableMapping, shared,
};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Greeting: exposes SRC and DST as bare globals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Greeting {
    pub src: String,
    pub dst: String,
}

impl Greeting {
    pub fn from_src(src: &str) -> Self {
        Self {
            src: src.to_string(),
            dst: String::new(),
        }
    }
}

pub struct GreetingCodec;

impl Codec<Greeting> for GreetingCodec {
    fn to_external(&self, object: &Greeting) -> Result<VariableMapping, MarshalError> {
        let mut mapping = VariableMapping::new();
        mapping.insert("SRC", object.src.as_str());
        mapping.insert("DST", object.dst.as_str());
        Ok(mapping)
    }

    fn from_external(&self, object: &mut Greeting, mapping: &VariableMapping) -> Result<(), MarshalError> {
        object.src = mapping.require("SRC")?.to_string();
        object.dst = mapping.require("DST")?.to_string();
        Ok(())
    }
}

pub fn greeting_binding(greeting: &SharedObject<Greeting>) -> Box<dyn Binding> {
    ObjectBinding::new(Arc::clone(greeting), GreetingCodec)
        .with_label("greeting")
        .boxed()
}

// ---------------------------------------------------------------------------
// Recording codec: logs every codec call in order
// ---------------------------------------------------------------------------

pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default)]
pub struct Tagged {
    pub value: String,
}

pub struct RecordingCodec {
    pub tag: &'static str,
    pub log: CallLog,
}

impl RecordingCodec {
    fn variable(&self) -> String {
        format!("{}_Value", self.tag)
    }
}

impl Codec<Tagged> for RecordingCodec {
    fn to_external(&self, object: &Tagged) -> Result<VariableMapping, MarshalError> {
        self.log.lock().unwrap().push(format!("{}.to", self.tag));
        let mut mapping = VariableMapping::new();
        mapping.insert(self.variable(), object.value.as_str());
        Ok(mapping)
    }

    fn from_external(&self, object: &mut Tagged, mapping: &VariableMapping) -> Result<(), MarshalError> {
        self.log.lock().unwrap().push(format!("{}.from", self.tag));
        object.value = mapping.require(&self.variable())?.to_string();
        Ok(())
    }
}

pub fn recording_binding(tag: &'static str, log: &CallLog) -> (SharedObject<Tagged>, Box<dyn Binding>) {
    let object = shared(Tagged::default());
    let binding = ObjectBinding::new(
        Arc::clone(&object),
        RecordingCodec {
            tag,
            log: Arc::clone(log),
        },
    )
    .with_label(tag)
    .boxed();
    (object, binding)
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Bridge builders
// ---------------------------------------------------------------------------

/// A bridge whose selector always picks `key`, with `body` registered under it.
pub fn bridge_running(key: &str, body: &str) -> ScriptBridge {
    bridge_running_with(BridgeConfig::default(), key, body)
}

pub fn bridge_running_with(config: BridgeConfig, key: &str, body: &str) -> ScriptBridge {
    let selector_variable = config.selector_variable.clone();
    let mut bridge = ScriptBridge::new(config).expect("bridge should initialize");
    bridge.register_script(key, body);
    bridge.set_selector_script(format!("{selector_variable} = {key:?}"));
    bridge
}
