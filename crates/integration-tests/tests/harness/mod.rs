#![allow(dead_code)]

pub mod mock_tgi;

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tracing::Level;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use weft_hf::{GeneratorParams, HfApiChatGenerator, HfApiType};

/// Construction parameters for a TGI generator at `url`, without credentials
pub fn tgi_params(url: &str) -> GeneratorParams {
    GeneratorParams::new(HfApiType::TextGenerationInference, object(json!({ "url": url }))).with_token(None)
}

/// A TGI generator at `url`, without credentials
pub fn tgi_generator(url: &str) -> HfApiChatGenerator {
    HfApiChatGenerator::new(tgi_params(url)).unwrap()
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Records the level and message of every event emitted while installed
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{value:?}"));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.0.lock().unwrap().push((*event.metadata().level(), message));
    }
}

impl CapturedLogs {
    /// Messages logged at warn level
    pub fn warnings(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == Level::WARN)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// A subscriber that feeds this capture, for `with_default` / `set_default`
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        Registry::default().with(self.clone())
    }
}
