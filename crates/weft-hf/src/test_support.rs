//! Log capture for unit tests

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// Records the level of every event emitted while installed
#[derive(Clone, Default)]
pub struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

impl<S: tracing::Subscriber> Layer<S> for LevelRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}

impl LevelRecorder {
    pub fn warnings(&self) -> usize {
        self.0.lock().unwrap().iter().filter(|l| **l == Level::WARN).count()
    }
}

/// Run `f` with a recorder installed as the thread's subscriber
pub fn with_recorder<T>(f: impl FnOnce() -> T) -> (T, LevelRecorder) {
    let recorder = LevelRecorder::default();
    let subscriber = Registry::default().with(recorder.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, recorder)
}
