use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

/// One event stream per operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressChannel {
    Download,
    Export,
    Import,
}

impl ProgressChannel {
    pub const ALL: [ProgressChannel; 3] = [
        ProgressChannel::Download,
        ProgressChannel::Export,
        ProgressChannel::Import,
    ];

    /// Event name the desktop shell listens on.
    pub fn event_name(self) -> &'static str {
        match self {
            ProgressChannel::Download => "download-progress",
            ProgressChannel::Export => "export-progress",
            ProgressChannel::Import => "import-progress",
        }
    }
}

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub percent: u8,
}

pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, channel: ProgressChannel, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(ProgressChannel, &ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, channel: ProgressChannel, event: &ProgressEvent) {
        self(channel, event)
    }
}

/// Single-subscriber registry: subscribing to a channel replaces whatever
/// listener was there, so repeated operations never deliver twice.
#[derive(Default)]
pub struct ProgressHub {
    listeners: RwLock<HashMap<ProgressChannel, Arc<dyn ProgressListener>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a previous listener was replaced.
    pub fn subscribe(&self, channel: ProgressChannel, listener: Arc<dyn ProgressListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let replaced = listeners.insert(channel, listener).is_some();
        if replaced {
            debug!("Replaced {} listener", channel.event_name());
        }
        replaced
    }

    pub fn unsubscribe(&self, channel: ProgressChannel) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&channel);
    }

    pub fn emitter(self: &Arc<Self>, channel: ProgressChannel, id: Option<String>) -> ProgressEmitter {
        ProgressEmitter {
            hub: Arc::clone(self),
            channel,
            id,
            last: None,
        }
    }

    fn deliver(&self, channel: ProgressChannel, event: &ProgressEvent) {
        let listener = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned();
        if let Some(listener) = listener {
            listener.on_progress(channel, event);
        }
    }
}

/// Forwards percent updates for one job to the channel's current listener.
///
/// The only state kept is the last value sent, which suppresses repeats.
pub struct ProgressEmitter {
    hub: Arc<ProgressHub>,
    channel: ProgressChannel,
    id: Option<String>,
    last: Option<u8>,
}

impl ProgressEmitter {
    pub fn emit(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);
        self.hub.deliver(
            self.channel,
            &ProgressEvent {
                id: self.id.clone(),
                percent,
            },
        );
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
