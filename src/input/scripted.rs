//! Scripted key source for tests and unattended runs

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{KeyEvent, KeySource};

/// Replays a fixed list of key events, optionally spaced out
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeySource {
    events: Vec<KeyEvent>,
    interval: Option<Duration>,
}

impl ScriptedKeySource {
    pub fn new(events: Vec<KeyEvent>) -> Self {
        Self {
            events,
            interval: None,
        }
    }

    /// Wait `interval` between consecutive events
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

#[async_trait]
impl KeySource for ScriptedKeySource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(self: Box<Self>, tx: mpsc::UnboundedSender<KeyEvent>) -> Result<()> {
        let Self { events, interval } = *self;

        for (idx, event) in events.into_iter().enumerate() {
            if idx > 0 {
                if let Some(interval) = interval {
                    tokio::time::sleep(interval).await;
                }
            }
            if tx.send(event).is_err() {
                break;
            }
        }
        Ok(())
    }
}
