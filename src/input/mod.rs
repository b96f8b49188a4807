//! Key input - abstract key event stream and binding to intents
//!
//! Key sources push `(key, DOWN|UP)` pairs into a channel. The mapper
//! consumes them sequentially, tracks modifiers and turns matching bindings
//! into [`Intent`]s for the dispatcher.

mod mapper;
mod repl;
mod scripted;

pub use mapper::KeyMapper;
pub use repl::{parse_line, ReplCommand, ReplKeySource};
pub use scripted::ScriptedKeySource;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::config::InputConfig;
use crate::engine::Intent;

/// Key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Down,
    Up,
}

/// A single key transition from the input source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key name as reported by the source (`"LEFT CTRL"`, `"PAGE UP"`, `"F1"`)
    pub key: String,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: KeyState::Down,
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: KeyState::Up,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            KeyState::Down => "DOWN",
            KeyState::Up => "UP",
        };
        write!(f, "{} {}", self.key, state)
    }
}

/// Producer of key events
#[async_trait]
pub trait KeySource: Send {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Push events into `tx` until the source is exhausted or closed
    async fn run(self: Box<Self>, tx: mpsc::UnboundedSender<KeyEvent>) -> Result<()>;
}

/// Spawn the sequential key → intent mapper
///
/// Bindings are re-read from `bindings` whenever the config is hot-reloaded.
/// The task ends when the key stream ends, closing the intent channel.
pub fn spawn_mapper<K>(
    keys: K,
    mut bindings: watch::Receiver<InputConfig>,
    intents: mpsc::UnboundedSender<Intent>,
) -> JoinHandle<()>
where
    K: Stream<Item = KeyEvent> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut keys = keys;
        let mut mapper = KeyMapper::new(&bindings.borrow_and_update());
        let mut watching = true;
        debug!("Key mapper started");

        loop {
            tokio::select! {
                event = keys.next() => {
                    let Some(event) = event else { break };
                    for intent in mapper.handle(&event, Instant::now()) {
                        if intents.send(intent).is_err() {
                            debug!("Intent channel closed, stopping key mapper");
                            return;
                        }
                    }
                }
                changed = bindings.changed(), if watching => {
                    if changed.is_err() {
                        // Config sender gone: keep the bindings we have
                        watching = false;
                        continue;
                    }
                    let config = bindings.borrow_and_update().clone();
                    info!("⌨️ Key bindings reloaded ({} bindings)", config.bindings.len());
                    mapper.update_bindings(&config);
                }
            }
        }

        debug!("Key mapper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Direction;
    use crate::state::ParamId;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    #[tokio::test]
    async fn test_mapper_task_emits_intents_in_order() {
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        let (_cfg_tx, cfg_rx) = watch::channel(InputConfig::default());
        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel();

        let task = spawn_mapper(UnboundedReceiverStream::new(key_rx), cfg_rx, intent_tx);

        for event in [
            KeyEvent::down("LEFT CTRL"),
            KeyEvent::down("LEFT ALT"),
            KeyEvent::down("PAGE UP"),
            KeyEvent::up("PAGE UP"),
            KeyEvent::down("F23"),
        ] {
            key_tx.send(event).unwrap();
        }
        drop(key_tx);

        task.await.unwrap();
        assert_eq!(
            intent_rx.recv().await,
            Some(Intent::Step { param: ParamId::IfShift, direction: Direction::Up })
        );
        assert_eq!(intent_rx.recv().await, Some(Intent::BandUp));
        assert_eq!(intent_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_mapper_task_applies_reloaded_bindings() {
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        let (cfg_tx, cfg_rx) = watch::channel(InputConfig::default());
        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel();

        let task = spawn_mapper(UnboundedReceiverStream::new(key_rx), cfg_rx, intent_tx);

        let mut reloaded = InputConfig::default();
        reloaded.bindings = serde_yaml::from_str(
            "- keys: [\"F9\"]\n  action:\n    type: toggle_mute\n",
        )
        .unwrap();
        cfg_tx.send(reloaded).unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        key_tx.send(KeyEvent::down("F16")).unwrap();
        key_tx.send(KeyEvent::down("F9")).unwrap();
        drop(key_tx);

        task.await.unwrap();
        assert_eq!(intent_rx.recv().await, Some(Intent::ToggleMute));
        assert_eq!(intent_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_scripted_source_feeds_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source: Box<dyn KeySource> =
            Box::new(ScriptedKeySource::new(vec![KeyEvent::down("F1"), KeyEvent::up("F1")]));
        assert_eq!(source.name(), "scripted");
        source.run(tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(KeyEvent::down("F1")));
        assert_eq!(rx.recv().await, Some(KeyEvent::up("F1")));
        assert_eq!(rx.recv().await, None);
    }
}
