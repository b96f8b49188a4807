//! Single-threaded event dispatcher
//!
//! Drains the bounded event set (inbound data, connect, disconnect, local
//! intent) on one task and drives the engine. The engine never touches the
//! socket; its outbound commands are handed to a [`CommandSink`] in order,
//! so each fragment's write is sent before the next fragment is looked at.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cat::{CatCommand, FragmentBuffer};
use crate::connection::{ConnectionEvent, ConnectionHandle};
use crate::engine::{Intent, SyncEngine};

/// Destination for outbound commands
pub trait CommandSink: Send {
    /// Send one command; `false` if it was dropped
    fn send(&self, command: &CatCommand) -> bool;
}

impl CommandSink for ConnectionHandle {
    fn send(&self, command: &CatCommand) -> bool {
        ConnectionHandle::send(self, command)
    }
}

/// Every event the dispatcher reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Inbound(Bytes),
    Connected,
    Disconnected,
    Intent(Intent),
}

impl From<ConnectionEvent> for DispatchEvent {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Connected => DispatchEvent::Connected,
            ConnectionEvent::Data(chunk) => DispatchEvent::Inbound(chunk),
            ConnectionEvent::Disconnected => DispatchEvent::Disconnected,
        }
    }
}

impl From<Intent> for DispatchEvent {
    fn from(intent: Intent) -> Self {
        DispatchEvent::Intent(intent)
    }
}

/// Owns the engine and routes events through it
pub struct Dispatcher<S: CommandSink> {
    engine: SyncEngine,
    buffer: FragmentBuffer,
    sink: S,
}

impl<S: CommandSink> Dispatcher<S> {
    pub fn new(engine: SyncEngine, sink: S) -> Self {
        Self {
            engine,
            buffer: FragmentBuffer::new(),
            sink,
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    fn send_all(&self, commands: Vec<CatCommand>) {
        for command in commands {
            self.sink.send(&command);
        }
    }

    /// Process one event to completion
    pub fn handle(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::Connected => {
                info!("🔄 Re-synchronizing device state");
                self.buffer.clear();
                self.send_all(self.engine.resync_requests());
            }

            DispatchEvent::Disconnected => {
                let pending = self.engine.registry().pending();
                if !pending.is_empty() {
                    debug!("Disconnected with pending deltas on: {:?}", pending);
                }
                self.buffer.clear();
            }

            DispatchEvent::Inbound(chunk) => {
                for fragment in self.buffer.push(&chunk) {
                    if let Some(write) = self.engine.handle_fragment(&fragment) {
                        self.sink.send(&write);
                    }
                }
            }

            DispatchEvent::Intent(intent) => {
                let commands = self.engine.handle_intent(intent);
                self.send_all(commands);
            }
        }
    }

    /// Run until both event sources are closed
    pub async fn run(
        mut self,
        mut connection_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut intent_rx: mpsc::UnboundedReceiver<Intent>,
    ) -> Self {
        debug!("Dispatcher started");

        let mut connection_open = true;
        let mut intents_open = true;

        while connection_open || intents_open {
            let event: DispatchEvent = tokio::select! {
                event = connection_rx.recv(), if connection_open => match event {
                    Some(event) => event.into(),
                    None => {
                        connection_open = false;
                        continue;
                    }
                },
                intent = intent_rx.recv(), if intents_open => match intent {
                    Some(intent) => intent.into(),
                    None => {
                        intents_open = false;
                        continue;
                    }
                },
            };

            self.handle(event);
        }

        debug!("Dispatcher stopped");
        self
    }
}
