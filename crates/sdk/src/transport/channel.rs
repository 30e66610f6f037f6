//! In-memory transport, for driving a client without launching a CLI.

use super::{Transport, TransportChannels, CHANNEL_CAPACITY};
use agentkit_core::{AgentError, AgentResult};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Client side of an in-memory connection.
#[derive(Debug)]
pub struct ChannelTransport {
    channels: Option<TransportChannels>,
}

/// Agent side of an in-memory connection.
#[derive(Debug)]
pub struct AgentPeer {
    from_client: mpsc::Receiver<Value>,
    to_client: mpsc::Sender<AgentResult<Value>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, AgentPeer) {
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let transport = Self {
            channels: Some(TransportChannels {
                outbound: outbound_tx,
                inbound: inbound_rx,
            }),
        };
        let peer = AgentPeer {
            from_client: outbound_rx,
            to_client: inbound_tx,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&mut self) -> AgentResult<TransportChannels> {
        self.channels
            .take()
            .ok_or_else(|| AgentError::Transport("transport already connected".to_string()))
    }

    async fn close(&mut self) -> AgentResult<()> {
        self.channels = None;
        Ok(())
    }
}

impl AgentPeer {
    /// Next message written by the client, `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.from_client.recv().await
    }

    /// Next message written by the client whose `type` matches.
    pub async fn recv_type(&mut self, message_type: &str) -> Option<Value> {
        while let Some(value) = self.from_client.recv().await {
            if value.get("type").and_then(Value::as_str) == Some(message_type) {
                return Some(value);
            }
        }
        None
    }

    /// Emit a message as if printed by the agent. Returns false if the client is gone.
    pub async fn send(&self, value: Value) -> bool {
        self.to_client.send(Ok(value)).await.is_ok()
    }

    /// End the stream with a failure.
    pub async fn fail(&self, error: AgentError) -> bool {
        self.to_client.send(Err(error)).await.is_ok()
    }
}
