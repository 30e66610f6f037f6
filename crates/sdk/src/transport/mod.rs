//! Transports carrying JSON lines between the SDK and the agent process.

pub mod channel;
pub mod subprocess;

pub use channel::{AgentPeer, ChannelTransport};
pub use subprocess::SubprocessTransport;

use agentkit_core::AgentResult;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Capacity of the per-direction message channels.
pub const CHANNEL_CAPACITY: usize = 64;

/// Both directions of a connected transport.
#[derive(Debug)]
pub struct TransportChannels {
    /// Messages to write to the agent.
    pub outbound: mpsc::Sender<Value>,
    /// Messages read from the agent, or the failure that ended the stream.
    pub inbound: mpsc::Receiver<AgentResult<Value>>,
}

#[async_trait]
pub trait Transport: Send {
    /// Start the agent and return its message channels. Called once.
    async fn connect(&mut self) -> AgentResult<TransportChannels>;

    /// Stop the agent and release its resources.
    async fn close(&mut self) -> AgentResult<()>;
}
