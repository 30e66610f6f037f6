//! One-shot queries.

use crate::client::AgentClient;
use crate::message::Message;
use crate::options::AgentOptions;
use crate::transport::Transport;
use agentkit_core::AgentResult;

/// Run a single prompt in a fresh session.
///
/// The returned stream yields messages up to and including the result message;
/// the session is closed once the stream ends.
pub async fn query(prompt: impl Into<String>, options: AgentOptions) -> AgentResult<QueryStream> {
    let client = AgentClient::connect(options).await?;
    QueryStream::start(client, prompt.into()).await
}

/// Like [`query`], over a caller-supplied transport.
pub async fn query_with_transport(
    prompt: impl Into<String>,
    options: AgentOptions,
    transport: Box<dyn Transport>,
) -> AgentResult<QueryStream> {
    let client = AgentClient::with_transport(options, transport).await?;
    QueryStream::start(client, prompt.into()).await
}

/// Messages answering a one-shot query.
pub struct QueryStream {
    client: Option<AgentClient>,
}

impl QueryStream {
    async fn start(mut client: AgentClient, prompt: String) -> AgentResult<Self> {
        if let Err(e) = client.query(prompt).await {
            let _ = client.close().await;
            return Err(e);
        }
        Ok(Self {
            client: Some(client),
        })
    }

    pub async fn next_message(&mut self) -> Option<AgentResult<Message>> {
        let client = self.client.as_mut()?;
        match client.next_response_message().await {
            Some(message) => Some(message),
            None => {
                self.finish().await;
                None
            }
        }
    }

    /// Drain the stream, returning every message.
    pub async fn collect(mut self) -> AgentResult<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message().await {
            match message {
                Ok(message) => messages.push(message),
                Err(e) => {
                    self.finish().await;
                    return Err(e);
                }
            }
        }
        Ok(messages)
    }

    async fn finish(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.close().await {
                tracing::debug!(error = %e, "Error while closing query session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_query_yields_messages_then_closes() {
        let (transport, mut peer) = ChannelTransport::new();
        let mut stream =
            query_with_transport("2 + 2?", AgentOptions::default(), Box::new(transport))
                .await
                .unwrap();

        let prompt = peer.recv_type("user").await.unwrap();
        assert_eq!(prompt["message"]["content"], "2 + 2?");

        peer.send(json!({
            "type": "assistant",
            "message": {"content": [{"type": "text", "text": "4"}]}
        }))
        .await;
        peer.send(json!({"type": "result", "subtype": "success", "result": "4"}))
            .await;

        let first = stream.next_message().await.unwrap().unwrap();
        assert_eq!(first.assistant_text().unwrap(), "4");
        assert!(stream.next_message().await.unwrap().unwrap().is_result());
        assert!(stream.next_message().await.is_none());
        assert!(stream.next_message().await.is_none());

        // The session was closed, so the client side of the channel is gone
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_surfaces_errors() {
        let (transport, peer) = ChannelTransport::new();
        let stream = query_with_transport("hi", AgentOptions::default(), Box::new(transport))
            .await
            .unwrap();
        drop(peer);

        assert!(stream.collect().await.is_err());
    }
}
