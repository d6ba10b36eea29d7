use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::*;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct RelayConnection {
    sink: SplitSink<Socket, Message>,
    stream: SplitStream<Socket>,
}

impl RelayConnection {
    pub async fn establish(relay_url: &str) -> Result<Self> {
        let (socket, response) = connect_async(relay_url)
            .await
            .with_context(|| format!("Failed to connect to relay at {relay_url}"))?;
        debug!("Relay handshake completed with HTTP {}", response.status());

        let (sink, stream) = socket.split();
        Ok(Self { sink, stream })
    }

    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::text(text))
            .await
            .context("Failed to send message to relay")
    }

    /// Waits for the next text payload. `None` once the relay closes the socket.
    pub async fn next_text(&mut self) -> Result<Option<String>> {
        while let Some(frame) = self.stream.next().await {
            match frame.context("Relay socket error")? {
                Message::Text(text) => return Ok(Some(text.as_str().to_string())),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => debug!("Ignoring non-UTF8 binary frame"),
                },
                Message::Close(frame) => {
                    debug!("Relay closed the socket: {frame:?}");
                    return Ok(None);
                }
                _ => continue,
            }
        }
        Ok(None)
    }
}

/// The relay's answer to this client's identify. It arrives as a JSON string
/// literal such as `"Counterpart connected!"`, named after the class the
/// identify token registers.
pub struct IdentifyAck {
    connected: String,
    failed: String,
}

impl IdentifyAck {
    pub fn for_token(identify_token: &str) -> Self {
        let subject = if identify_token == "HumanConnect" {
            "Agent"
        } else {
            "Counterpart"
        };

        Self {
            connected: serde_json::Value::from(format!("{subject} connected!")).to_string(),
            failed: serde_json::Value::from(format!("{subject} registration failed")).to_string(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        text == self.connected || text == self.failed
    }
}
