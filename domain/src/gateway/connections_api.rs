use crate::error::Error;
use crate::transport::{PushError, Transport};
use async_trait::async_trait;
use log::*;
use reqwest::StatusCode;
use std::time::Duration;

/// Client for an external socket gateway's connection management API.
///
/// Each push is a `POST {base_url}/@connections/{id}` whose body is the raw
/// payload. The gateway answers `410 Gone` for connections it no longer holds.
pub struct ConnectionsApi {
    client: reqwest::Client,
    base_url: String,
}

impl ConnectionsApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn connection_url(&self, connection_id: &str) -> String {
        format!(
            "{}/@connections/{}",
            self.base_url,
            urlencoding::encode(connection_id)
        )
    }
}

#[async_trait]
impl Transport for ConnectionsApi {
    async fn push(&self, connection_id: &str, payload: &str) -> Result<(), PushError> {
        let url = self.connection_url(connection_id);

        let response = self
            .client
            .post(&url)
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| {
                debug!("Push request to {url} failed: {e:?}");
                PushError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::GONE {
            Err(PushError::StaleConnection(format!(
                "gateway no longer holds connection {connection_id}"
            )))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(PushError::Transport(format!("{status} - {error_text}")))
        }
    }
}
