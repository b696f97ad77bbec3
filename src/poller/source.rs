use crate::error::SyncError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Where snapshots come from.
///
/// Fetches have no timeout or cancellation of their own; a slow fetch may
/// still be running when the next tick issues another.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the JSON array served at `endpoint`.
    async fn fetch(&self, endpoint: &str) -> Result<Vec<Value>, SyncError>;
}

/// Snapshot source backed by the map server's HTTP endpoints.
pub struct HttpSource {
    base_url: String,
    http_client: Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch(&self, endpoint: &str) -> Result<Vec<Value>, SyncError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::transport(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::transport(endpoint, format!("status {}", status)));
        }

        match response.json::<Value>().await {
            Ok(Value::Array(items)) => Ok(items),
            Ok(_) => Err(SyncError::transport(endpoint, "response is not a JSON array")),
            Err(e) => Err(SyncError::transport(endpoint, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_fetch_returns_array_items() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": "pokemon-1"}, {"id": "pokemon-2"}]"#)
            .create_async()
            .await;

        let source = HttpSource::new(server.url());
        let items = source.fetch("/data").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "pokemon-1");
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/gym_data")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let source = HttpSource::new(format!("{}/", server.url()));
        assert!(source.fetch("/gym_data").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/workers_data")
            .with_status(502)
            .create_async()
            .await;

        let source = HttpSource::new(server.url());
        let err = source.fetch("/workers_data").await.unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_non_array_body_is_transport_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/data")
            .with_status(200)
            .with_body(r#"{"error": "busy"}"#)
            .create_async()
            .await;

        let source = HttpSource::new(server.url());
        let err = source.fetch("/data").await.unwrap_err();
        assert!(err.to_string().contains("not a JSON array"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let source = HttpSource::new("http://127.0.0.1:1");
        let err = source.fetch("/data").await.unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
    }
}
