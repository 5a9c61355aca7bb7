//! Test utilities for audi-client
//!
//! Provides helpers for running integration tests against mock Audi Connect
//! services.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::{AudiClient, ClientConfig, Result};

/// A test server that automatically shuts down when dropped
///
/// Every endpoint of the client points at the server, keeping the vendor
/// path layout (see [`crate::EndpointsConfig::single_host`]).
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: AudiClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use audi_client::testing::TestServer;
    ///
    /// let server = TestServer::start(mock_router()).await?;
    /// let vehicles = server.client.get_vehicles().await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with_token_file(router, std::env::temp_dir().join("audi-test-tokens.json"))
            .await
    }

    /// Create a new test server whose client persists tokens to `token_file`
    pub async fn start_with_token_file<S>(
        router: axum::Router<S>,
        token_file: PathBuf,
    ) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url = format!("http://{}", addr);

        let config = ClientConfig::builder()
            .market("DE", "de")
            .single_host(&base_url)
            .token_file(token_file)
            .request_timeout_ms(5_000)
            .connect_timeout_ms(2_000)
            .poll_ms(10)
            .poll_timeout_ms(2_000)
            .build();

        Self::start_with_config(router, listener, config).await
    }

    async fn start_with_config<S>(
        router: axum::Router<S>,
        listener: TcpListener,
        config: ClientConfig,
    ) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let client = AudiClient::new(config)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &AudiClient {
        &self.client
    }

    /// Create another client for the same server (e.g. to test token restore)
    pub fn new_client(&self) -> Result<AudiClient> {
        AudiClient::new(self.client.config().clone())
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_points_client_at_itself() {
        let server = TestServer::start(axum::Router::new()).await.unwrap();
        let config = server.client.config();

        assert_eq!(config.endpoints.msg, server.base_url());
        assert_eq!(config.endpoints.fs_car, format!("{}/fs-car", server.base_url()));
        assert_eq!(config.timeouts.poll_ms, 10);
        server.shutdown().await;
    }
}
