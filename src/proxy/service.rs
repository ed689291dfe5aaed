//! Proxy lifecycle.
//!
//! All state that would otherwise live in module-level singletons (the
//! active configuration, the tokenizer selection, the probe cache, the
//! listener handle) is owned by one [`ProxyService`] constructed by the
//! process entry point and passed by reference to whoever needs it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::errors::{ProxyError, ProxyResult};
use super::probe::{self, ProbeCache};
use super::router::routes;
use crate::constants::{PROXY_HOST, PROXY_PORT, UPSTREAM_TIMEOUT_SECS};
use crate::store::{ConfigStore, VendorConfig};
use crate::token::{select_tokenizer, Tokenizer};

/// Knobs the binary leaves at their defaults; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct ProxyOptions {
    pub port: u16,
    pub upstream_timeout: Duration,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            port: PROXY_PORT,
            upstream_timeout: Duration::from_secs(UPSTREAM_TIMEOUT_SECS),
        }
    }
}

/// State shared with the request handlers. The configuration is a single
/// live reference: the fallback mutation is visible to every in-flight
/// request, which keeps the one-shot retry idempotent under concurrency.
pub struct SharedState {
    pub config: Arc<RwLock<VendorConfig>>,
    pub store: Arc<ConfigStore>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub client: reqwest::Client,
    pub upstream_timeout: Duration,
}

/// Snapshot returned by [`ProxyService::status`]; a pure read.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ProxyStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_api: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

struct RunningProxy {
    addr: SocketAddr,
    shared: Arc<SharedState>,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct ProxyService {
    store: Arc<ConfigStore>,
    options: ProxyOptions,
    tokenizer: Arc<dyn Tokenizer>,
    client: reqwest::Client,
    probe_cache: ProbeCache,
    running: Mutex<Option<RunningProxy>>,
}

impl ProxyService {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self::with_options(store, ProxyOptions::default())
    }

    pub fn with_options(store: Arc<ConfigStore>, options: ProxyOptions) -> Self {
        Self {
            store,
            options,
            tokenizer: Arc::from(select_tokenizer()),
            client: reqwest::Client::new(),
            probe_cache: ProbeCache::default(),
            running: Mutex::new(None),
        }
    }

    /// Loads the active configuration and starts the listener. A service
    /// that is already listening is fully stopped first; two listeners
    /// never coexist. Configuration changes take effect through stop+start.
    pub async fn start(&self) -> ProxyResult<ProxyStatus> {
        self.stop().await;

        let config = self
            .store
            .load_api_config()?
            .ok_or(ProxyError::NotConfigured)?;
        let shared = Arc::new(SharedState {
            config: Arc::new(RwLock::new(config)),
            store: self.store.clone(),
            tokenizer: self.tokenizer.clone(),
            client: self.client.clone(),
            upstream_timeout: self.options.upstream_timeout,
        });

        let listener = TcpListener::bind((PROXY_HOST, self.options.port))
            .await
            .map_err(|e| ProxyError::Internal(format!("failed to bind proxy port: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let router = routes(shared.clone());
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            });
            if let Err(e) = server.await {
                log::error!("proxy server exited with error: {}", e);
            }
        });

        log::info!("proxy listening on http://{}", addr);
        *self.running.lock() = Some(RunningProxy {
            addr,
            shared,
            shutdown: shutdown_tx,
            handle,
        });
        Ok(self.status())
    }

    /// Stops the listener if it is running. Idempotent.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            let _ = running.shutdown.send(());
            if let Err(e) = running.handle.await {
                log::warn!("proxy task did not shut down cleanly: {}", e);
            }
            log::info!("proxy stopped");
        }
    }

    pub fn status(&self) -> ProxyStatus {
        match &*self.running.lock() {
            Some(running) => {
                let config = running.shared.config.read();
                ProxyStatus {
                    running: true,
                    url: Some(format!("http://{}", running.addr)),
                    target_api: Some(config.base_url.clone()),
                    model: Some(config.model.clone()),
                }
            }
            None => ProxyStatus::default(),
        }
    }

    /// Runs the needs-proxy capability probe for the stored configuration.
    pub async fn needs_proxy(&self) -> ProxyResult<bool> {
        let config = self
            .store
            .load_api_config()?
            .ok_or(ProxyError::NotConfigured)?;
        Ok(probe::needs_proxy(&self.client, &self.store, &self.probe_cache, &config).await)
    }
}
