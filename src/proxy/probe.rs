//! Needs-proxy detection.
//!
//! Before relying on the local shim, one real call probes whether the
//! configured vendor implements `/v1/messages/count_tokens` natively. Any
//! non-OK outcome (network failure included) counts as "needs proxy":
//! missing that endpoint is the very problem the proxy exists to solve, so
//! the pessimistic reading is the safe one.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

use crate::constants::{ANTHROPIC_VERSION, NEEDS_PROXY_TTL_HOURS};
use crate::store::{ConfigStore, VendorConfig};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// In-memory probe decisions, keyed by normalized base (scheme://host:port),
/// valid for the process lifetime.
pub type ProbeCache = Mutex<HashMap<String, bool>>;

/// Returns whether the configured vendor needs the local count_tokens shim.
/// Decisions come from (in order): the process cache, a persisted decision
/// younger than 24 h, or a fresh trial call whose result is cached and
/// persisted (persistence is best-effort).
pub async fn needs_proxy(
    client: &reqwest::Client,
    store: &ConfigStore,
    cache: &ProbeCache,
    config: &VendorConfig,
) -> bool {
    let key = normalize_base(&config.base_url);

    if let Some(flag) = cache.lock().get(&key).copied() {
        return flag;
    }

    if let (Some(flag), Some(checked_at)) = (config.needs_proxy, config.needs_proxy_checked_at) {
        let age = Utc::now().signed_duration_since(checked_at);
        if age < chrono::Duration::hours(NEEDS_PROXY_TTL_HOURS) {
            cache.lock().insert(key, flag);
            return flag;
        }
    }

    let url = format!(
        "{}/v1/messages/count_tokens",
        config.base_url.trim_end_matches('/')
    );
    let body = json!({
        "model": config.model,
        "messages": [{ "role": "user", "content": "hi" }],
    });
    let result = client
        .post(&url)
        .timeout(PROBE_TIMEOUT)
        .header("x-api-key", config.api_key.as_str())
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await;

    let needs = match result {
        Ok(response) => !response.status().is_success(),
        Err(e) => {
            log::debug!("count_tokens probe failed: {}", e);
            true
        }
    };
    log::info!("needs-proxy probe for {}: {}", key, needs);

    cache.lock().insert(key, needs);
    let mut updated = config.clone();
    updated.needs_proxy = Some(needs);
    updated.needs_proxy_checked_at = Some(Utc::now());
    if let Err(e) = store.save_api_config(&updated) {
        log::warn!("failed to persist needs-proxy decision: {}", e);
    }

    needs
}

fn normalize_base(base_url: &str) -> String {
    match url::Url::parse(base_url) {
        Ok(parsed) => format!(
            "{}://{}:{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default(),
            parsed.port_or_known_default().unwrap_or(0)
        ),
        Err(_) => base_url.trim_end_matches('/').to_string(),
    }
}
