//! Wire-format adapters.
//!
//! Every inbound request arrives in the Anthropic message shape; the adapter
//! selected from the active configuration rewrites it for the upstream and
//! rewrites the upstream's answer back.

mod anthropic;
mod openai;
pub mod sse;
mod traits;

#[cfg(test)]
mod openai_test;

pub use anthropic::AnthropicPassthroughAdapter;
pub use openai::OpenAiCompatAdapter;
pub use traits::{AdapterError, FormatAdapter, TransformedRequest};

use serde_json::Value;

use crate::store::VendorConfig;
use crate::types::claude::ClaudeNativeRequest;
use crate::vendor::{vendor_endpoints, ApiFormat};

/// The two concrete adapters behind one dispatchable type.
pub enum AdapterEnum {
    Anthropic(AnthropicPassthroughAdapter),
    OpenAI(OpenAiCompatAdapter),
}

impl FormatAdapter for AdapterEnum {
    fn format(&self) -> ApiFormat {
        match self {
            Self::Anthropic(adapter) => adapter.format(),
            Self::OpenAI(adapter) => adapter.format(),
        }
    }

    fn transform_request(
        &self,
        req: &ClaudeNativeRequest,
        raw_body: &Value,
        config: &VendorConfig,
    ) -> Result<TransformedRequest, AdapterError> {
        match self {
            Self::Anthropic(adapter) => adapter.transform_request(req, raw_body, config),
            Self::OpenAI(adapter) => adapter.transform_request(req, raw_body, config),
        }
    }

    fn transform_response(&self, body: &[u8]) -> Result<Value, AdapterError> {
        match self {
            Self::Anthropic(adapter) => adapter.transform_response(body),
            Self::OpenAI(adapter) => adapter.transform_response(body),
        }
    }

    fn reframes_stream(&self) -> bool {
        match self {
            Self::Anthropic(adapter) => adapter.reframes_stream(),
            Self::OpenAI(adapter) => adapter.reframes_stream(),
        }
    }

    fn transform_stream(&self, chunk: &str) -> Option<String> {
        match self {
            Self::Anthropic(adapter) => adapter.transform_stream(chunk),
            Self::OpenAI(adapter) => adapter.transform_stream(chunk),
        }
    }
}

/// Selects the adapter for the active configuration. A learned
/// `force_openai_format` always wins; otherwise the vendor's default format
/// from the endpoint table decides.
pub fn select_adapter(config: &VendorConfig) -> AdapterEnum {
    if config.force_openai_format {
        return AdapterEnum::OpenAI(OpenAiCompatAdapter);
    }
    match vendor_endpoints(config.api_type).default {
        ApiFormat::OpenAI => AdapterEnum::OpenAI(OpenAiCompatAdapter),
        _ => AdapterEnum::Anthropic(AnthropicPassthroughAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::VendorKind;

    #[test]
    fn forced_fallback_beats_vendor_default() {
        let config = VendorConfig {
            api_type: VendorKind::Anthropic,
            force_openai_format: true,
            ..Default::default()
        };
        assert_eq!(select_adapter(&config).format(), ApiFormat::OpenAI);
    }

    #[test]
    fn vendor_default_drives_selection() {
        let anthropic = VendorConfig {
            api_type: VendorKind::Zhipu,
            ..Default::default()
        };
        assert_eq!(select_adapter(&anthropic).format(), ApiFormat::Anthropic);

        let openai = VendorConfig {
            api_type: VendorKind::DeepSeek,
            ..Default::default()
        };
        assert_eq!(select_adapter(&openai).format(), ApiFormat::OpenAI);
    }
}
