//! Static vendor/endpoint knowledge: which wire formats each supported
//! vendor speaks, where those endpoints live relative to the base URL, and
//! URL heuristics for recognizing a vendor or format from a pasted base URL.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{ANTHROPIC_MESSAGES_PATH, OPENAI_CHAT_COMPLETIONS_PATH};

/// Wire format family of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
    Unknown,
}

impl std::fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFormat::Anthropic => write!(f, "anthropic"),
            ApiFormat::OpenAI => write!(f, "openai"),
            ApiFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Vendor tag carried in the persisted configuration (`api_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    DeepSeek,
    Kimi,
    Zhipu,
    Qwen,
    #[default]
    Custom,
}

impl std::fmt::Display for VendorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            VendorKind::Anthropic => "anthropic",
            VendorKind::OpenAI => "openai",
            VendorKind::DeepSeek => "deepseek",
            VendorKind::Kimi => "kimi",
            VendorKind::Zhipu => "zhipu",
            VendorKind::Qwen => "qwen",
            VendorKind::Custom => "custom",
        };
        write!(f, "{}", tag)
    }
}

/// Endpoint paths one vendor exposes, relative to its base URL. Every vendor
/// has at least one path and a default format.
#[derive(Debug, Clone, Copy)]
pub struct VendorEndpoints {
    pub anthropic_path: Option<&'static str>,
    pub openai_path: Option<&'static str>,
    pub default: ApiFormat,
}

/// The single source of truth for per-vendor endpoint support. Adapter
/// selection and URL auto-detection both consult this table.
pub fn vendor_endpoints(kind: VendorKind) -> VendorEndpoints {
    match kind {
        VendorKind::Anthropic => VendorEndpoints {
            anthropic_path: Some(ANTHROPIC_MESSAGES_PATH),
            openai_path: None,
            default: ApiFormat::Anthropic,
        },
        VendorKind::OpenAI => VendorEndpoints {
            anthropic_path: None,
            openai_path: Some(OPENAI_CHAT_COMPLETIONS_PATH),
            default: ApiFormat::OpenAI,
        },
        VendorKind::DeepSeek => VendorEndpoints {
            anthropic_path: Some("/anthropic/v1/messages"),
            openai_path: Some("/chat/completions"),
            default: ApiFormat::OpenAI,
        },
        VendorKind::Kimi => VendorEndpoints {
            anthropic_path: Some("/anthropic/v1/messages"),
            openai_path: Some(OPENAI_CHAT_COMPLETIONS_PATH),
            default: ApiFormat::OpenAI,
        },
        VendorKind::Zhipu => VendorEndpoints {
            anthropic_path: Some("/api/anthropic/v1/messages"),
            openai_path: Some("/api/paas/v4/chat/completions"),
            default: ApiFormat::Anthropic,
        },
        VendorKind::Qwen => VendorEndpoints {
            anthropic_path: None,
            openai_path: Some("/compatible-mode/v1/chat/completions"),
            default: ApiFormat::OpenAI,
        },
        VendorKind::Custom => VendorEndpoints {
            anthropic_path: Some(ANTHROPIC_MESSAGES_PATH),
            openai_path: Some(OPENAI_CHAT_COMPLETIONS_PATH),
            default: ApiFormat::Anthropic,
        },
    }
}

/// Result of matching a configured URL against known endpoint suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDetection {
    pub format: ApiFormat,
    pub clean_base_url: String,
    pub detected_path: String,
}

// Ordered: the first matching suffix wins.
static FORMAT_SUFFIXES: Lazy<Vec<(Regex, ApiFormat)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(/anthropic)/?$").unwrap(), ApiFormat::Anthropic),
        (Regex::new(r"(/v1/messages)/?$").unwrap(), ApiFormat::Anthropic),
        (
            Regex::new(r"(/v1/beta/messages)/?$").unwrap(),
            ApiFormat::Anthropic,
        ),
    ]
});

/// Matches a URL's path suffix against the known endpoint patterns and
/// strips the suffix to recover the clean base. Never errors: an
/// unrecognized URL comes back as `Unknown` with an empty detected path.
pub fn detect_api_format(url: &str) -> FormatDetection {
    let trimmed = url.trim_end_matches('/');
    for (re, format) in FORMAT_SUFFIXES.iter() {
        if let Some(caps) = re.captures(trimmed) {
            let suffix = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let clean = trimmed[..trimmed.len() - suffix.len()]
                .trim_end_matches('/')
                .to_string();
            return FormatDetection {
                format: *format,
                clean_base_url: clean,
                detected_path: suffix.to_string(),
            };
        }
    }
    FormatDetection {
        format: ApiFormat::Unknown,
        clean_base_url: trimmed.to_string(),
        detected_path: String::new(),
    }
}

// Ordered hostname matchers; first match wins.
static PROVIDER_HOSTS: Lazy<Vec<(Regex, VendorKind)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(^|\.)api\.anthropic\.com").unwrap(),
            VendorKind::Anthropic,
        ),
        (
            Regex::new(r"(^|\.)api\.openai\.com").unwrap(),
            VendorKind::OpenAI,
        ),
        (
            Regex::new(r"(^|\.)api\.deepseek\.com").unwrap(),
            VendorKind::DeepSeek,
        ),
        (
            Regex::new(r"(^|\.)api\.moonshot\.(cn|ai)").unwrap(),
            VendorKind::Kimi,
        ),
        (
            Regex::new(r"(^|\.)open\.bigmodel\.cn").unwrap(),
            VendorKind::Zhipu,
        ),
        (
            Regex::new(r"(^|\.)dashscope\.aliyuncs\.com").unwrap(),
            VendorKind::Qwen,
        ),
    ]
});

/// Best-effort vendor identification from a base URL. Unrecognized hosts
/// whose path carries an `/anthropic` segment are treated as Anthropic-format
/// vendors; anything else is `None`.
pub fn infer_provider_from_url(url: &str) -> Option<VendorKind> {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))?;
    for (re, kind) in PROVIDER_HOSTS.iter() {
        if re.is_match(&host) {
            return Some(*kind);
        }
    }
    if url.contains("/anthropic") {
        return Some(VendorKind::Anthropic);
    }
    None
}
