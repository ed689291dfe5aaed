// Configuration keys for the settings store
pub const CFG_API_CONFIG: &str = "api_config";

// The proxy listens on the loopback interface only; agent runtimes on the
// same machine are the only intended clients.
pub const PROXY_HOST: &str = "127.0.0.1";
pub const PROXY_PORT: u16 = 35721;

// Upstream requests are bounded by an abort-based timeout; a fallback retry
// gets a fresh budget of the same length.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

// Wire protocol constants
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_MESSAGES_PATH: &str = "/v1/messages";
pub const OPENAI_CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const COUNT_TOKENS_SUFFIX: &str = "/count_tokens";

// Flat token charge for an image block, regardless of actual size.
pub const IMAGE_TOKEN_COST: u64 = 1600;

// A cached needs-proxy probe decision is trusted for this long.
pub const NEEDS_PROXY_TTL_HOURS: i64 = 24;
