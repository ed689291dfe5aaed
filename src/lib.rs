//! ccbridge: a local loopback proxy between AI coding-agent runtimes and
//! heterogeneous LLM backends.
//!
//! The agent runtime speaks the Anthropic message API. Many third-party
//! backends speak it too, some only speak OpenAI chat completions, and
//! almost none implement `/v1/messages/count_tokens`. ccbridge sits on
//! 127.0.0.1, answers token counting locally, forwards everything else
//! through a per-vendor format adapter (re-framing SSE streams on the way
//! back), and when a vendor turns out not to serve the Anthropic endpoint
//! it switches to the OpenAI format once and persists that decision.

pub mod adapter;
pub mod constants;
pub mod logger;
pub mod proxy;
pub mod store;
pub mod token;
pub mod types;
pub mod vendor;
