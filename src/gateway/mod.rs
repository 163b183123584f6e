//! Gateway client: the single choke point for outbound API calls.

mod client;
mod config;
pub mod pipeline;
mod retry;

pub use client::{GatewayClient, GatewayClientBuilder, RequestOptions};
pub use config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, GatewayConfig, RetryPolicy};
