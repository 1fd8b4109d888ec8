//! HTTP/SSE Agent Service integration.
//!
//! Requests are JSON posts; the response body is a server-sent event stream
//! whose frames map onto [`crate::StreamEvent`].
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::HttpAgentService;
pub use config::HttpServiceConfig;
