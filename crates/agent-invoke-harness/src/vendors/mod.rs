/// HTTP/SSE Agent Service client.
pub mod http;
