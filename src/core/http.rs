use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::config::TransferConfig;

/// Shared client for archive downloads.
///
/// Asks for identity encoding so `Content-Length` matches the bytes written to
/// disk, and bounds connect and per-read waits instead of the whole transfer.
pub fn build_http_client(config: &TransferConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(default_headers)
        .connect_timeout(config.http_timeout())
        .read_timeout(config.http_timeout())
        .build()
}
