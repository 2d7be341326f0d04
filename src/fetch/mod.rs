//! HTTP plumbing for the record store.
//!
//! [`HttpClient`] is the seam: [`BasicClient`] talks to the network, and
//! wrappers such as [`ApiKey`] decorate requests before passing them on.

mod api_key;
mod basic;
mod client;

pub use api_key::ApiKey;
pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, anyhow};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request};
use tracing::debug;

/// Builds a request, attaching `body` as JSON when present.
pub fn json_request(method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Request> {
    let mut req = Request::new(method, url.parse()?);
    if let Some(body) = body {
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());
    }
    Ok(req)
}

/// Executes `req` and returns the response body. Non-2xx statuses are errors
/// carrying the status and body text.
pub async fn send<C: HttpClient + ?Sized>(client: &C, req: Request) -> Result<Vec<u8>> {
    let method = req.method().clone();
    let url = req.url().path().to_string();

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("{method} {url} returned status {status}: {body}"));
    }

    let bytes = resp.bytes().await?.to_vec();
    debug!(%method, url, bytes = bytes.len(), "Store response received");
    Ok(bytes)
}
