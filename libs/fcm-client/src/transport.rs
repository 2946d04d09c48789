use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;

use crate::errors::Result;

/// Status, headers and body of an HTTP response, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Flatten a header map, joining repeated values with `", "`
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if !values.is_empty() {
            collected.insert(name.as_str().to_string(), values.join(", "));
        }
    }
    collected
}

/// Pooled JSON-over-HTTP transport
///
/// Every request carries `Content-Type: application/json`; the configured
/// timeout bounds the whole exchange. Network errors and timeouts surface as
/// [`FCMError::Transport`](crate::FCMError::Transport).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self { http_client })
    }

    /// The underlying pooled client, shared with the service account token provider
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
    ) -> Result<RawResponse> {
        let mut request = self.http_client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        Self::read(request.send().await?).await
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        query: &[(&str, &str)],
    ) -> Result<RawResponse> {
        let mut request = self.http_client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        Self::read(request.send().await?).await
    }

    async fn read(response: reqwest::Response) -> Result<RawResponse> {
        let status_code = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text().await?;

        Ok(RawResponse {
            status_code,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, VARY};

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
        headers.append(VARY, HeaderValue::from_static("Origin"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-binary"),
            HeaderValue::from_bytes(b"\xff").unwrap(),
        );

        let collected = collect_headers(&headers);
        assert_eq!(collected["vary"], "Accept-Encoding, Origin");
        assert_eq!(collected["content-type"], "application/json");
        assert!(!collected.contains_key("x-binary"));
    }
}
