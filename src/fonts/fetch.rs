//! Getting font bytes: inline `data:` URIs are decoded locally, everything
//! else goes through a [`FontFetcher`].

use crate::{Error, Result};
use base64::Engine as _;
use futures::future::BoxFuture;

/// Byte-fetch collaborator used by [`super::FontRepository::refresh`].
///
/// No timeout is imposed by the repository; a fetcher that never resolves
/// stalls the refresh that issued it.
pub trait FontFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Fetcher for hosts without network access: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl FontFetcher for OfflineFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            Err(Error::FetchError {
                url: url.to_string(),
                reason: "network access disabled".into(),
            })
        })
    }
}

/// HTTP(S) fetcher backed by a shared `reqwest` client.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(config: &crate::FetchConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::ConfigError(format!("invalid header name {}: {}", name, e)))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| Error::ConfigError(format!("invalid header value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers);
        if config.timeout_ms > 0 {
            builder = builder.timeout(std::time::Duration::from_millis(config.timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl FontFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        let fail = move |reason: String| Error::FetchError {
            url: url.to_string(),
            reason,
        };
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| fail(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(fail(format!("HTTP status {}", status)));
            }
            let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;
            Ok(body.to_vec())
        })
    }
}

/// Whether the locator is an inline `data:` URI.
pub fn is_data_uri(url: &str) -> bool {
    url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Decode the payload of a base64 `data:` URI.
pub fn decode_data_uri(url: &str) -> Result<Vec<u8>> {
    let fail = |reason: &str| Error::FetchError {
        url: truncate_locator(url),
        reason: reason.to_string(),
    };
    if !is_data_uri(url) {
        return Err(fail("not a data URI"));
    }
    let (meta, payload) = url[5..].split_once(',').ok_or_else(|| fail("missing ',' separator"))?;
    if !meta.split(';').any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(fail("only base64 data URIs carry font bytes"));
    }
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| fail(&format!("invalid base64: {}", e)))
}

/// Data URIs can be megabytes long; keep log lines and errors readable.
pub(crate) fn truncate_locator(url: &str) -> String {
    const MAX: usize = 64;
    match url.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &url[..i]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_payload_is_decoded() {
        let bytes = decode_data_uri("data:font/ttf;base64,AAEAAA==").unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x00, 0x00]);
        assert!(decode_data_uri("DATA:application/octet-stream;base64, AAEA\nAA==").is_ok());
    }

    #[test]
    fn malformed_data_uris_are_fetch_errors() {
        assert!(matches!(decode_data_uri("data:font/ttf,plain"), Err(Error::FetchError { .. })));
        assert!(matches!(decode_data_uri("data:font/ttf;base64"), Err(Error::FetchError { .. })));
        assert!(matches!(decode_data_uri("data:;base64,@@@"), Err(Error::FetchError { .. })));
        assert!(!is_data_uri("https://example.com/a.woff2"));
    }

    #[test]
    fn long_locators_are_truncated() {
        let url = format!("data:font/ttf;base64,{}", "A".repeat(500));
        let short = truncate_locator(&url);
        assert!(short.len() < 80);
        assert!(short.ends_with("..."));
        assert_eq!(truncate_locator("a.woff"), "a.woff");
    }

    #[tokio::test]
    async fn offline_fetcher_always_fails() {
        let err = OfflineFetcher.fetch("https://example.com/a.ttf").await.unwrap_err();
        assert!(err.is_font_pipeline());
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn http_fetcher_reads_body_and_rejects_error_status() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        std::thread::spawn(move || {
            for request in server.incoming_requests().take(2) {
                let response = if request.url() == "/font.ttf" {
                    tiny_http::Response::from_data(vec![0u8, 1, 0, 0])
                } else {
                    tiny_http::Response::from_data(Vec::new()).with_status_code(404)
                };
                let _ = request.respond(response);
            }
        });

        let fetcher = HttpFetcher::new(&crate::FetchConfig::default()).unwrap();
        let bytes = fetcher.fetch(&format!("http://{}/font.ttf", addr)).await.unwrap();
        assert_eq!(bytes, vec![0, 1, 0, 0]);

        let missing = format!("http://{}/missing.ttf", addr);
        match fetcher.fetch(&missing).await {
            Err(Error::FetchError { url, reason }) => {
                assert_eq!(url, missing);
                assert!(reason.contains("404"));
            }
            other => panic!("expected FetchError, got {:?}", other.map(|b| b.len())),
        }
    }
}
