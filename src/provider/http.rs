//! Shared HTTP client, NDJSON decoding, and auth utilities.

use std::sync::OnceLock;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::error::ParleyError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout: chat streams stay open for as long as the model
/// generates. Callers bound individual requests instead.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// JSON headers, plus a bearer token when one is configured.
pub fn json_headers(bearer_token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = bearer_token.filter(|t| !t.is_empty()) {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Map a non-success HTTP status and body to an error.
pub fn status_to_error(status: u16, body: &str) -> ParleyError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    ParleyError::api(status, message)
}

/// Decode a newline-delimited JSON body into a stream of records.
///
/// Blank lines are skipped. A line that does not decode ends the stream with
/// a [`ParleyError::Stream`], as does a transport failure mid-body.
pub fn ndjson_stream<T>(resp: reqwest::Response) -> futures::stream::BoxStream<'static, Result<T, ParleyError>>
where
    T: DeserializeOwned + Send + 'static,
{
    let byte_stream = resp.bytes_stream();
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ParleyError::Stream(e.to_string()));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                match decode_line::<T>(&line) {
                    Some(Ok(record)) => yield Ok(record),
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                    None => {}
                }
            }
        }

        if let Some(result) = decode_line::<T>(&buffer) {
            yield result;
        }
    };
    Box::pin(stream)
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Option<Result<T, ParleyError>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(text)
            .map_err(|e| ParleyError::Stream(format!("malformed stream record: {e}"))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_only_when_token_present() {
        assert!(json_headers(None).get(AUTHORIZATION).is_none());
        assert!(json_headers(Some("")).get(AUTHORIZATION).is_none());
        assert_eq!(
            json_headers(Some("okki")).get(AUTHORIZATION).unwrap(),
            "Bearer okki"
        );
    }

    #[test]
    fn status_error_prefers_json_error_field() {
        let err = status_to_error(404, r#"{"error":"model 'nope' not found"}"#);
        assert!(matches!(
            err,
            ParleyError::Api { status: 404, ref message } if message == "model 'nope' not found"
        ));
        let err = status_to_error(502, "bad gateway\n");
        assert!(matches!(err, ParleyError::Api { ref message, .. } if message == "bad gateway"));
    }

    #[test]
    fn decode_line_skips_blank_and_flags_garbage() {
        assert!(decode_line::<serde_json::Value>(b"  \r\n").is_none());
        assert!(matches!(
            decode_line::<serde_json::Value>(b"{oops"),
            Some(Err(ParleyError::Stream(_)))
        ));
        assert!(matches!(
            decode_line::<serde_json::Value>(b"{\"done\":true}\n"),
            Some(Ok(_))
        ));
    }
}
