//! Mapping of failed HTTP answers onto provider errors
//!
//! Only a rejected or missing credential is a configuration problem that
//! should stop a run. Rate limits, quota exhaustion, timeouts and a request
//! the provider refused for its content fail the current call only.

use reqwest::StatusCode;
use transqueue::ProviderError;

/// Markers providers put in a 400/403 body when the key itself is bad
const INVALID_KEY_MARKERS: &[&str] = &[
    "api key not valid",
    "api_key_invalid",
    "keyinvalid",
    "invalid api key",
    "invalid key",
    "invalid credentials",
];

fn mentions_invalid_key(body: &str) -> bool {
    let body = body.to_lowercase();
    INVALID_KEY_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Turn a non-success status and its body into a [`ProviderError`]
pub fn classify(status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
            ProviderError::Config(format!("API rejected credentials ({}): {}", status, body))
        }
        StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN if mentions_invalid_key(body) => {
            ProviderError::Config(format!("API rejected credentials ({}): {}", status, body))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::Network(format!("API timed out ({}): {}", status, body))
        }
        status if status.is_client_error() => {
            ProviderError::Translation(format!("API client error ({}): {}", status, body))
        }
        _ => ProviderError::Translation(format!("API server error ({}): {}", status, body)),
    }
}

/// One-shot HTTP server answering a single request with a canned response
#[cfg(test)]
pub(crate) mod fake_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Serve `status_line` (e.g. `"429 Too Many Requests"`) and `body` once,
    /// returning the base URL to point a client at
    pub async fn respond_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(end) = header_end(&request) {
                    let head = String::from_utf8_lossy(&request[..end]).to_string();
                    if request.len() >= end + content_length(&head) {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }
}
