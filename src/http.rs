use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::TrackerError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub fn user_agent() -> String {
    format!("asm-track/{}", env!("CARGO_PKG_VERSION"))
}

pub fn base_headers() -> Result<HeaderMap, TrackerError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?,
    );
    Ok(headers)
}

pub fn build_client(
    headers: HeaderMap,
    timeout_secs: u64,
    on_error: fn(String) -> TrackerError,
) -> Result<Client, TrackerError> {
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|err| on_error(err.to_string()))
}

pub fn send_with_retries<F>(
    mut make_req: F,
    on_error: fn(String) -> TrackerError,
) -> Result<Response, TrackerError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(on_error(err.to_string()));
            }
        }
    }
}

pub fn read_text(
    response: Response,
    on_error: fn(String) -> TrackerError,
    on_status: fn(u16, String) -> TrackerError,
) -> Result<String, TrackerError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .map(|body| body.trim().chars().take(200).collect::<String>())
            .unwrap_or_else(|_| "request failed".to_string());
        return Err(on_status(status, message));
    }
    response.text().map_err(|err| on_error(err.to_string()))
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }
}
