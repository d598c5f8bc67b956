//! Error classification for the HTTP-backed stores and the LLM client.
use healthrag_core::Cause;
use reqwest::StatusCode;

/// Unreachable servers, timeouts and 5xx responses are worth retrying; anything
/// the server rejected or that failed to decode is not.
pub fn http_cause(e: &reqwest::Error) -> Cause {
    if e.is_connect() || e.is_timeout() { return Cause::Transient; }
    if e.is_decode() || e.is_builder() { return Cause::Permanent; }
    match e.status() {
        Some(status) => status_cause(status),
        None => Cause::Transient,
    }
}

pub fn status_cause(status: StatusCode) -> Cause {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS { Cause::Transient } else { Cause::Permanent }
}
