//! Transport adapters: WebSocket command surface, push streams and the
//! notifications endpoint. Everything here translates between the wire and
//! the exchange core's session calls.

pub mod api;
pub mod auth;
pub mod conn;
pub mod info;
pub mod notifications;
pub mod streams;
pub mod wire;

pub use api::AppState;
pub use conn::{Frame, UserConn};
pub use streams::StreamKind;

use crate::error::ExchangeError;

/// JSON error frame shared by every endpoint.
pub(crate) fn error_frame(err: &ExchangeError) -> String {
    serde_json::json!({ "code": err.kind(), "error": err.to_string() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_frames_carry_code_and_detail() {
        let frame = error_frame(&ExchangeError::not_found("order A"));
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["code"], "not_found");
        assert_eq!(v["error"], "not found: order A");
    }
}
