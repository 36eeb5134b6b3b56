use serde_json::Value as JsonValue;

/// Decoded response payload.
///
/// Responses declaring an `application/json` content type are parsed;
/// everything else is returned as text.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseData {
    Json(JsonValue),
    /// Body decoded as UTF-8. Invalid sequences are replaced with
    /// `U+FFFD`; read [`TransportResponse::body`](crate::TransportResponse)
    /// from an `after_response` hook when the raw bytes matter.
    Text(String),
}
