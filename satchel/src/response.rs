//! Decoded response payloads.

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::RequestError;

/// Decoded body of a successful response.
///
/// A response whose `Content-Type` mentions `application/json` is parsed as
/// JSON. Anything else is kept as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// Raw text body.
    Text(String),
}

impl ResponseData {
    pub(crate) fn decode(
        url: &str,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<Self, RequestError> {
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));

        if !is_json {
            return Ok(ResponseData::Text(String::from_utf8_lossy(body).into_owned()));
        }
        if body.is_empty() {
            return Ok(ResponseData::Json(serde_json::Value::Null));
        }
        serde_json::from_slice(body)
            .map(ResponseData::Json)
            .map_err(|error| RequestError::Decode {
                url: url.to_owned(),
                message: error.to_string(),
            })
    }

    /// Returns the JSON document, if this is JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            ResponseData::Text(_) => None,
        }
    }

    /// Returns the text body, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            ResponseData::Json(_) => None,
        }
    }

    /// Deserializes the payload into `T`.
    ///
    /// Text payloads are parsed as JSON first.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        match self {
            ResponseData::Json(value) => serde_json::from_value(value),
            ResponseData::Text(text) => serde_json::from_str(&text),
        }
    }
}
