//! Conversion between HTTP responses and stored entries.
//!
//! The body is stored as the entry blob. Status and headers go into the
//! entry metadata: status under `status`, headers as a JSON array of
//! `[name, value]` pairs under `headers`.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Response, StatusCode};
use satchel_store::{Metadata, StoredEntry};

use crate::WorkerError;

const STATUS: &str = "status";
const HEADERS: &str = "headers";

/// Splits a response into a storable blob and metadata.
pub fn encode(response: &Response<Bytes>) -> (Bytes, Metadata) {
    let headers: Vec<(&str, &str)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect();

    let mut metadata = Metadata::new();
    metadata.insert(STATUS.to_owned(), response.status().as_u16().to_string());
    // A list of string pairs always serializes.
    if let Ok(headers) = serde_json::to_string(&headers) {
        metadata.insert(HEADERS.to_owned(), headers);
    }
    (response.body().clone(), metadata)
}

/// Rebuilds the response stored under `key`.
pub fn decode(key: &str, entry: StoredEntry) -> Result<Response<Bytes>, WorkerError> {
    let corrupt = |reason: String| WorkerError::CorruptEntry {
        key: key.to_owned(),
        reason,
    };

    let status = entry
        .meta(STATUS)
        .ok_or_else(|| corrupt("missing status".to_owned()))?
        .parse::<u16>()
        .map_err(|err| corrupt(err.to_string()))
        .and_then(|code| StatusCode::from_u16(code).map_err(|err| corrupt(err.to_string())))?;

    let headers: Vec<(String, String)> = match entry.meta(HEADERS) {
        Some(raw) => serde_json::from_str(raw).map_err(|err| corrupt(err.to_string()))?,
        None => Vec::new(),
    };

    let (body, _) = entry.into_parts();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    for (name, value) in headers {
        let name = HeaderName::try_from(name).map_err(|err| corrupt(err.to_string()))?;
        let value = HeaderValue::try_from(value).map_err(|err| corrupt(err.to_string()))?;
        response.headers_mut().append(name, value);
    }
    Ok(response)
}
