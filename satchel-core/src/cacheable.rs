//! The cacheability rule shared by every caching layer.
//!
//! The request client and the offline cache layer sit on the same network
//! path. They must agree on what may be cached, otherwise one layer would
//! store what the other refuses to serve. Both call [`is_cacheable`].

use http::{Method, StatusCode};

/// Returns `true` if a response to a `method` request with `status` may be cached.
///
/// Only successful (`2xx`) responses to `GET` requests are cacheable.
///
/// ```
/// use http::{Method, StatusCode};
/// use satchel_core::is_cacheable;
///
/// assert!(is_cacheable(&Method::GET, StatusCode::OK));
/// assert!(!is_cacheable(&Method::POST, StatusCode::OK));
/// assert!(!is_cacheable(&Method::GET, StatusCode::NOT_FOUND));
/// ```
#[inline]
pub fn is_cacheable(method: &Method, status: StatusCode) -> bool {
    method == Method::GET && status.is_success()
}

/// Returns `true` if requests with `method` are candidates for caching at all.
#[inline]
pub fn is_cacheable_method(method: &Method) -> bool {
    method == Method::GET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_successful_get_is_cacheable() {
        assert!(is_cacheable(&Method::GET, StatusCode::NO_CONTENT));
        assert!(!is_cacheable(&Method::GET, StatusCode::MOVED_PERMANENTLY));
        assert!(!is_cacheable(&Method::GET, StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_cacheable(&Method::PUT, StatusCode::OK));
        assert!(!is_cacheable(&Method::HEAD, StatusCode::OK));
    }
}
