//! Resource classification of intercepted requests.

use http::{Request, Uri};
use serde::{Deserialize, Serialize};

use crate::WorkerConfig;

/// Class of an intercepted request, selecting the caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    /// Build asset or third-party asset: cache-first with offline page.
    StaticAsset,
    /// Backend API call: network-first with cached or synthesized fallback.
    ApiCall,
    /// Top-level page load: network-first with cached fallback.
    PageNavigation,
    /// Anything else: cache-first.
    Other,
}

/// Classifies `request`.
///
/// Checked in order: static asset (path prefix, file extension or asset
/// host), API prefix, navigation headers.
pub fn classify<B>(config: &WorkerConfig, request: &Request<B>) -> ResourceClass {
    let uri = request.uri();
    let path = uri.path();

    let from_asset_host = uri
        .host()
        .is_some_and(|host| config.asset_hosts.iter().any(|allowed| allowed == host));
    if from_asset_host
        || path.starts_with(&config.static_path_prefix)
        || has_static_extension(config, path)
    {
        return ResourceClass::StaticAsset;
    }
    if path.starts_with(&config.api_path_prefix) {
        return ResourceClass::ApiCall;
    }
    if is_navigation(request) {
        return ResourceClass::PageNavigation;
    }
    ResourceClass::Other
}

/// Canonical cache store key of `uri`.
///
/// Requests to an asset host keep their full URL. Everything else is keyed
/// by path and query, so `http://exam.local/static/app.css` and
/// `/static/app.css` address the same entry.
pub fn store_key(config: &WorkerConfig, uri: &Uri) -> String {
    if let Some(host) = uri.host()
        && config.asset_hosts.iter().any(|allowed| allowed == host)
    {
        return uri.to_string();
    }
    uri.path_and_query()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "/".to_owned())
}

/// Returns `true` for top-level document loads.
pub fn is_navigation<B>(request: &Request<B>) -> bool {
    let headers = request.headers();
    let header_is = |name: &str, value: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case(value))
    };
    header_is("sec-fetch-mode", "navigate") || header_is("sec-fetch-dest", "document")
}

fn has_static_extension(config: &WorkerConfig, path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => config
            .static_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request<()> {
        Request::get(uri).body(()).unwrap()
    }

    #[test]
    fn static_assets() {
        let config = WorkerConfig::default();
        assert_eq!(classify(&config, &get("/static/js/app.js")), ResourceClass::StaticAsset);
        assert_eq!(classify(&config, &get("/favicon.ico")), ResourceClass::StaticAsset);
        assert_eq!(classify(&config, &get("/img/Logo.PNG")), ResourceClass::StaticAsset);
        assert_eq!(
            classify(&config, &get("https://cdn.jsdelivr.net/npm/marked")),
            ResourceClass::StaticAsset
        );
    }

    #[test]
    fn api_calls() {
        let config = WorkerConfig::default();
        assert_eq!(classify(&config, &get("/api/chapters")), ResourceClass::ApiCall);
        assert_eq!(
            classify(&config, &get("http://exam.local/api/concepts?chapter=1")),
            ResourceClass::ApiCall
        );
    }

    #[test]
    fn same_origin_keys_drop_scheme_and_host() {
        let config = WorkerConfig::default();
        let key = |uri: &str| store_key(&config, &uri.parse().unwrap());
        assert_eq!(key("http://exam.local/static/app.css"), "/static/app.css");
        assert_eq!(key("/static/app.css"), "/static/app.css");
        assert_eq!(key("http://exam.local/api/concepts?chapter=1"), "/api/concepts?chapter=1");
        assert_eq!(key("http://exam.local"), "/");
        assert_eq!(
            key("https://cdn.jsdelivr.net/npm/marked"),
            "https://cdn.jsdelivr.net/npm/marked"
        );
    }

    #[test]
    fn navigations_and_other() {
        let config = WorkerConfig::default();
        let navigation = Request::get("/exam/3")
            .header("sec-fetch-mode", "navigate")
            .body(())
            .unwrap();
        assert_eq!(classify(&config, &navigation), ResourceClass::PageNavigation);

        let document = Request::get("/")
            .header("sec-fetch-dest", "document")
            .body(())
            .unwrap();
        assert_eq!(classify(&config, &document), ResourceClass::PageNavigation);

        assert_eq!(classify(&config, &get("/exam/3")), ResourceClass::Other);
        assert_eq!(classify(&config, &get("/.hidden")), ResourceClass::Other);
    }
}
