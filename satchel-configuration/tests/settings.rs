use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use pretty_assertions::assert_eq;
use satchel::{ClientConfig, RequestOptions, ServiceTransport};
use satchel_configuration::{ConfigError, Settings};
use satchel_store::MemoryStorage;
use satchel_worker::WorkerConfig;
use tower::Layer;

#[test]
fn test_full_document() {
    let yaml = r#"
client:
  baseURL: "https://exam.example"
  timeout: 8s
  retryAttempts: 2
  retryDelay: 500ms
  cacheTimeout: 5m
  maxConcurrentRequests: 4
  cacheCapacity: 50
  healthPath: /healthz
worker:
  version: v9
  manifest:
    - /
    - /offline.html
  apiTimeout: 3s
  assetHosts:
    - cdn.example
"#;

    let settings = Settings::from_yaml(yaml).expect("failed to load");

    assert_eq!(
        settings.client,
        ClientConfig {
            base_url: "https://exam.example".to_string(),
            timeout: Duration::from_secs(8),
            retry_attempts: 2,
            retry_delay: Duration::from_millis(500),
            cache_timeout: Duration::from_secs(300),
            max_concurrent_requests: 4,
            cache_capacity: 50,
            health_path: "/healthz".to_string(),
        }
    );
    assert_eq!(
        settings.worker,
        WorkerConfig {
            manifest: vec!["/".to_string(), "/offline.html".to_string()],
            api_timeout: Duration::from_secs(3),
            asset_hosts: vec!["cdn.example".to_string()],
            ..WorkerConfig::for_version("v9")
        }
    );
}

#[test]
fn test_omitted_options_take_defaults() {
    let settings = Settings::from_yaml("{}").expect("failed to load");
    assert_eq!(settings, Settings::default());

    let settings = Settings::from_yaml("client:\n  retryAttempts: 0\n").expect("failed to load");
    assert_eq!(settings.client.retry_attempts, 0);
    assert_eq!(settings.client.max_concurrent_requests, 6);
    assert_eq!(settings.worker, WorkerConfig::default());
}

#[test]
fn test_unknown_option_is_rejected() {
    let error = Settings::from_yaml("client:\n  retries: 3\n").unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)), "{error}");
}

#[test]
fn test_invalid_client_section() {
    let error = Settings::from_yaml("client:\n  maxConcurrentRequests: 0\n").unwrap_err();
    assert!(matches!(
        error,
        ConfigError::Client(satchel::ConfigError::ZeroConcurrency)
    ));
}

#[test]
fn test_yaml_roundtrip() {
    let settings = Settings {
        client: ClientConfig::builder()
            .base_url("http://localhost:5000")
            .retry_delay(Duration::from_millis(250))
            .build()
            .unwrap(),
        worker: WorkerConfig::for_version("v4"),
    };

    let yaml = settings.to_yaml().expect("failed to serialize");
    assert!(yaml.contains("baseURL"), "{yaml}");
    assert!(yaml.contains("maxConcurrentRequests"), "{yaml}");

    let restored = Settings::from_yaml(&yaml).expect("failed to deserialize");
    assert_eq!(restored, settings);
}

#[test]
fn test_missing_file() {
    let error = Settings::from_path("/nonexistent/satchel.yaml").unwrap_err();
    assert!(matches!(error, ConfigError::Io { .. }));
}

#[tokio::test]
async fn test_settings_build_both_layers() {
    let settings =
        Settings::from_yaml("client:\n  baseURL: http://exam.local\nworker:\n  version: v5\n")
            .expect("failed to load");

    let service = tower::service_fn(|req: Request<Bytes>| async move {
        Ok::<_, std::convert::Infallible>(Response::new(Bytes::from(req.uri().to_string())))
    });
    let client = settings.client(ServiceTransport::new(service)).unwrap();
    let echoed = client
        .get("/api/chapters", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(echoed.as_text(), Some("http://exam.local/api/chapters"));

    let layer = settings.offline_layer(Arc::new(MemoryStorage::new()));
    let worker = layer.layer(tower::service_fn(|_req: Request<Bytes>| async move {
        Ok::<_, std::convert::Infallible>(Response::new(Bytes::new()))
    }));
    assert_eq!(worker.config().static_cache_name(), "static-v5");
}

#[tokio::test]
async fn test_client_over_offline_layer() {
    let settings = Settings::from_yaml(
        "client:\n  baseURL: http://exam.local\n  retryAttempts: 0\nworker:\n  version: v5\n",
    )
    .expect("failed to load");

    let unreachable = tower::service_fn(|_req: Request<Bytes>| async move {
        Err::<Response<Bytes>, _>(std::io::Error::other("connection refused"))
    });
    let worker = settings
        .offline_layer(Arc::new(MemoryStorage::new()))
        .layer(unreachable);
    let client = settings.client(ServiceTransport::new(worker)).unwrap();

    // The offline layer answers for the unreachable backend.
    let error = client
        .get("/api/chapters", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
}

#[tokio::test]
async fn test_client_reads_precached_assets_offline() {
    let settings = Settings::from_yaml(
        "client:\n  baseURL: http://exam.local\n  retryAttempts: 0\nworker:\n  version: v5\n  manifest:\n    - /static/app.css\n",
    )
    .expect("failed to load");

    let offline = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&offline);
    let backend = tower::service_fn(move |req: Request<Bytes>| {
        let offline = flag.load(Ordering::SeqCst);
        async move {
            if offline {
                return Err(std::io::Error::other("connection refused"));
            }
            Ok(Response::new(Bytes::from(format!("body of {}", req.uri().path()))))
        }
    });
    let worker = settings
        .offline_layer(Arc::new(MemoryStorage::new()))
        .layer(backend);
    worker.install().await.expect("install failed");
    worker.activate().await.expect("activation failed");
    offline.store(true, Ordering::SeqCst);

    let client = settings.client(ServiceTransport::new(worker)).unwrap();
    let cached = client
        .get("/static/app.css", RequestOptions::new())
        .await
        .expect("precached asset should be served offline");
    assert_eq!(cached.as_text(), Some("body of /static/app.css"));
}
