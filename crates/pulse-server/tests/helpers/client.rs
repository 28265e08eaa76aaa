//! Test client helpers.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use pulse_cache::{CacheClient, MemoryStore};
use pulse_server::middleware::cors_layer;
use pulse_server::{AppState, Settings, create_router};
use tower::ServiceExt;

/// Router plus the state behind it, so tests can seed and inspect services.
pub struct TestClient {
    app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestClient {
    pub async fn new(settings: Settings) -> Self {
        let store = Arc::new(MemoryStore::new(10_000));
        let cache = CacheClient::new(store.clone(), settings.cache.to_config());
        cache.connect().await.expect("memory store always answers ping");

        let state = AppState::from_settings(&settings, cache);
        // Recorder sin instalar: solo se usa para renderizar
        let prometheus = PrometheusBuilder::new().build_recorder().handle();

        Self {
            app: create_router(
                state.clone(),
                prometheus,
                cors_layer(&settings.server.cors_origins),
            ),
            state,
            store,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .uri(uri)
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn options(&self, uri: &str, headers: Vec<(&str, &str)>) -> TestResponse {
        let mut builder = Request::builder().uri(uri).method("OPTIONS");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_headers(&self, uri: &str, headers: Vec<(&str, &str)>) -> TestResponse {
        let mut builder = Request::builder().uri(uri).method("GET");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        TestResponse::from_response(response).await
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn from_response(response: Response<Body>) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        Self {
            status,
            headers,
            body,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Body is not valid UTF-8")
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_content_type_contains(&self, expected: &str) -> &Self {
        let content_type = self
            .header("content-type")
            .expect("Response missing Content-Type header");
        assert!(
            content_type.contains(expected),
            "Expected Content-Type to contain '{}' but got '{}'",
            expected,
            content_type
        );
        self
    }

    pub fn assert_header_exists(&self, name: &str) -> &Self {
        assert!(
            self.headers.contains_key(name),
            "Expected header '{}' to exist",
            name
        );
        self
    }

    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let value = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name));
        assert_eq!(
            value, expected,
            "Expected header '{}' to be '{}' but got '{}'",
            name, expected, value
        );
        self
    }
}

/// TestClient con la configuracion por defecto y cache en memoria.
pub async fn client() -> TestClient {
    client_with_settings(Settings::default()).await
}

pub async fn client_with_settings(settings: Settings) -> TestClient {
    TestClient::new(settings).await
}
