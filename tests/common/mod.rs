#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, Uri},
    routing::{MethodRouter, get},
};
use serde_json::Value;
use tokio::net::TcpListener;
use tubegrab::{
    AppState, build_router,
    config::{Config, MediaApiConfig},
};
use url::Url;

pub const VIDEO_ID: &str = "dQw4w9WgXcQ";
pub const API_KEY: &str = "test-key";

pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server runs");
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn relay_config(media_api_base: &str, api_key: Option<&str>) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        media_api: MediaApiConfig::new(
            Url::parse(media_api_base).expect("media api base parses"),
            api_key.map(ToString::to_string),
        ),
        allowed_origins: Vec::new(),
    }
}

pub async fn spawn_relay(media_api_base: &str, api_key: Option<&str>) -> String {
    let config = relay_config(media_api_base, api_key);
    let state = AppState::new(&config).expect("state builds");
    let router = build_router(state, &config).expect("router builds");
    serve(router).await
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub path_and_query: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
}

/// Requests seen by a fake upstream, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Hits(Arc<Mutex<Vec<Hit>>>);

impl Hits {
    fn record(&self, uri: &Uri, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string)
        };
        self.0.lock().expect("hits lock").push(Hit {
            path_and_query: uri.to_string(),
            api_key: header("x-rapidapi-key"),
            api_host: header("x-rapidapi-host"),
        });
    }

    pub fn all(&self) -> Vec<Hit> {
        self.0.lock().expect("hits lock").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .map(|hit| hit.path_and_query)
            .collect()
    }
}

/// A GET route answering with a fixed status and JSON body.
pub fn scripted(status: u16, body: Value, hits: &Hits) -> MethodRouter {
    let hits = hits.clone();
    get(move |uri: Uri, headers: HeaderMap| {
        let hits = hits.clone();
        let body = body.clone();
        async move {
            hits.record(&uri, &headers);
            (
                StatusCode::from_u16(status).expect("valid scripted status"),
                Json(body),
            )
        }
    })
}

/// Fake media-info API. Each entry is `(path, status, body)`.
pub async fn fake_media_api(script: Vec<(&str, u16, Value)>) -> (String, Hits) {
    let hits = Hits::default();
    let mut router = Router::new();
    for (path, status, body) in script {
        router = router.route(path, scripted(status, body, &hits));
    }
    (serve(router).await, hits)
}
