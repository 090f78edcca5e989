//! Shared test scaffolding: in-memory app, request builders, local fakes

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;
use tower::util::ServiceExt;
use wastewise_api::services::MidtransClient;
use wastewise_api::{build_router, AppState};
use wastewise_common::config::{MidtransConfig, MidtransMode, ServiceConfig};
use wastewise_common::db::init_in_memory;

pub const SERVER_KEY: &str = "SB-Mid-server-test";
pub const CLIENT_KEY: &str = "SB-Mid-client-test";
pub const BOUNDARY: &str = "wastewise-test-boundary";

/// Router plus the handles tests inspect directly
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn upload_path(&self, filename: &str) -> std::path::PathBuf {
        self.uploads.path().join(filename)
    }

    /// Send a request and decode the JSON body (Null when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn test_config(upload_dir: &Path, ml_service_url: &str, mode: MidtransMode) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 3001,
        database_path: ":memory:".into(),
        upload_dir: upload_dir.to_path_buf(),
        environment: "test".to_string(),
        ml_service_url: ml_service_url.to_string(),
        frontend_url: "https://wastewise.example".to_string(),
        midtrans: MidtransConfig {
            mode,
            server_key: Some(SERVER_KEY.to_string()),
            client_key: Some(CLIENT_KEY.to_string()),
        },
        log_level: "debug".to_string(),
    }
}

/// App backed by an in-memory database and a temporary upload dir
pub async fn create_test_app() -> TestApp {
    let ml_url = unreachable_url().await;
    create_test_app_with(&ml_url, MidtransMode::Sandbox, None).await
}

/// App with an explicit ML service URL, Midtrans mode and optional
/// Midtrans endpoint override (`base` serves both Snap and Core paths)
pub async fn create_test_app_with(
    ml_service_url: &str,
    mode: MidtransMode,
    midtrans_base: Option<&str>,
) -> TestApp {
    let pool = init_in_memory().await.expect("Failed to create in-memory database");
    let uploads = tempfile::tempdir().expect("Failed to create upload dir");
    let config = test_config(uploads.path(), ml_service_url, mode);

    let mut state = AppState::new(pool.clone(), config).expect("Failed to build state");
    if let Some(base) = midtrans_base {
        let client = MidtransClient::new(state.config.midtrans.clone())
            .unwrap()
            .with_endpoints(&format!("{}/snap/v1/transactions", base), &format!("{}/v2", base));
        state = state.with_midtrans(client);
    }

    TestApp {
        app: build_router(state),
        pool,
        uploads,
    }
}

/// Serve a router on an ephemeral local port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// URL of a port nothing listens on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// One part of a multipart body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(method: &str, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// A small valid PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 160, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
