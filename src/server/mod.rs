//! HTTP surface: the JSON read API and the static dashboard.
//!
//! `POST` on any path returns the full registry snapshot as
//! `{ "data": { .. }, "errors": [] }`; `GET` serves dashboard files from
//! the configured static directory. The accept loop is synchronous
//! (`tiny_http`) and runs on a blocking thread so it never competes with
//! the sampler for the async runtime.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::registry::{DeviceRegistry, RegistrySnapshot};

/// Wire shape of every API response. `errors` is empty on the success
/// path; a read-side failure yields empty `data` plus the error messages,
/// never a silent partial payload.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub data: RegistrySnapshot,
    pub errors: Vec<String>,
}

/// Handle to the running HTTP server.
pub struct HttpServer {
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Bind `addr` and start serving requests on a blocking thread.
    pub fn bind(
        addr: &str,
        registry: Arc<DeviceRegistry>,
        static_dir: PathBuf,
    ) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| Error::task(format!("failed to bind {addr}: {e}")))?;
        let server = Arc::new(server);

        let accept = Arc::clone(&server);
        let worker = tokio::task::spawn_blocking(move || {
            for request in accept.incoming_requests() {
                handle_request(request, &registry, &static_dir);
            }
            debug!("http accept loop terminated");
        });

        Ok(Self {
            server,
            worker: Some(worker),
        })
    }

    /// Address the server actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Unblock the accept loop and wait for it to finish. In-flight
    /// requests complete with the snapshot they already took.
    pub async fn shutdown(mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

fn handle_request(request: Request, registry: &DeviceRegistry, static_dir: &Path) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let outcome = match method {
        Method::Post => respond_api(request, registry),
        Method::Get => respond_static(request, static_dir, &url),
        _ => request.respond(Response::empty(405)),
    };

    if let Err(e) = outcome {
        warn!(?method, url, error = %e, "failed to send response");
    }
}

fn respond_api(request: Request, registry: &DeviceRegistry) -> std::io::Result<()> {
    let body = match snapshot_body(registry) {
        Ok(body) => body,
        Err(e) => {
            // Still answer with the contract shape, carrying the error.
            let fallback = ApiResponse {
                data: RegistrySnapshot::new(),
                errors: vec![e.to_string()],
            };
            serde_json::to_vec(&fallback).unwrap_or_else(|_| b"{}".to_vec())
        }
    };

    request.respond(Response::from_data(body).with_header(json_header()))
}

/// Serialize the current snapshot into the `{data, errors}` wire shape.
fn snapshot_body(registry: &DeviceRegistry) -> Result<Vec<u8>> {
    let response = ApiResponse {
        data: registry.snapshot(),
        errors: Vec::new(),
    };
    Ok(serde_json::to_vec(&response)?)
}

fn respond_static(request: Request, static_dir: &Path, url: &str) -> std::io::Result<()> {
    let Some(relative) = sanitize_path(url) else {
        return request.respond(Response::empty(404));
    };

    let path = static_dir.join(relative);
    match std::fs::read(&path) {
        Ok(contents) => {
            let content_type = content_type_for(&path);
            request.respond(
                Response::from_data(contents).with_header(
                    Header::from_bytes("Content-Type", content_type)
                        .expect("static content-type header"),
                ),
            )
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "static file not served");
            request.respond(Response::empty(404))
        }
    }
}

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("json content-type header")
}

/// Map a request URL to a relative path under the static directory.
/// Returns `None` for anything that would escape it.
fn sanitize_path(url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Some(PathBuf::from("index.html"));
    }

    let candidate = PathBuf::from(trimmed);
    let safe = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    safe.then_some(candidate)
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
