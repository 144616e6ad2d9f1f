//! HTTP API for the evidence registry
//!
//! ## Evidence
//! - `POST /evidence` - Submit evidence (JSON body), returns `{"id": ...}`
//! - `GET /evidence/{id}` - `{"found": bool, "record": {...}}`
//! - `PUT /evidence/{id}/resources` - Replace the resource locator
//! - `POST /evidence/{id}/extra` - Attach extra info
//! - `GET /evidence/{id}/extra` - List identifiers attached under `{id}`
//!
//! ## Extra info
//! - `GET /extra/{id}` - `{"found": bool, "record": {...}}`
//!
//! ## Misc
//! - `GET /health` - Health check with store statistics
//! - `GET /version` - Protocol revision
//! - `GET /events` - WebSocket stream of registry events
//!
//! Writes identify the caller with the `x-agent-id` header; the caller
//! becomes the record's provider.
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST -H "x-agent-id: alice" -H "Content-Type: application/json" \
//!      -d '{"content_hash": "9f86...", "account": "0xAAA", "payload": "{}"}' \
//!      http://localhost:8095/evidence
//!
//! curl http://localhost:8095/evidence/3a5c...
//! ```

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::RegistryError;
use crate::event_stream;
use crate::identifier::Identifier;
use crate::services::response::{self, HandlerResult};
use crate::services::Services;
use crate::types::{AgentId, AttachExtraInfoInput, SubmitEvidenceInput, UpdateResourcesInput};
use crate::version;

/// Header carrying the calling agent's identity
pub const CALLER_HEADER: &str = "x-agent-id";

/// Query result that keeps the zero-valued sentinel and says whether it is one
#[derive(Debug, Serialize)]
pub struct Lookup<T> {
    pub found: bool,
    pub record: T,
}

#[derive(Debug, Serialize)]
struct CreatedId {
    id: Identifier,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), RegistryError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), RegistryError> {
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .with_upgrades()
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let result = match (&method, segments.as_slice()) {
            (&Method::GET, ["health"]) => self.handle_health(),
            (&Method::GET, ["version"]) => Ok(response::ok(&serde_json::json!({
                "version": version::version(),
            }))),
            (&Method::GET, ["events"]) => self.handle_events(req),

            (&Method::POST, ["evidence"]) => self.handle_submit(req).await,
            (&Method::GET, ["evidence", id]) => self.handle_get_evidence(id),
            (&Method::PUT, ["evidence", id, "resources"]) => {
                self.handle_update_resources(req, id).await
            }
            (&Method::POST, ["evidence", id, "extra"]) => self.handle_attach(req, id).await,
            (&Method::GET, ["evidence", id, "extra"]) => self.handle_list_attachments(id),

            (&Method::GET, ["extra", id]) => self.handle_get_extra_info(id),

            (_, ["evidence", ..]) | (_, ["extra", ..]) => Ok(response::method_not_allowed()),
            _ => Ok(response::not_found("Not Found")),
        };

        Ok(match result {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    RegistryError::Validation(_)
                    | RegistryError::Unauthorized(_)
                    | RegistryError::InvalidInput(_)
                    | RegistryError::Parse(_)
                    | RegistryError::Json(_) => debug!(error = %e, "Rejected request"),
                    _ => error!(error = %e, "Request error"),
                }
                response::error_response(e)
            }
        })
    }

    /// Health check endpoint
    fn handle_health(&self) -> HandlerResult {
        let stats = self.services.stats()?;
        Ok(response::ok(&serde_json::json!({
            "status": "ok",
            "version": version::version(),
            "evidence": stats.evidence_count,
            "extra_info": stats.extra_info_count,
            "global_counter": stats.global_counter,
            "subscribers": self.services.events.subscriber_count(),
        })))
    }

    /// POST /evidence
    async fn handle_submit(&self, req: Request<Incoming>) -> HandlerResult {
        let caller = caller_identity(&req);
        let input: SubmitEvidenceInput = read_json(req).await?;
        let caller = caller?;
        let result = self
            .services
            .evidence
            .submit(input, &caller)
            .map(|id| CreatedId { id });
        Ok(response::from_create_result(result))
    }

    /// GET /evidence/{id}
    fn handle_get_evidence(&self, id: &str) -> HandlerResult {
        let id = Identifier::from_hex(id)?;
        let record = self.services.evidence.fetch(&id)?;
        Ok(response::ok(&Lookup {
            found: !record.is_empty(),
            record,
        }))
    }

    /// PUT /evidence/{id}/resources
    async fn handle_update_resources(&self, req: Request<Incoming>, id: &str) -> HandlerResult {
        let id = Identifier::from_hex(id)?;
        let caller = caller_identity(&req);
        let input: UpdateResourcesInput = read_json(req).await?;
        let caller = caller?;
        Ok(response::from_result(
            self.services.evidence.update_resources(&id, input, &caller),
        ))
    }

    /// POST /evidence/{id}/extra
    async fn handle_attach(&self, req: Request<Incoming>, parent: &str) -> HandlerResult {
        let parent = Identifier::from_hex(parent)?;
        let caller = caller_identity(&req);
        let input: AttachExtraInfoInput = read_json(req).await?;
        let caller = caller?;
        let result = self
            .services
            .extra_info
            .attach(&parent, input, &caller)
            .map(|id| CreatedId { id });
        Ok(response::from_create_result(result))
    }

    /// GET /evidence/{id}/extra
    fn handle_list_attachments(&self, parent: &str) -> HandlerResult {
        let parent = Identifier::from_hex(parent)?;
        let ids = self.services.evidence.attachments(&parent)?;
        Ok(response::ok(&serde_json::json!({
            "parent": parent,
            "extra_count": ids.len(),
            "ids": ids,
        })))
    }

    /// GET /extra/{id}
    fn handle_get_extra_info(&self, id: &str) -> HandlerResult {
        let id = Identifier::from_hex(id)?;
        let record = self.services.extra_info.fetch(&id)?;
        Ok(response::ok(&Lookup {
            found: !record.is_empty(),
            record,
        }))
    }

    /// GET /events - upgrade to a WebSocket event stream
    fn handle_events(&self, mut req: Request<Incoming>) -> HandlerResult {
        if !hyper_tungstenite::is_upgrade_request(&req) {
            return Ok(response::bad_request("Expected WebSocket upgrade"));
        }

        let (response, websocket) = hyper_tungstenite::upgrade(&mut req, None)
            .map_err(|e| RegistryError::InvalidInput(format!("WebSocket upgrade failed: {}", e)))?;

        let events = Arc::clone(&self.services.events);
        tokio::spawn(event_stream::serve_event_stream(websocket, events));

        Ok(response)
    }
}

/// Read the caller identity header
fn caller_identity<B>(req: &Request<B>) -> Result<AgentId, RegistryError> {
    req.headers()
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(AgentId::new)
        .ok_or_else(|| RegistryError::InvalidInput(format!("missing {} header", CALLER_HEADER)))
}

/// Collect and decode a JSON request body
///
/// Write handlers drain the body before rejecting a request so the connection
/// closes cleanly.
async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, RegistryError> {
    let body = req
        .collect()
        .await
        .map_err(|e| RegistryError::InvalidInput(format!("Failed to read body: {}", e)))?;
    Ok(serde_json::from_slice(&body.to_bytes())?)
}
