//! Pingora service
//!
//! Every request is answered in `request_filter`: redirected, handed to the
//! matching site, or refused with a 404. Nothing is ever proxied upstream.

use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{Request, Response, StatusCode};
use pingora::prelude::*;
use pingora::proxy::{ProxyHttp, Session};
use tracing::{debug, info, trace, warn};

use crate::http_helpers::{
    redirect_response, request_host, request_path, text_response, to_http_request, write_response,
};
use crate::routing::{HostRouter, RoutingOutcome};

/// Largest request body buffered for a site handler
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Keepalive for responses written by the service
const KEEPALIVE_SECS: Option<u64> = Some(60);

/// Per-request state
#[derive(Debug)]
pub struct RequestContext {
    started: Instant,
    pub host: String,
    pub method: String,
    pub path: String,
    pub outcome: &'static str,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            host: String::new(),
            method: String::new(),
            path: String::new(),
            outcome: "pending",
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The HTTP front door
#[derive(Debug, Clone)]
pub struct FrontDoorService {
    router: HostRouter,
}

impl FrontDoorService {
    pub fn new(router: HostRouter) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &HostRouter {
        &self.router
    }

    async fn read_body(session: &mut Session) -> Result<Option<Bytes>, Box<Error>> {
        let mut body = BytesMut::new();
        while let Some(chunk) = session.read_request_body().await? {
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Ok(None);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Some(body.freeze()))
    }
}

/// Turn a routing outcome into the response sent to the client.
///
/// `request` is the buffered request for a dispatch, or `None` when its body
/// exceeded [`MAX_BODY_BYTES`]; the handler is not called in that case.
pub async fn respond(
    outcome: RoutingOutcome,
    request: Option<Request<Bytes>>,
    ctx: &mut RequestContext,
) -> Response<Bytes> {
    ctx.outcome = outcome.label();

    match outcome {
        RoutingOutcome::Redirect { status, location } => {
            debug!(host = %ctx.host, location = %location, "Redirecting to root domain");
            redirect_response(status, &location)
        }
        RoutingOutcome::Dispatch(handler) => match request {
            Some(request) => handler.handle(&request).await,
            None => {
                warn!(host = %ctx.host, limit = MAX_BODY_BYTES, "Request body too large");
                ctx.outcome = "body_too_large";
                text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large\n")
            }
        },
        RoutingOutcome::NotFound => text_response(StatusCode::NOT_FOUND, "Not Found\n"),
    }
}

#[async_trait]
impl ProxyHttp for FrontDoorService {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new()
    }

    async fn request_filter(
        &self,
        session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<bool, Box<Error>> {
        let req_header = session.req_header();
        ctx.host = request_host(req_header).unwrap_or_default().to_string();
        ctx.path = request_path(req_header).to_string();
        ctx.method = req_header.method.as_str().to_string();

        let outcome = self.router.route(&ctx.host, &ctx.path);
        ctx.outcome = outcome.label();
        trace!(host = %ctx.host, path = %ctx.path, outcome = ?outcome, "Routed request");

        let request = match &outcome {
            RoutingOutcome::Dispatch(_) => Self::read_body(session)
                .await?
                .map(|body| to_http_request(session.req_header(), body)),
            _ => None,
        };
        let response = respond(outcome, request, ctx).await;

        write_response(session, response, KEEPALIVE_SECS).await?;
        Ok(true)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>, Box<Error>> {
        Err(Error::explain(
            ErrorType::InternalError,
            "front door does not proxy to upstreams",
        ))
    }

    async fn logging(&self, session: &mut Session, error: Option<&Error>, ctx: &mut Self::CTX) {
        let status = session
            .response_written()
            .map(|r| r.status.as_u16())
            .unwrap_or(0);

        info!(
            target: "access",
            host = %ctx.host,
            method = %ctx.method,
            path = %ctx.path,
            outcome = ctx.outcome,
            status = status,
            duration_ms = ctx.elapsed().as_millis() as u64,
            error = ?error.map(|e| e.to_string()),
            "Request completed"
        );
    }
}
