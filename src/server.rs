//! Webhook server side
//!
//! Verifies pushes from the platform, decrypts safe-mode payloads, dispatches
//! the inbound message to registered handlers and renders the first reply as
//! passive-reply XML. [`Server::router`] exposes the whole thing as an axum
//! router.

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::WechatConfig;
use crate::crypto::WechatCrypto;
use crate::error::{Result, WechatError};
use crate::messages::Message;
use crate::types::{CallbackParams, EncryptedEnvelope, IncomingMessage, MsgType, VerifyParams};
use crate::xml;

/// Body returned when no handler replies
pub const EMPTY_REPLY: &str = "success";

/// Inbound message handler; `Some` becomes the passive reply
pub type Handler = Arc<dyn Fn(&IncomingMessage) -> Option<Message> + Send + Sync>;

#[derive(Default)]
struct Handlers {
    messages: HashMap<MsgType, Vec<Handler>>,
    /// Keyed by lowercased event name
    events: HashMap<String, Vec<Handler>>,
    any: Vec<Handler>,
}

/// Webhook server state
#[derive(Clone)]
pub struct Server {
    config: WechatConfig,
    crypto: Option<WechatCrypto>,
    handlers: Arc<RwLock<Handlers>>,
}

impl Server {
    pub fn new(config: WechatConfig, crypto: Option<WechatCrypto>) -> Self {
        Self {
            config,
            crypto,
            handlers: Arc::default(),
        }
    }

    // =========================================================================
    // Handler registration
    // =========================================================================

    /// Handle messages of one type
    pub fn on_message<F>(&self, msg_type: MsgType, handler: F) -> &Self
    where
        F: Fn(&IncomingMessage) -> Option<Message> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .messages
            .entry(msg_type)
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Handle one event (`subscribe`, `click`, ...), case-insensitive
    pub fn on_event<F>(&self, event: &str, handler: F) -> &Self
    where
        F: Fn(&IncomingMessage) -> Option<Message> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .events
            .entry(event.to_lowercase())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Fallback for anything not answered by a more specific handler
    pub fn on_any<F>(&self, handler: F) -> &Self
    where
        F: Fn(&IncomingMessage) -> Option<Message> + Send + Sync + 'static,
    {
        self.handlers.write().any.push(Arc::new(handler));
        self
    }

    pub fn handler_count(&self) -> usize {
        let handlers = self.handlers.read();
        handlers.messages.values().map(Vec::len).sum::<usize>()
            + handlers.events.values().map(Vec::len).sum::<usize>()
            + handlers.any.len()
    }

    /// Run handlers in order: event, message type, fallback; first reply wins
    pub fn dispatch(&self, message: &IncomingMessage) -> Option<Message> {
        let candidates: Vec<Handler> = {
            let handlers = self.handlers.read();
            let events = message
                .event_name()
                .and_then(|name| handlers.events.get(&name).cloned())
                .unwrap_or_default();
            let typed = handlers
                .messages
                .get(&message.msg_type)
                .cloned()
                .unwrap_or_default();
            events
                .into_iter()
                .chain(typed)
                .chain(handlers.any.iter().cloned())
                .collect()
        };

        candidates.iter().find_map(|handler| handler(message))
    }

    // =========================================================================
    // Protocol
    // =========================================================================

    /// Answer the URL verification request with its `echostr`
    pub fn verify(&self, params: &VerifyParams) -> Result<String> {
        if !WechatCrypto::verify(
            &self.config.token,
            &params.timestamp,
            &params.nonce,
            &params.signature,
        ) {
            warn!("Invalid signature in verification request");
            return Err(WechatError::InvalidSignature);
        }

        info!("Webhook verification successful");
        Ok(params.echostr.clone())
    }

    /// Handle a push and produce the response body
    pub fn handle(&self, params: &CallbackParams, body: &str) -> Result<String> {
        if !WechatCrypto::verify(
            &self.config.token,
            &params.timestamp,
            &params.nonce,
            &params.signature,
        ) {
            warn!("Invalid signature in push");
            return Err(WechatError::InvalidSignature);
        }

        let xml_content = if params.is_encrypted() {
            self.open_envelope(params, body)?
        } else {
            body.to_string()
        };

        if self.config.debug_mode {
            debug!("Raw XML content: {}", xml_content);
        }

        let message: IncomingMessage = xml::parse(&xml_content)?;
        info!(
            "Received {:?} from {}",
            message.msg_type, message.from_user_name
        );

        let Some(reply) = self.dispatch(&message) else {
            return Ok(EMPTY_REPLY.to_string());
        };

        let reply = reply.to_server(
            &message.from_user_name,
            &message.to_user_name,
            Utc::now().timestamp(),
        )?;

        match (&self.crypto, params.is_encrypted()) {
            (Some(crypto), true) => {
                crypto.encrypt_reply(&reply, &self.config.token, &params.timestamp, &params.nonce)
            }
            _ => Ok(reply),
        }
    }

    fn open_envelope(&self, params: &CallbackParams, body: &str) -> Result<String> {
        let envelope: EncryptedEnvelope = xml::parse(body)?;

        let msg_signature = params
            .msg_signature
            .as_deref()
            .ok_or(WechatError::InvalidSignature)?;
        if !WechatCrypto::verify_message(
            &self.config.token,
            &params.timestamp,
            &params.nonce,
            &envelope.encrypt,
            msg_signature,
        ) {
            warn!("Invalid message signature");
            return Err(WechatError::InvalidSignature);
        }

        let crypto = self.crypto.as_ref().ok_or_else(|| {
            WechatError::Crypto("Received encrypted push but no EncodingAESKey configured".into())
        })?;
        crypto.decrypt(&envelope.encrypt)
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    /// Router serving the webhook path and `/health`
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.config.webhook_path, get(verify).post(handle_message))
            .route("/health", get(health_check))
            .layer(middleware::from_fn(log_request))
            .with_state(self.clone())
    }
}

/// Run the webhook HTTP server
pub async fn run_server(addr: SocketAddr, server: Server) -> Result<()> {
    let app = server.router();

    info!("Webhook server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!("HTTP {} {} -> {}", method, path, response.status());
    response
}

fn status_for(e: &WechatError) -> StatusCode {
    match e {
        WechatError::InvalidSignature => StatusCode::FORBIDDEN,
        WechatError::Xml(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Webhook verification (GET request)
async fn verify(
    State(server): State<Server>,
    Query(params): Query<VerifyParams>,
) -> std::result::Result<String, StatusCode> {
    server.verify(&params).map_err(|e| status_for(&e))
}

/// Push handling (POST request)
async fn handle_message(
    State(server): State<Server>,
    Query(params): Query<CallbackParams>,
    body: String,
) -> std::result::Result<String, StatusCode> {
    server.handle(&params, &body).map_err(|e| {
        error!("Failed to handle push: {}", e);
        status_for(&e)
    })
}
