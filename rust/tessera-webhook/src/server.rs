//! HTTP/1 server for the authentication and authorization webhooks.
//!
//! Each connection is served on its own task. Handlers share only the
//! immutable [`Webhook`] state. Token evaluation runs on the blocking pool
//! so an expensive token cannot stall the tasks serving other connections.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tessera_credentials::{PublicKeyFile, RootKeyProvider};
use tessera_datalog::RunLimits;
use tessera_kube::review::{SubjectAccessReview, TokenReview};
use tessera_kube::{authenticate_review, authorize_review};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::WebhookError;
use crate::settings::{DEFAULT_MAX_BODY_BYTES, WebhookSettings};

/// Path of the `TokenReview` webhook.
pub const AUTHENTICATE_PATH: &str = "/authenticate";
/// Path of the `SubjectAccessReview` webhook.
pub const AUTHORIZE_PATH: &str = "/authorize";
/// Liveness probe path.
pub const HEALTH_PATH: &str = "/healthz";

/// State shared by every request.
pub struct Webhook {
    root: Arc<dyn RootKeyProvider>,
    limits: RunLimits,
    max_body_bytes: usize,
}

impl Webhook {
    /// Answer reviews with tokens rooted in `root`.
    pub fn new(root: Arc<dyn RootKeyProvider>, limits: RunLimits) -> Self {
        Self {
            root,
            limits,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Reject request bodies larger than `max_body_bytes`.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Build the state described by `settings`: the root key is read from
    /// the public key file on every request.
    pub fn from_settings(settings: &WebhookSettings) -> Self {
        Self::new(
            Arc::new(PublicKeyFile::new(&settings.public_key_file)),
            settings.limits,
        )
        .with_max_body_bytes(settings.max_body_bytes)
    }

    /// Route one request.
    pub async fn handle(&self, request: Request<Incoming>) -> Response<Full<Bytes>> {
        let path = request.uri().path().to_string();
        let method = request.method().clone();
        let response = match (path.as_str(), method) {
            (HEALTH_PATH, Method::GET) => respond(StatusCode::OK, "text/plain", "ok"),
            (AUTHENTICATE_PATH, Method::POST) => {
                let (root, limits) = (self.root.clone(), self.limits);
                review(request, self.max_body_bytes, move |review: TokenReview| {
                    authenticate_review(review, root.as_ref(), &limits)
                })
                .await
            }
            (AUTHORIZE_PATH, Method::POST) => {
                let (root, limits) = (self.root.clone(), self.limits);
                review(request, self.max_body_bytes, move |review: SubjectAccessReview| {
                    authorize_review(review, root.as_ref(), &limits)
                })
                .await
            }
            (HEALTH_PATH | AUTHENTICATE_PATH | AUTHORIZE_PATH, _) => respond(
                StatusCode::METHOD_NOT_ALLOWED,
                "text/plain",
                "Method not allowed",
            ),
            _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not found"),
        };
        tracing::debug!(%path, status = %response.status(), "Handled request");
        response
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Decode a review of at most `max_body_bytes`, answer it on the blocking
/// pool and encode the result.
async fn review<T, F>(
    request: Request<Incoming>,
    max_body_bytes: usize,
    answer: F,
) -> Response<Full<Bytes>>
where
    T: DeserializeOwned + Serialize + Send + 'static,
    F: FnOnce(T) -> T + Send + 'static,
{
    let body = match Limited::new(request.into_body(), max_body_bytes)
        .collect()
        .await
    {
        Ok(collected) => collected.to_bytes(),
        Err(error) if error.is::<LengthLimitError>() => {
            tracing::warn!(limit = max_body_bytes, "Rejected oversized review");
            return respond(
                StatusCode::PAYLOAD_TOO_LARGE,
                "text/plain",
                format!("Request body exceeds {max_body_bytes} bytes"),
            );
        }
        Err(error) => {
            return respond(
                StatusCode::BAD_REQUEST,
                "text/plain",
                format!("Failed to read body: {error}"),
            );
        }
    };
    let review: T = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(error) => {
            tracing::warn!(%error, "Rejected malformed review");
            return respond(
                StatusCode::BAD_REQUEST,
                "text/plain",
                format!("Malformed review: {error}"),
            );
        }
    };
    let answered = match tokio::task::spawn_blocking(move || answer(review)).await {
        Ok(answered) => answered,
        Err(error) => {
            tracing::error!(%error, "Review task failed");
            return respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                "Failed to evaluate review",
            );
        }
    };
    match serde_json::to_vec(&answered) {
        Ok(json) => respond(StatusCode::OK, "application/json", json),
        Err(error) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            format!("Failed to encode response: {error}"),
        ),
    }
}

async fn accept_loop(
    listener: TcpListener,
    webhook: Arc<Webhook>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        tracing::warn!(%error, "Failed to accept connection");
                        continue;
                    }
                };
                let webhook = webhook.clone();
                tokio::spawn(async move {
                    let service = hyper::service::service_fn(move |request| {
                        let webhook = webhook.clone();
                        async move { Ok::<_, Infallible>(webhook.handle(request).await) }
                    });
                    if let Err(error) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(%peer, %error, "Connection closed with error");
                    }
                });
            }
        }
    }
    tracing::info!("Webhook server stopped");
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, WebhookError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| WebhookError::Bind { addr, source })
}

/// Serve `webhook` on `settings.listen_addr` until `shutdown` resolves.
pub async fn serve(
    settings: &WebhookSettings,
    webhook: Webhook,
    shutdown: impl Future<Output = ()>,
) -> Result<(), WebhookError> {
    let listener = bind(settings.listen_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        public_key_file = %settings.public_key_file.display(),
        "Webhook server listening"
    );
    accept_loop(listener, Arc::new(webhook), shutdown).await;
    Ok(())
}

/// Serve with the settings' key file until Ctrl-C.
pub async fn run(settings: WebhookSettings) -> Result<(), WebhookError> {
    let webhook = Webhook::from_settings(&settings);
    serve(&settings, webhook, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// A webhook server running in the background.
pub struct WebhookServer {
    /// Base URL, e.g. `http://127.0.0.1:39111`
    pub endpoint: String,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WebhookServer {
    /// Bind `addr` and serve `webhook` on a background task. Port 0 picks
    /// a free port; see [`WebhookServer::endpoint`].
    pub async fn start(addr: SocketAddr, webhook: Webhook) -> Result<Self, WebhookError> {
        let listener = bind(addr).await?;
        let endpoint = format!("http://{}", listener.local_addr()?);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(accept_loop(listener, Arc::new(webhook), async move {
            let _ = shutdown_rx.await;
        }));
        Ok(Self {
            endpoint,
            shutdown_tx,
            task,
        })
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "Webhook server task failed");
        }
    }
}
