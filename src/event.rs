//! Resolution events and the driver that produces them.
//!
//! A request yields `Loading` first and then exactly one terminal event
//! (`Success` or `Failure`). [`EventSink`] enforces the terminal rule for each
//! request, and [`run_resolution`] adds the timeout, panic capture, and
//! cancellation behavior that resolvers themselves know nothing about.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::parser::ValidatedUrl;
use crate::provider::Provider;
use crate::resolver::{LinkResolver, ResolutionFailure, ResolveContext, ResolveError, ResolvedMedia};

/// Observable state of one resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    /// Nothing requested yet.
    Idle,
    /// Resolution in progress.
    Loading,
    /// A direct media URL was found.
    Success {
        /// Direct URL of the media file
        media_url: Url,
        /// Display filename
        file_name: String,
    },
    /// Resolution failed; `message` is ready to show the user.
    Failure {
        /// User-facing message
        message: String,
        /// Failure class, kept for callers that need to branch on it
        cause: ResolutionFailure,
    },
}

impl ResolutionEvent {
    /// Returns true for `Success` and `Failure`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }

    /// Builds a `Failure` event from a resolver error.
    #[must_use]
    pub fn failure(error: &ResolveError) -> Self {
        Self::Failure {
            message: error.user_message().to_string(),
            cause: error.kind(),
        }
    }
}

impl From<Result<ResolvedMedia, ResolveError>> for ResolutionEvent {
    fn from(result: Result<ResolvedMedia, ResolveError>) -> Self {
        match result {
            Ok(media) => Self::Success {
                media_url: media.media_url,
                file_name: media.file_name,
            },
            Err(error) => Self::failure(&error),
        }
    }
}

/// One user-initiated download attempt.
///
/// Consumed by value by [`run_resolution`], so a request resolves at most once.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    /// Session-local sequence number.
    pub id: u64,
    /// Provider the link was validated against.
    pub provider: Provider,
    /// The validated link.
    pub url: ValidatedUrl,
}

impl ResolutionRequest {
    /// Creates a request for an already validated link.
    #[must_use]
    pub fn new(id: u64, url: ValidatedUrl) -> Self {
        Self {
            id,
            provider: url.provider(),
            url,
        }
    }
}

/// A [`ResolutionEvent`] tagged with the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    /// Request the event belongs to
    pub request_id: u64,
    /// The event itself
    pub event: ResolutionEvent,
}

/// Errors returned by [`EventSink::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmitError {
    /// A terminal event was already emitted for this request.
    #[error("request {request_id} already emitted its terminal event")]
    AlreadyTerminated {
        /// The offending request
        request_id: u64,
    },

    /// The receiving side is gone (session released).
    #[error("event receiver for request {request_id} is closed")]
    Closed {
        /// The request whose events had nowhere to go
        request_id: u64,
    },
}

/// Per-request sender that refuses anything after the terminal event.
#[derive(Debug)]
pub struct EventSink {
    request_id: u64,
    tx: mpsc::UnboundedSender<RequestEvent>,
    terminated: bool,
}

impl EventSink {
    /// Creates a sink for `request_id` writing into `tx`.
    #[must_use]
    pub fn new(request_id: u64, tx: mpsc::UnboundedSender<RequestEvent>) -> Self {
        Self {
            request_id,
            tx,
            terminated: false,
        }
    }

    /// Request this sink belongs to.
    #[must_use]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Whether a terminal event has been emitted.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Emits `event`.
    ///
    /// # Errors
    ///
    /// - [`EmitError::AlreadyTerminated`] once a terminal event has been emitted
    /// - [`EmitError::Closed`] when the receiver has been dropped
    pub fn emit(&mut self, event: ResolutionEvent) -> Result<(), EmitError> {
        if self.terminated {
            return Err(EmitError::AlreadyTerminated {
                request_id: self.request_id,
            });
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        self.tx
            .send(RequestEvent {
                request_id: self.request_id,
                event,
            })
            .map_err(|_| EmitError::Closed {
                request_id: self.request_id,
            })
    }
}

/// Runs one request through `resolver`, emitting `Loading` then one terminal event.
///
/// - `ctx.timeout` elapsing yields `Failure("Request timed out")`
/// - a panic inside the resolver yields an `Internal` failure
/// - cancellation before completion emits nothing further and returns `None`
///
/// Returns the terminal event that was emitted, if any.
#[tracing::instrument(skip_all, fields(request_id = request.id, provider = %request.provider))]
pub async fn run_resolution(
    resolver: Arc<dyn LinkResolver>,
    request: ResolutionRequest,
    ctx: ResolveContext,
    mut sink: EventSink,
    cancel: CancellationToken,
) -> Option<ResolutionEvent> {
    if cancel.is_cancelled() {
        return None;
    }
    if sink.emit(ResolutionEvent::Loading).is_err() {
        return None;
    }

    let link = request.url.as_str().to_string();
    let resolve = async {
        match ctx.timeout {
            Some(limit) => tokio::time::timeout(limit, resolver.resolve(&request.url, &ctx))
                .await
                .unwrap_or_else(|_| Err(ResolveError::timed_out(&link, limit.as_secs()))),
            None => resolver.resolve(&request.url, &ctx).await,
        }
    };
    let guarded = AssertUnwindSafe(resolve).catch_unwind();

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!("resolution cancelled; discarding");
            return None;
        }
        outcome = guarded => outcome,
    };

    let result = outcome.unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "resolver panicked".to_string());
        warn!(reason = %reason, "resolver panicked; reporting failure");
        Err(ResolveError::internal(request.provider, &reason))
    });

    if let Err(error) = &result {
        debug!(kind = ?error.kind(), error = %error, "resolution failed");
    }

    let terminal = ResolutionEvent::from(result);
    if cancel.is_cancelled() {
        return None;
    }
    match sink.emit(terminal.clone()) {
        Ok(()) => Some(terminal),
        Err(error) => {
            debug!(error = %error, "terminal event not delivered");
            None
        }
    }
}
