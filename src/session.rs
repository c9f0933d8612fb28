//! Per-provider session: validate → reachability → permission → resolve → download.
//!
//! A [`ProviderSession`] runs as a single tokio task that owns all mutable
//! session state, including the "resolution in flight" marker. The UI side
//! talks to it only through the [`SessionHandle`] returned by
//! [`ProviderSession::spawn`]: commands go in, [`SessionEvent`]s come out.
//! Releasing or dropping the handle cancels the task and any in-flight
//! resolution, and nothing is delivered afterwards.
//!
//! ```text
//! Idle → Validating → [AwaitingPermission] → Resolving → Downloading → Idle
//!          └──────────────┴─────────────────────┴──────→ Failed → Idle
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capability::{ClipboardSource, NetworkProbe, PermissionGate};
use crate::config::{SessionConfig, StorageMode};
use crate::download::DownloadCoordinator;
use crate::event::{EventSink, RequestEvent, ResolutionEvent, ResolutionRequest, run_resolution};
use crate::parser::{ValidatedUrl, extract_link, validate};
use crate::provider::Provider;
use crate::resolver::{LinkResolver, ResolutionFailure, ResolveContext};

/// Shown when the reachability probe fails.
pub const NO_INTERNET_MESSAGE: &str = "No Internet connection available";
/// Shown when write access is missing.
pub const PERMISSION_MESSAGE: &str = "App needs storage permission to download files";
/// Shown once a download has been handed to the platform.
pub const DOWNLOAD_STARTED_MESSAGE: &str = "Download started";

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for input.
    Idle,
    /// Checking the input and network reachability.
    Validating,
    /// Waiting for the user to grant storage access.
    AwaitingPermission,
    /// A resolution is in flight.
    Resolving,
    /// Handing the resolved media to the download coordinator.
    Downloading,
    /// A submission failed; always followed by `Idle`.
    Failed,
}

impl SessionState {
    /// Whether a submission is being processed and new ones must be refused.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Validating | Self::Resolving | Self::Downloading)
    }
}

/// What the UI collaborator renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session moved to a new state.
    StateChanged(SessionState),
    /// Resolution is in progress; show a loading indicator.
    Loading,
    /// A submission failed with a user-facing message.
    Failed {
        /// Message to show
        message: String,
    },
    /// Storage access is needed before the download can proceed.
    PermissionRequired {
        /// Message to show
        message: String,
    },
    /// Informational message (e.g. "Download started").
    Notice {
        /// Message to show
        message: String,
    },
    /// The platform accepted a download into `path`.
    DownloadSubmitted {
        /// Where the file will be written
        path: PathBuf,
    },
    /// The input field should be cleared.
    ClearInput,
}

/// Errors returned to the caller of [`SessionHandle::submit`].
///
/// Validation and resolution problems are not errors here; they arrive as
/// [`SessionEvent::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A submission is already being processed.
    #[error("a download is already in progress for this session\n  Suggestion: Wait for it to finish before submitting another link")]
    Busy,
    /// The session has been released.
    #[error("session is closed")]
    Closed,
}

/// Platform collaborators a session depends on.
#[derive(Clone)]
pub struct Capabilities {
    /// Storage write access
    pub permission: Arc<dyn PermissionGate>,
    /// Network reachability
    pub network: Arc<dyn NetworkProbe>,
    /// Clipboard text
    pub clipboard: Arc<dyn ClipboardSource>,
}

impl Capabilities {
    /// Bundles the three collaborators.
    pub fn new(
        permission: Arc<dyn PermissionGate>,
        network: Arc<dyn NetworkProbe>,
        clipboard: Arc<dyn ClipboardSource>,
    ) -> Self {
        Self {
            permission,
            network,
            clipboard,
        }
    }
}

/// One provider's orchestration logic, before it is spawned.
pub struct ProviderSession {
    provider: Provider,
    resolver: Arc<dyn LinkResolver>,
    coordinator: DownloadCoordinator,
    capabilities: Capabilities,
    storage_mode: StorageMode,
    resolve_ctx: ResolveContext,
}

impl ProviderSession {
    /// Creates a session for `provider`.
    ///
    /// `resolver` should report the same provider; a mismatch is logged.
    pub fn new(
        provider: Provider,
        resolver: Arc<dyn LinkResolver>,
        coordinator: DownloadCoordinator,
        capabilities: Capabilities,
        config: &SessionConfig,
    ) -> Self {
        if resolver.provider() != provider {
            warn!(
                provider = %provider,
                resolver = resolver.name(),
                "resolver registered for a different provider"
            );
        }
        Self {
            provider,
            resolver,
            coordinator,
            capabilities,
            storage_mode: config.storage_mode,
            resolve_ctx: config.resolve_context(),
        }
    }

    /// Starts the session task and returns the handle that controls it.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (resolution_tx, resolution_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let provider = self.provider;
        let clipboard = Arc::clone(&self.capabilities.clipboard);

        let actor = SessionActor {
            session: self,
            cancel: cancel.clone(),
            events: event_tx,
            state: state_tx,
            resolution_tx,
            next_request_id: 0,
            active: None,
            parked: None,
        };
        let task = tokio::spawn(actor.run(command_rx, resolution_rx));

        SessionHandle {
            provider,
            commands: command_tx,
            events: event_rx,
            state: state_rx,
            clipboard,
            cancel,
            task: Some(task),
        }
    }
}

enum Command {
    Submit {
        raw: String,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    PermissionResult {
        granted: bool,
    },
}

struct SessionActor {
    session: ProviderSession,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Sender<SessionState>,
    resolution_tx: mpsc::UnboundedSender<RequestEvent>,
    next_request_id: u64,
    /// Id of the resolution whose events are still wanted
    active: Option<u64>,
    parked: Option<ValidatedUrl>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut resolutions: mpsc::UnboundedReceiver<RequestEvent>,
    ) {
        debug!(provider = %self.session.provider, "session started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Submit { raw, reply }) => self.on_submit(raw, reply).await,
                    Some(Command::PermissionResult { granted }) => self.on_permission_result(granted),
                    None => break,
                },
                Some(tagged) = resolutions.recv() => self.on_resolution_event(tagged).await,
            }
        }
        self.cancel.cancel();
        debug!(provider = %self.session.provider, "session released");
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(provider = %self.session.provider, from = ?previous, to = ?next, "session state");
            self.emit(SessionEvent::StateChanged(next));
        }
    }

    fn emit(&self, event: SessionEvent) {
        if !self.cancel.is_cancelled() {
            let _ = self.events.send(event);
        }
    }

    fn fail(&mut self, message: &str) {
        info!(provider = %self.session.provider, message, "submission failed");
        self.active = None;
        self.parked = None;
        self.set_state(SessionState::Failed);
        self.emit(SessionEvent::Failed {
            message: message.to_string(),
        });
        self.set_state(SessionState::Idle);
    }

    async fn on_submit(&mut self, raw: String, reply: oneshot::Sender<Result<(), SubmitError>>) {
        let state = self.current_state();
        if state.is_busy() {
            debug!(state = ?state, "rejecting submit while busy");
            let _ = reply.send(Err(SubmitError::Busy));
            return;
        }
        if self.parked.take().is_some() {
            debug!("new submission supersedes the request awaiting permission");
        }
        let _ = reply.send(Ok(()));

        self.set_state(SessionState::Validating);
        let url = match validate(&raw, self.session.provider) {
            Ok(url) => url,
            Err(error) => {
                debug!(error = %error, "validation failed");
                self.fail(error.user_message());
                return;
            }
        };

        let network = Arc::clone(&self.session.capabilities.network);
        let reachable = tokio::select! {
            () = self.cancel.cancelled() => return,
            reachable = network.is_network_available() => reachable,
        };
        if !reachable {
            self.fail(NO_INTERNET_MESSAGE);
            return;
        }

        let needs_grant = self.session.storage_mode.requires_explicit_grant();
        if needs_grant && !self.session.capabilities.permission.has_write_access() {
            self.parked = Some(url);
            self.session.capabilities.permission.request_write_access();
            self.set_state(SessionState::AwaitingPermission);
            self.emit(SessionEvent::PermissionRequired {
                message: PERMISSION_MESSAGE.to_string(),
            });
            return;
        }

        self.start_resolution(url);
    }

    fn on_permission_result(&mut self, granted: bool) {
        if self.current_state() != SessionState::AwaitingPermission {
            debug!(granted, "permission result with no parked request; ignoring");
            return;
        }
        let Some(url) = self.parked.take() else {
            self.set_state(SessionState::Idle);
            return;
        };
        if granted {
            self.start_resolution(url);
        } else {
            self.fail(PERMISSION_MESSAGE);
        }
    }

    fn start_resolution(&mut self, url: ValidatedUrl) {
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.active = Some(id);
        self.set_state(SessionState::Resolving);

        let request = ResolutionRequest::new(id, url);
        let sink = EventSink::new(id, self.resolution_tx.clone());
        tokio::spawn(run_resolution(
            Arc::clone(&self.session.resolver),
            request,
            self.session.resolve_ctx.clone(),
            sink,
            self.cancel.child_token(),
        ));
    }

    async fn on_resolution_event(&mut self, tagged: RequestEvent) {
        if self.active != Some(tagged.request_id) {
            debug!(request_id = tagged.request_id, "discarding event for inactive request");
            return;
        }

        match tagged.event {
            ResolutionEvent::Idle => {}
            ResolutionEvent::Loading => self.emit(SessionEvent::Loading),
            ResolutionEvent::Failure { message, cause } => {
                if cause == ResolutionFailure::Internal {
                    warn!(provider = %self.session.provider, "resolver fault reported as failure");
                }
                self.fail(&message);
            }
            ResolutionEvent::Success {
                media_url,
                file_name,
            } => {
                self.active = None;
                self.set_state(SessionState::Downloading);
                let coordinator = &self.session.coordinator;
                let job = coordinator.job(self.session.provider, media_url, file_name);
                // Write access was settled before resolution started.
                let submitted = coordinator.start_download(&job, true).await;
                match submitted {
                    Ok(path) => {
                        self.emit(SessionEvent::DownloadSubmitted { path });
                        self.emit(SessionEvent::Notice {
                            message: DOWNLOAD_STARTED_MESSAGE.to_string(),
                        });
                        self.emit(SessionEvent::ClearInput);
                        self.set_state(SessionState::Idle);
                    }
                    Err(error) => {
                        warn!(error = %error, "download could not be started");
                        self.fail(error.user_message());
                    }
                }
            }
        }
    }
}

/// Cancellable subscription to a running [`ProviderSession`].
///
/// Dropping the handle cancels the session; [`SessionHandle::release`] does
/// the same and also waits for the task to stop.
pub struct SessionHandle {
    provider: Provider,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    state: watch::Receiver<SessionState>,
    clipboard: Arc<dyn ClipboardSource>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Provider this session serves.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Submits raw input (typed or pasted text) for download.
    ///
    /// Returns once the session has accepted or refused the submission; the
    /// outcome arrives as events.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::Busy`] while another submission is in progress
    /// - [`SubmitError::Closed`] after the session has been released
    pub async fn submit(&self, raw: impl Into<String>) -> Result<(), SubmitError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                raw: raw.into(),
                reply,
            })
            .map_err(|_| SubmitError::Closed)?;
        answer.await.map_err(|_| SubmitError::Closed)?
    }

    /// Reports the outcome of the platform's permission prompt.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Closed`] after the session has been released.
    pub fn permission_result(&self, granted: bool) -> Result<(), SubmitError> {
        self.commands
            .send(Command::PermissionResult { granted })
            .map_err(|_| SubmitError::Closed)
    }

    /// Waits for the next event; `None` once the session has stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Returns an already queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// The first link in the clipboard text, for the "paste" action.
    pub async fn paste_from_clipboard(&self) -> Option<String> {
        let text = self.clipboard.primary_text().await?;
        extract_link(&text)
    }

    /// Clipboard text worth pre-filling the input with, if it mentions this provider.
    pub async fn clipboard_suggestion(&self) -> Option<String> {
        let text = self.clipboard.primary_text().await?;
        let marker = self.provider.marker();
        text.to_ascii_lowercase()
            .contains(marker)
            .then(|| text.trim().to_string())
    }

    /// Cancels the session and waits for its task to stop.
    pub async fn release(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(error) = task.await
        {
            warn!(error = %error, "session task ended abnormally");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("provider", &self.provider)
            .field("state", &self.state())
            .field("released", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
