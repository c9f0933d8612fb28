//! Injected platform collaborators: storage permission, network reachability,
//! and clipboard access.
//!
//! The session only talks to these traits, so every state transition can be
//! driven in tests with the static implementations below.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Write-access state for the download location.
///
/// The core only reads this state. Granting happens outside the core and is
/// reported back through the session's permission result.
pub trait PermissionGate: Send + Sync {
    /// Whether downloads may be written right now.
    fn has_write_access(&self) -> bool;

    /// Asks the platform to show its grant flow. The answer arrives later.
    fn request_write_access(&self);
}

/// Network reachability probe, consulted once per submission.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Whether the network looks reachable.
    async fn is_network_available(&self) -> bool;
}

/// Plain-text primary clip of the system clipboard.
#[async_trait]
pub trait ClipboardSource: Send + Sync {
    /// Current clipboard text, if any.
    async fn primary_text(&self) -> Option<String>;
}

/// Gate for platforms with scoped storage, where no grant is ever needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopedStorageGate;

impl PermissionGate for ScopedStorageGate {
    fn has_write_access(&self) -> bool {
        true
    }

    fn request_write_access(&self) {}
}

/// Gate whose answer is set by the caller.
#[derive(Debug, Default)]
pub struct StaticPermissionGate {
    granted: AtomicBool,
    requests: AtomicUsize,
}

impl StaticPermissionGate {
    /// Creates a gate with the given initial answer.
    #[must_use]
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            requests: AtomicUsize::new(0),
        }
    }

    /// Flips the gate to granted.
    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    /// Flips the gate to denied.
    pub fn revoke(&self) {
        self.granted.store(false, Ordering::SeqCst);
    }

    /// How many times a grant was requested.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionGate for StaticPermissionGate {
    fn has_write_access(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_write_access(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Gate backed by the download root's filesystem permissions.
#[derive(Debug, Clone)]
pub struct DirectoryPermissionGate {
    root: PathBuf,
}

impl DirectoryPermissionGate {
    /// Creates a gate for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory whose permissions are checked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PermissionGate for DirectoryPermissionGate {
    fn has_write_access(&self) -> bool {
        let existing = self
            .root
            .ancestors()
            .find(|p| !p.as_os_str().is_empty() && p.exists());
        let Some(existing) = existing else {
            // Relative root whose parents are all implicit: the working directory decides.
            return std::env::current_dir()
                .and_then(std::fs::metadata)
                .is_ok_and(|m| !m.permissions().readonly());
        };
        std::fs::metadata(existing).is_ok_and(|m| m.is_dir() && !m.permissions().readonly())
    }

    fn request_write_access(&self) {
        warn!(
            path = %self.root.display(),
            "download directory is not writable; fix its permissions or choose another --output"
        );
    }
}

/// Probe that attempts a TCP connection to well-known resolvers.
#[derive(Debug, Clone)]
pub struct TcpNetworkProbe {
    targets: Vec<SocketAddr>,
    timeout: Duration,
}

impl TcpNetworkProbe {
    /// Creates a probe against public DNS resolvers with a 3 second timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_targets(
            vec![
                SocketAddr::from(([1, 1, 1, 1], 443)),
                SocketAddr::from(([8, 8, 8, 8], 53)),
            ],
            Duration::from_secs(3),
        )
    }

    /// Creates a probe against custom targets (for tests).
    #[must_use]
    pub fn with_targets(targets: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self { targets, timeout }
    }
}

impl Default for TcpNetworkProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkProbe for TcpNetworkProbe {
    async fn is_network_available(&self) -> bool {
        for target in &self.targets {
            match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
                Ok(Ok(_)) => return true,
                Ok(Err(error)) => debug!(%target, error = %error, "network probe failed"),
                Err(_) => debug!(%target, "network probe timed out"),
            }
        }
        false
    }
}

/// Probe whose answer is set by the caller; counts how often it was asked.
#[derive(Debug, Default)]
pub struct StaticNetworkProbe {
    available: AtomicBool,
    checks: AtomicUsize,
}

impl StaticNetworkProbe {
    /// Creates a probe with the given answer.
    #[must_use]
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            checks: AtomicUsize::new(0),
        }
    }

    /// Changes the answer.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// How many times reachability was checked.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkProbe for StaticNetworkProbe {
    async fn is_network_available(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.available.load(Ordering::SeqCst)
    }
}

/// In-memory clipboard.
#[derive(Debug, Default)]
pub struct StaticClipboard {
    text: Mutex<Option<String>>,
}

impl StaticClipboard {
    /// Creates a clipboard holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
        }
    }

    /// Replaces the clipboard content.
    pub fn set(&self, text: Option<String>) {
        if let Ok(mut guard) = self.text.lock() {
            *guard = text;
        }
    }
}

#[async_trait]
impl ClipboardSource for StaticClipboard {
    async fn primary_text(&self) -> Option<String> {
        self.text.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Reads the desktop clipboard through the platform's command-line tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    #[cfg(target_os = "macos")]
    const READERS: &'static [(&'static str, &'static [&'static str])] = &[("pbpaste", &[])];

    #[cfg(target_os = "windows")]
    const READERS: &'static [(&'static str, &'static [&'static str])] =
        &[("powershell", &["-NoProfile", "-Command", "Get-Clipboard"])];

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    const READERS: &'static [(&'static str, &'static [&'static str])] = &[
        ("wl-paste", &["--no-newline"]),
        ("xclip", &["-selection", "clipboard", "-o"]),
        ("xsel", &["--clipboard", "--output"]),
    ];
}

#[async_trait]
impl ClipboardSource for SystemClipboard {
    async fn primary_text(&self) -> Option<String> {
        for (program, args) in Self::READERS {
            match tokio::process::Command::new(program).args(*args).output().await {
                Ok(output) if output.status.success() => {
                    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    return (!text.is_empty()).then_some(text);
                }
                Ok(_) => debug!(program, "clipboard reader returned failure"),
                Err(_) => debug!(program, "clipboard reader not available"),
            }
        }
        None
    }
}
