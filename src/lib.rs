//! Grabber Core Library
//!
//! Resolves share links from short-video apps (Chingari, Likee, Roposo) to
//! the direct media file and hands that file to a background downloader.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`provider`] - Supported providers and their fixed attributes
//! - [`parser`] - Link extraction and per-provider validation
//! - [`resolver`] - Share page → media URL resolution, one resolver per provider
//! - [`event`] - Resolution events and the exactly-once resolution driver
//! - [`download`] - Destination directories, collision-free naming, transfer
//! - [`capability`] - Permission, network, and clipboard collaborators
//! - [`session`] - Per-provider state machine tying everything together
//! - [`config`] - Session settings and the optional config file

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod config;
pub mod download;
pub mod event;
pub mod parser;
pub mod provider;
pub mod resolver;
pub mod session;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use capability::{
    ClipboardSource, DirectoryPermissionGate, NetworkProbe, PermissionGate, ScopedStorageGate,
    StaticClipboard, StaticNetworkProbe, StaticPermissionGate, SystemClipboard, TcpNetworkProbe,
};
pub use config::{SessionConfig, StorageMode};
pub use download::{DownloadCoordinator, DownloadError, DownloadJob, HttpDownloader, PlatformDownloader};
pub use event::{ResolutionEvent, ResolutionRequest, run_resolution};
pub use parser::{ValidatedUrl, ValidationError, extract_link, validate};
pub use provider::Provider;
pub use resolver::{
    LinkResolver, ResolutionFailure, ResolveContext, ResolveError, ResolvedMedia, ResolverRegistry,
    build_default_resolver_registry,
};
pub use session::{
    Capabilities, ProviderSession, SessionEvent, SessionHandle, SessionState, SubmitError,
};
