//! CLI entry point for the grabber tool.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use grabber_core::config::{LoadedConfig, load_default_file_config, load_file_config};
use grabber_core::parser::first_url;
use grabber_core::resolver::configure_resolver_http_timeouts;
use grabber_core::{
    Capabilities, ClipboardSource, DirectoryPermissionGate, DownloadCoordinator, HttpDownloader,
    NetworkProbe, PermissionGate, Provider, ProviderSession, ScopedStorageGate, SessionConfig,
    SessionEvent, SessionHandle, SessionState, StaticClipboard, StaticNetworkProbe,
    SystemClipboard, TcpNetworkProbe, ValidationError, build_default_resolver_registry,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

mod cli;

use cli::Args;

/// Idle read timeout for media transfers.
const TRANSFER_READ_TIMEOUT_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = session_config(&args)?;
    debug!(?config, "effective session config");
    configure_resolver_http_timeouts(config.connect_timeout.as_secs(), config.resolve_timeout.as_secs());

    let clipboard: Arc<dyn ClipboardSource> = if args.paste {
        Arc::new(SystemClipboard)
    } else {
        Arc::new(StaticClipboard::default())
    };

    let raw = if args.paste {
        clipboard.primary_text().await.unwrap_or_default()
    } else if let Some(input) = &args.input {
        input.clone()
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read link from stdin")?;
        buffer
    } else {
        String::new()
    };

    let Some(provider) = args.provider.or_else(|| first_url(&raw).and_then(|u| Provider::detect(&u))) else {
        if raw.trim().is_empty() {
            eprintln!("{}", ValidationError::Empty.user_message());
            return Ok(ExitCode::FAILURE);
        }
        return Err(anyhow!(
            "could not tell which app this link is from\n  Suggestion: Pass --provider chingari, likee, or roposo"
        ));
    };
    info!(provider = %provider, "grabber starting");

    let registry = build_default_resolver_registry(config.cache_ttl);
    let resolver = registry
        .get(provider)
        .with_context(|| format!("no resolver available for {provider}"))?;

    let downloader = Arc::new(
        HttpDownloader::new_with_timeouts(config.connect_timeout.as_secs(), TRANSFER_READ_TIMEOUT_SECS)
            .context("Failed to initialize the media downloader")?,
    );
    let coordinator = DownloadCoordinator::new(config.download_root.clone(), downloader.clone());

    let permission: Arc<dyn PermissionGate> = if config.storage_mode.requires_explicit_grant() {
        Arc::new(DirectoryPermissionGate::new(config.download_root.clone()))
    } else {
        Arc::new(ScopedStorageGate)
    };
    let network: Arc<dyn NetworkProbe> = if args.no_network_check {
        Arc::new(StaticNetworkProbe::new(true))
    } else {
        Arc::new(TcpNetworkProbe::new())
    };

    let capabilities = Capabilities::new(Arc::clone(&permission), network, clipboard);
    let mut handle =
        ProviderSession::new(provider, resolver, coordinator, capabilities, &config).spawn();

    handle
        .submit(raw)
        .await
        .context("Failed to submit link")?;

    let submitted = render_events(&mut handle, permission.as_ref(), !args.quiet).await;
    handle.release().await;

    if !submitted {
        return Ok(ExitCode::FAILURE);
    }

    downloader.wait_idle().await;
    if downloader.failed_count() > 0 {
        eprintln!("Download failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Merges defaults, the config file, and CLI flags (highest priority).
fn session_config(args: &Args) -> Result<SessionConfig> {
    let loaded = match &args.config {
        Some(path) => LoadedConfig {
            path: Some(path.clone()),
            config: Some(load_file_config(path)?),
        },
        None => load_default_file_config()?,
    };
    if let (true, Some(path)) = (loaded.loaded_from_file(), loaded.path.as_ref()) {
        debug!(path = %path.display(), "loaded config file");
    }

    let mut config = SessionConfig::default();
    if let Some(file) = &loaded.config {
        config = config.with_file(file);
    }
    if let Some(output) = &args.output {
        config.download_root.clone_from(output);
    }
    if let Some(secs) = args.timeout {
        config.resolve_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.connect_timeout {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.cache_ttl {
        config.cache_ttl = Duration::from_secs(secs);
    }
    if let Some(mode) = args.storage_mode {
        config.storage_mode = mode;
    }
    Ok(config)
}

/// Prints session events until the submission settles; returns true when a
/// download was handed off.
async fn render_events(handle: &mut SessionHandle, permission: &dyn PermissionGate, show_spinner: bool) -> bool {
    let use_spinner = show_spinner && io::stderr().is_terminal();
    let mut spinner: Option<ProgressBar> = None;
    let mut submitted = false;
    let mut started = false;

    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::Loading => {
                if use_spinner && spinner.is_none() {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(
                        ProgressStyle::with_template("{spinner} {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar.set_message(format!("Resolving {} link...", handle.provider()));
                    spinner = Some(bar);
                }
            }
            SessionEvent::PermissionRequired { message } => {
                eprintln!("{message}");
                // A CLI cannot show a grant dialog; re-check in case the directory was fixed.
                if handle.permission_result(permission.has_write_access()).is_err() {
                    break;
                }
            }
            SessionEvent::Failed { message } => {
                clear_spinner(&mut spinner);
                eprintln!("{message}");
            }
            SessionEvent::DownloadSubmitted { path } => {
                clear_spinner(&mut spinner);
                submitted = true;
                println!("{}", path.display());
            }
            SessionEvent::Notice { message } => {
                if show_spinner {
                    eprintln!("{message}");
                }
            }
            SessionEvent::ClearInput => {}
            SessionEvent::StateChanged(SessionState::Idle) if started => break,
            SessionEvent::StateChanged(state) => {
                started = true;
                debug!(?state, "session state");
            }
        }
    }

    clear_spinner(&mut spinner);
    submitted
}

fn clear_spinner(spinner: &mut Option<ProgressBar>) {
    if let Some(bar) = spinner.take() {
        bar.finish_and_clear();
    }
}
