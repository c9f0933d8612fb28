//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use grabber_core::{Provider, StorageMode};

/// Download the video behind a Chingari, Likee, or Roposo share link.
///
/// Paste the text the app's share button produced; the first link in it is
/// resolved to the media file, which is saved under a per-app directory.
#[derive(Parser, Debug)]
#[command(name = "grabber")]
#[command(author, version, about)]
pub struct Args {
    /// Shared link or share text (read from stdin when omitted)
    pub input: Option<String>,

    /// App the link belongs to (chingari, likee, roposo); detected from the link when omitted
    #[arg(short, long, value_parser = parse_provider)]
    pub provider: Option<Provider>,

    /// Take the link from the system clipboard instead of the arguments
    #[arg(long, conflicts_with = "input")]
    pub paste: bool,

    /// Download root; per-app directories are created beneath it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum seconds to wait for a link to resolve (1-600)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: Option<u64>,

    /// TCP connect timeout in seconds for resolver requests (1-600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub connect_timeout: Option<u64>,

    /// Seconds a resolved link is reused (0 disables, max 3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub cache_ttl: Option<u64>,

    /// Storage permission model: scoped (no grant needed) or legacy (directory must be writable)
    #[arg(long, value_parser = parse_storage_mode)]
    pub storage_mode: Option<StorageMode>,

    /// Skip the network reachability check
    #[arg(long)]
    pub no_network_check: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_provider(value: &str) -> Result<Provider, String> {
    Provider::from_name(value).ok_or_else(|| {
        format!("unknown provider '{value}' (expected one of: chingari, likee, roposo)")
    })
}

fn parse_storage_mode(value: &str) -> Result<StorageMode, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["grabber"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.input.is_none());
        assert!(args.provider.is_none());
        assert!(!args.paste);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["grabber", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["grabber", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_provider_flag_is_case_insensitive() {
        let args = Args::try_parse_from(["grabber", "-p", "Likee", "https://likee.video/v/1"]).unwrap();
        assert_eq!(args.provider, Some(Provider::Likee));
        assert_eq!(args.input.as_deref(), Some("https://likee.video/v/1"));
    }

    #[test]
    fn test_cli_unknown_provider_rejected() {
        let result = Args::try_parse_from(["grabber", "--provider", "tiktok", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_timeout_range_enforced() {
        assert!(Args::try_parse_from(["grabber", "--timeout", "0"]).is_err());
        assert!(Args::try_parse_from(["grabber", "--timeout", "601"]).is_err());
        let args = Args::try_parse_from(["grabber", "--timeout", "45"]).unwrap();
        assert_eq!(args.timeout, Some(45));
    }

    #[test]
    fn test_cli_storage_mode_parses() {
        let args = Args::try_parse_from(["grabber", "--storage-mode", "legacy"]).unwrap();
        assert_eq!(args.storage_mode, Some(StorageMode::Legacy));
        assert!(Args::try_parse_from(["grabber", "--storage-mode", "cloud"]).is_err());
    }

    #[test]
    fn test_cli_paste_conflicts_with_input() {
        assert!(Args::try_parse_from(["grabber", "--paste", "https://likee.video/v/1"]).is_err());
    }
}
