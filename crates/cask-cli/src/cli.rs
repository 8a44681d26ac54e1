use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cask",
    about = "cask -- content-addressed object storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend configuration file.
    #[arg(short, long, global = true, default_value = "cask.toml")]
    pub config: PathBuf,

    /// Configured backend to use instead of the default.
    #[arg(short, long, global = true)]
    pub backend: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a local file and print its handle code
    Upload(UploadArgs),
    /// Stream an object to stdout or a file
    Fetch(FetchArgs),
    /// Copy an object to a local path
    Download(DownloadArgs),
    /// Delete an object
    Remove(RemoveArgs),
    /// Print a browsable URL for an object
    Browse(BrowseArgs),
    /// Open the backend and report its health
    Health(HealthArgs),
    /// List configured backends and known drivers
    Backends(BackendsArgs),
}

#[derive(Args)]
pub struct UploadArgs {
    pub path: PathBuf,
    /// Address the object by this key instead of its digest.
    #[arg(short, long)]
    pub key: Option<String>,
    /// Prefix placed above the object (and its shard directories).
    #[arg(short, long)]
    pub root: Option<String>,
    #[arg(long)]
    pub mimetype: Option<String>,
    /// User metadata, `name=value`. Repeatable.
    #[arg(long = "meta", value_parser = parse_pair)]
    pub metadata: Vec<(String, String)>,
    /// Object tag, `name=value`. Repeatable.
    #[arg(long = "tag", value_parser = parse_pair)]
    pub tags: Vec<(String, String)>,
    /// Expiry as an RFC 3339 timestamp.
    #[arg(long)]
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Handle code printed by `upload`.
    pub code: String,
    /// First byte to read.
    #[arg(long)]
    pub start: Option<u64>,
    /// Last byte to read, inclusive.
    #[arg(long, requires = "start")]
    pub end: Option<u64>,
    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DownloadArgs {
    pub code: String,
    pub target: PathBuf,
    /// Recorded object size; an existing target of this size is kept.
    #[arg(long, default_value_t = 0)]
    pub size: u64,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub code: String,
}

#[derive(Args)]
pub struct BrowseArgs {
    pub code: String,
    #[arg(long)]
    pub expires_in: Option<u64>,
}

#[derive(Args)]
pub struct HealthArgs {}

#[derive(Args)]
pub struct BackendsArgs {}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_upload_with_options() {
        let cli = Cli::try_parse_from([
            "cask", "upload", "a.txt", "--root", "docs", "--meta", "owner=ops", "--tag", "tier=2",
            "--expires", "2030-01-01T00:00:00Z",
        ])
        .unwrap();
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("a.txt"));
            assert_eq!(args.root.as_deref(), Some("docs"));
            assert_eq!(args.metadata, vec![("owner".into(), "ops".into())]);
            assert_eq!(args.tags, vec![("tier".into(), "2".into())]);
            assert!(args.expires.is_some());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn bad_pair_rejected() {
        assert!(Cli::try_parse_from(["cask", "upload", "a", "--meta", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["cask", "upload", "a", "--tag", "=x"]).is_err());
    }

    #[test]
    fn parse_fetch_range() {
        let cli = Cli::try_parse_from(["cask", "fetch", "ab/cd/key", "--start", "4", "--end", "9"])
            .unwrap();
        if let Command::Fetch(args) = cli.command {
            assert_eq!(args.code, "ab/cd/key");
            assert_eq!((args.start, args.end), (Some(4), Some(9)));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn end_requires_start() {
        assert!(Cli::try_parse_from(["cask", "fetch", "k", "--end", "9"]).is_err());
    }

    #[test]
    fn parse_download() {
        let cli = Cli::try_parse_from(["cask", "download", "k.txt", "/tmp/out", "--size", "12"])
            .unwrap();
        if let Command::Download(args) = cli.command {
            assert_eq!(args.target, PathBuf::from("/tmp/out"));
            assert_eq!(args.size, 12);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from([
            "cask", "health", "--backend", "archive", "-c", "/etc/cask.toml", "--verbose",
            "--format", "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Health(_)));
        assert_eq!(cli.backend.as_deref(), Some("archive"));
        assert_eq!(cli.config, PathBuf::from("/etc/cask.toml"));
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::try_parse_from(["cask", "backends"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("cask.toml"));
        assert!(cli.backend.is_none());
    }
}
