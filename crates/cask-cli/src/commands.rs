use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use cask_store::{Connection, DefaultIssuer, DriverRegistry};
use cask_types::{
    BrowseOptions, ByteRange, DownloadOptions, FetchOptions, FileHandle, Health, UploadOptions,
};
use colored::Colorize;
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::cli::*;
use crate::config::CaskConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CaskConfig::load(&cli.config)?;
    let registry = DriverRegistry::with_defaults();

    if let Command::Backends(_) = cli.command {
        return cmd_backends(&config, &registry, cli.format);
    }

    let (name, backend) = config.select(cli.backend.as_deref())?;
    let conn = registry
        .connect(&backend.driver, &backend.settings_map()?, Arc::new(DefaultIssuer))
        .with_context(|| format!("backend {name}"))?;

    if let Command::Health(_) = cli.command {
        return cmd_health(name, conn.as_ref(), cli.format).await;
    }

    conn.open()
        .await
        .with_context(|| format!("opening backend {name} ({})", backend.driver))?;
    let result = match cli.command {
        Command::Upload(args) => cmd_upload(conn.as_ref(), args, cli.format).await,
        Command::Fetch(args) => cmd_fetch(conn.as_ref(), args).await,
        Command::Download(args) => cmd_download(conn.as_ref(), args, cli.format).await,
        Command::Remove(args) => cmd_remove(conn.as_ref(), args).await,
        Command::Browse(args) => cmd_browse(conn.as_ref(), args).await,
        Command::Health(_) | Command::Backends(_) => Ok(()),
    };
    conn.close().await?;
    result
}

fn upload_options(args: &UploadArgs) -> UploadOptions {
    let mut opts = UploadOptions::default();
    if let Some(key) = &args.key {
        opts = opts.with_key(key.as_str());
    }
    if let Some(root) = &args.root {
        opts = opts.with_root(root.as_str());
    }
    if let Some(mimetype) = &args.mimetype {
        opts = opts.with_mimetype(mimetype.as_str());
    }
    for (name, value) in &args.metadata {
        opts = opts.with_metadata(name.as_str(), json!(value));
    }
    for (name, value) in &args.tags {
        opts = opts.with_tag(name.as_str(), json!(value));
    }
    if let Some(expires) = args.expires {
        opts = opts.with_expires(SystemTime::from(expires));
    }
    opts
}

pub(crate) async fn cmd_upload(
    conn: &dyn Connection,
    args: UploadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let handle = conn
        .upload(&args.path, &upload_options(&args))
        .await
        .with_context(|| format!("uploading {}", args.path.display()))?;
    let code = handle.code()?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "code": code, "size": handle.size(), "handle": &handle })
        ),
        OutputFormat::Text => {
            println!("{} Stored {}", "✓".green().bold(), args.path.display());
            println!("  Code: {}", code.yellow());
            println!("  Size: {} bytes", handle.size());
            if let Some(hash) = handle.hash() {
                println!("  Digest: {}", hash.short_hex().cyan());
            }
        }
    }
    Ok(())
}

fn fetch_options(args: &FetchArgs) -> anyhow::Result<FetchOptions> {
    Ok(match (args.start, args.end) {
        (Some(start), Some(end)) => FetchOptions::range(ByteRange::new(start, end)?),
        (Some(start), None) => FetchOptions::range(ByteRange::starting_at(start)),
        _ => FetchOptions::default(),
    })
}

async fn cmd_fetch(conn: &dyn Connection, args: FetchArgs) -> anyhow::Result<()> {
    let handle = FileHandle::from_code(&args.code, 0)?;
    let mut stream = conn.fetch(&handle, &fetch_options(&args)?).await?;
    match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?;
            let n = tokio::io::copy(&mut stream, &mut file).await?;
            file.flush().await?;
            eprintln!("{} Wrote {n} bytes to {}", "✓".green(), path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

pub(crate) async fn cmd_download(
    conn: &dyn Connection,
    args: DownloadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let handle = FileHandle::from_code(&args.code, args.size)?;
    let path = conn
        .download(&handle, &DownloadOptions::to(&args.target))
        .await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "code": args.code, "path": path })),
        OutputFormat::Text => println!(
            "{} {} → {}",
            "✓".green().bold(),
            args.code.yellow(),
            path.display()
        ),
    }
    Ok(())
}

async fn cmd_remove(conn: &dyn Connection, args: RemoveArgs) -> anyhow::Result<()> {
    let handle = FileHandle::from_code(&args.code, 0)?;
    conn.remove(&handle).await?;
    println!("Removed {}", args.code.yellow());
    Ok(())
}

async fn cmd_browse(conn: &dyn Connection, args: BrowseArgs) -> anyhow::Result<()> {
    let handle = FileHandle::from_code(&args.code, 0)?;
    let opts = BrowseOptions {
        expires_in_secs: args.expires_in,
    };
    let url = conn.browse(&handle, &opts).await?;
    println!("{url}");
    Ok(())
}

/// Probe the backend by opening it and record the outcome as its health.
pub(crate) async fn cmd_health(
    name: &str,
    conn: &dyn Connection,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    match conn.open().await {
        Ok(()) => conn.record_health(Health::healthy(0, now)),
        Err(e) => conn.record_health(Health::unhealthy(e.to_string(), now)),
    }
    let health = conn.health();
    conn.close().await?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "backend": name, "driver": conn.driver(), "health": &health })
        ),
        OutputFormat::Text => {
            let status = if health.healthy {
                "healthy".green().bold()
            } else {
                "unhealthy".red().bold()
            };
            println!("{} ({}): {status}", name.bold(), conn.driver());
            if let Some(message) = &health.message {
                println!("  {message}");
            }
        }
    }
    if health.healthy {
        Ok(())
    } else {
        anyhow::bail!("backend {name} is unhealthy")
    }
}

fn cmd_backends(
    config: &CaskConfig,
    registry: &DriverRegistry,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let default = config.default.as_deref();
    match format {
        OutputFormat::Json => {
            let backends: Vec<_> = config
                .backends
                .iter()
                .map(|(name, b)| json!({ "name": name, "driver": b.driver }))
                .collect();
            println!(
                "{}",
                json!({ "default": default, "backends": backends, "drivers": registry.names() })
            );
        }
        OutputFormat::Text => {
            for (name, backend) in &config.backends {
                let marker = if Some(name.as_str()) == default { "*" } else { " " };
                println!("{marker} {} ({})", name.bold(), backend.driver.cyan());
            }
            println!("Drivers: {}", registry.names().join(", "));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_store::LocalShardStore;
    use std::path::PathBuf;

    fn upload_args(path: PathBuf) -> UploadArgs {
        UploadArgs {
            path,
            key: None,
            root: None,
            mimetype: None,
            metadata: Vec::new(),
            tags: Vec::new(),
            expires: None,
        }
    }

    #[test]
    fn upload_options_carry_every_flag() {
        let mut args = upload_args(PathBuf::from("a"));
        args.key = Some("k".into());
        args.root = Some("r".into());
        args.metadata = vec![("owner".into(), "ops".into())];
        args.tags = vec![("tier".into(), "gold".into())];
        let opts = upload_options(&args);
        assert_eq!(opts.explicit_key(), Some("k"));
        assert_eq!(opts.root.as_deref(), Some("r"));
        assert_eq!(opts.metadata_strings()["owner"], "ops");
        assert_eq!(opts.tag_strings()["tier"], "gold");
    }

    #[test]
    fn fetch_range_from_flags() {
        let args = FetchArgs {
            code: "k".into(),
            start: Some(2),
            end: Some(5),
            output: None,
        };
        assert_eq!(
            fetch_options(&args).unwrap().range,
            Some(ByteRange::new(2, 5).unwrap())
        );
        let bad = FetchArgs {
            start: Some(5),
            end: Some(2),
            ..args
        };
        assert!(fetch_options(&bad).is_err());
    }

    #[tokio::test]
    async fn upload_then_download_by_code() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalShardStore::at(dir.path().join("store"));
        store.open().await.unwrap();
        let source = dir.path().join("in.txt");
        std::fs::write(&source, b"cli round trip").unwrap();

        let handle = store
            .upload(&source, &upload_options(&upload_args(source.clone())))
            .await
            .unwrap();
        let target = dir.path().join("out.txt");
        cmd_download(
            &store,
            DownloadArgs {
                code: handle.code().unwrap(),
                target: target.clone(),
                size: handle.size(),
            },
            OutputFormat::Json,
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(target).unwrap(), b"cli round trip");
    }

    #[tokio::test]
    async fn health_records_probe_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalShardStore::at(dir.path().join("store"));
        cmd_health("local", &store, OutputFormat::Text).await.unwrap();
        assert!(store.health().healthy);
        assert!(!store.health().is_unchecked());
    }
}
