use std::str::FromStr;

use anyhow::Context;
use colored::Colorize;
use tracing::{info, warn};

use relay_engine::{synthetic_chain, ArchiveWriter};
use relay_server::{RelayConfig, RelayServer};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => {
            let config = resolve_config(&args, cli.log_level.as_deref())?;
            init_tracing(&config.log_level)?;
            cmd_serve(config)
        }
        Command::CheckConfig(args) => {
            let config = resolve_config(&args, cli.log_level.as_deref())?;
            cmd_check_config(&config)
        }
        Command::InitArchive(args) => {
            init_tracing(cli.log_level.as_deref().unwrap_or("info"))?;
            cmd_init_archive(args)
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let level = tracing::Level::from_str(level)
        .map_err(|_| anyhow::anyhow!("unknown log level `{level}`"))?;
    tracing_subscriber::fmt().with_max_level(level).init();
    Ok(())
}

/// Layer command-line overrides on top of the configuration file, if any.
pub fn resolve_config(args: &ConfigArgs, log_level: Option<&str>) -> anyhow::Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(passphrase) = &args.network_passphrase {
        config.network_passphrase = passphrase.clone();
    }
    if !args.history_archives.is_empty() {
        config.history_archives = args.history_archives.clone();
    }
    if let Some(frequency) = args.checkpoint_frequency {
        config.checkpoint_frequency = frequency;
    }
    if let Some(url) = &args.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(policy) = args.oracle_policy {
        config.oracle_policy = policy;
    }
    if let Some(timeout) = args.request_timeout_ms {
        config.request_timeout_ms = timeout;
    }
    if let Some(level) = log_level {
        config.log_level = level.to_string();
    }
    Ok(config)
}

fn cmd_serve(config: RelayConfig) -> anyhow::Result<()> {
    let server = RelayServer::from_config(config).context("failed to start the relay")?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        server.run(shutdown_signal()).await?;
        info!("ledger relay exited cleanly");
        Ok::<(), anyhow::Error>(())
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

fn cmd_check_config(config: &RelayConfig) -> anyhow::Result<()> {
    match config.validate() {
        Ok(()) => {
            println!("{}", config.to_toml_string()?);
            println!("{} Configuration is valid", "✓".green().bold());
            println!("  Listening on: {}", config.listen_addr.to_string().bold());
            println!("  Archives: {}", config.history_archives.len().to_string().cyan());
            let verification = if config.database_url.is_some() {
                format!("enabled ({})", config.oracle_policy).green()
            } else {
                "disabled".yellow()
            };
            println!("  Hash verification: {verification}");
            Ok(())
        }
        Err(err) => {
            println!("{} {}", "✗".red().bold(), err);
            Err(err.into())
        }
    }
}

fn cmd_init_archive(args: InitArchiveArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.ledgers > 0, "--ledgers must be at least 1");
    anyhow::ensure!(args.first > 0, "--first must be at least 1");
    let last = args.first.checked_add(args.ledgers - 1).with_context(|| {
        format!("--first {} with --ledgers {} overflows", args.first, args.ledgers)
    })?;

    let writer = ArchiveWriter::create(&args.path, &args.network_passphrase)?;
    let written = writer.write_all(&synthetic_chain(args.first, args.ledgers))?;
    println!(
        "{} Wrote {} ledgers ({}..={}) to {}",
        "✓".green().bold(),
        written,
        args.first,
        last,
        writer.root().display().to_string().bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use relay_engine::{ArchiveConfig, ArchiveEngine, OraclePolicy, ReplayEngine};
    use relay_server::config::DEFAULT_NETWORK_PASSPHRASE;
    use relay_types::LedgerRange;

    use super::*;

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "history_archives = [\"/from/file\"]\ncheckpoint_frequency = 32\nlog_level = \"warn\"\n",
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(path),
            history_archives: vec![PathBuf::from("/from/flag")],
            oracle_policy: Some(OraclePolicy::Required),
            ..ConfigArgs::default()
        };
        let config = resolve_config(&args, Some("debug")).unwrap();
        assert_eq!(config.history_archives, vec![PathBuf::from("/from/flag")]);
        assert_eq!(config.checkpoint_frequency, 32);
        assert_eq!(config.oracle_policy, OraclePolicy::Required);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..ConfigArgs::default()
        };
        assert!(resolve_config(&args, None).is_err());
    }

    #[test]
    fn check_config_rejects_missing_archives() {
        let config = resolve_config(&ConfigArgs::default(), None).unwrap();
        assert!(cmd_check_config(&config).is_err());
    }

    #[test]
    fn init_archive_is_replayable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        cmd_init_archive(InitArchiveArgs {
            path: root.clone(),
            ledgers: 20,
            first: 1,
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.into(),
        })
        .unwrap();

        let mut engine = ArchiveEngine::open(ArchiveConfig {
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.into(),
            archives: vec![root],
            checkpoint_frequency: 8,
        })
        .unwrap();
        engine.prepare_range(LedgerRange::new(10, 20).unwrap()).unwrap();
        assert_eq!(engine.get_ledger(10).unwrap().sequence, 10);
    }

    #[test]
    fn init_archive_rejects_zero_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArchiveArgs {
            path: dir.path().to_path_buf(),
            ledgers: 0,
            first: 1,
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.into(),
        };
        assert!(cmd_init_archive(args).is_err());
    }

    #[test]
    fn init_archive_rejects_sequence_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        let args = InitArchiveArgs {
            path: root.clone(),
            ledgers: 2,
            first: u32::MAX,
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.into(),
        };
        let err = cmd_init_archive(args).unwrap_err();
        assert!(err.to_string().contains("overflows"));
        assert!(!root.exists());
    }
}
