mod cli;
mod render;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use gitask_core::{AnswerMode, Config, CoreError, Session};
use gitask_loader::CloneError;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};

/// Conventional exit status for a run interrupted by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    match run(cli).await {
        Err(e) if is_cancelled(&e) => {
            eprintln!("cancelled");
            std::process::exit(EXIT_INTERRUPTED);
        }
        result => result,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let mut session = Session::from_config(&config).await?;

    match cli.command {
        Command::Ingest { url } => {
            let report = session
                .ingest(&url, &cancel)
                .await
                .with_context(|| format!("error processing repository {url}"))?;
            print!("{}", render::ingest_report(&report));
        }
        Command::IngestDir { path } => {
            let report = session
                .ingest_path(&path, &cancel)
                .await
                .with_context(|| format!("error processing directory {}", path.display()))?;
            print!("{}", render::ingest_report(&report));
        }
        Command::Ask {
            question,
            chat,
            k,
            chunks,
        } => {
            if question.trim().is_empty() {
                anyhow::bail!("please enter a question");
            }
            if let Some(k) = k {
                session = session.with_top_k(k);
            }
            if session.collection_stats().await?.count == 0 {
                tracing::warn!("collection is empty; answering without repository context");
            }
            let mode = if chat {
                AnswerMode::Chat
            } else {
                AnswerMode::CodeSnippet
            };
            let answer = session
                .ask(&question, mode, &cancel)
                .await
                .context("error processing query")?;
            print!("{}", render::answer(&answer, chunks));
        }
        Command::Search { text, k } => {
            let results = session.search(&text, k).await?;
            print!("{}", render::search(&results));
        }
        Command::Stats => {
            let stats = session.collection_stats().await?;
            print!("{}", render::collection(&stats));
        }
        Command::Reset => {
            session.reset().await?;
            println!("Collection {} reset.", session.index().name());
        }
    }

    Ok(())
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        cancel.cancel();
    });
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("GITASK_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<CoreError>(),
            Some(CoreError::Cancelled | CoreError::Clone(CloneError::Cancelled))
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_wins() {
        let path = resolve_config_path(Some(Path::new("custom.toml")));
        assert_eq!(path, PathBuf::from("custom.toml"));
    }

    #[test]
    fn cancellation_detected_through_context() {
        let err = anyhow::Error::new(CoreError::Cancelled).context("error processing query");
        assert!(is_cancelled(&err));

        let err = anyhow::Error::new(CoreError::from(CloneError::Cancelled))
            .context("error processing repository");
        assert!(is_cancelled(&err));

        let err = anyhow::anyhow!("boom");
        assert!(!is_cancelled(&err));
    }
}
