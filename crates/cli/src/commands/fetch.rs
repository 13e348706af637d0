//! Fetch command - pull every comment for a video

use anyhow::{Context, Result};
use luckydraw_domain::CanonicalComment;
use luckydraw_domain::usecases::{FetchError, SessionError};
use std::fs;
use std::path::{Path, PathBuf};

use crate::args::FetchArgs;
use crate::commands::build_session;
use crate::config::AppConfig;

pub async fn execute(args: FetchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let mut session = build_session(&config, None)?;

    tracing::info!(
        bvid = %args.bvid,
        provider = %config.source.provider,
        "Fetching comments"
    );

    let result = session.fetch(&args.bvid).await;

    match result {
        Ok(count) => {
            write_comments(session.comments(), args.output.as_deref())?;
            tracing::info!(count, "Fetch finished");
            Ok(())
        }
        Err(SessionError::Fetch(e @ FetchError::RateLimited { .. })) => {
            // Partial data is still worth keeping
            write_comments(session.comments(), args.output.as_deref())?;
            Err(e).context("Fetch stopped early; partial comments were written")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to fetch comments for {}", args.bvid)),
    }
}

fn write_comments(comments: &[CanonicalComment], output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(comments).context("Failed to serialize comments")?;

    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            eprintln!("Wrote {} comments to {}", comments.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
