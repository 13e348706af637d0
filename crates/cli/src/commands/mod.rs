//! Subcommand implementations

pub mod config;
pub mod draw;
pub mod fetch;

use anyhow::{Result, bail};
use luckydraw_adapters::{ProxyCommentSource, StubCommentSource};
use luckydraw_domain::usecases::{CommentFetcher, DrawEngine, LotterySession};
use luckydraw_domain::{CommentSource, SystemClock};
use std::sync::Arc;

use crate::config::AppConfig;

/// Pick the comment source named by `source.provider`
pub(crate) fn build_source(config: &AppConfig) -> Result<Arc<dyn CommentSource>> {
    match config.source.provider.as_str() {
        "proxy" => {
            let base_url = config.source.base_url.trim();
            if base_url.is_empty() {
                bail!("source.base_url is required for the proxy provider");
            }
            Ok(Arc::new(ProxyCommentSource::new(
                config.source.proxy_config(),
            )))
        }
        "stub" => {
            tracing::warn!("Using the stub comment source; results are demo data");
            Ok(Arc::new(StubCommentSource::demo()))
        }
        other => bail!("Unknown comment source provider: {}", other),
    }
}

/// Session wired to the configured source, with draw settings applied
pub(crate) fn build_session(
    config: &AppConfig,
    seed: Option<u64>,
) -> Result<LotterySession<dyn CommentSource>> {
    let fetcher = CommentFetcher::new(build_source(config)?, config.fetch.fetch_config());
    let engine = DrawEngine::new(config.draw.draw_config(seed));
    Ok(LotterySession::new(fetcher, engine, Arc::new(SystemClock)))
}
