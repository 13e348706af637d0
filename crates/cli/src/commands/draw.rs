//! Draw command - load comments, filter, and draw winners

use anyhow::{Context, Result};
use luckydraw_domain::usecases::{DrawPhase, DrawReport, FetchError, SessionError};
use luckydraw_domain::{FilterConfig, Winner};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::args::DrawArgs;
use crate::commands::build_session;
use crate::config::AppConfig;

#[derive(Serialize)]
struct DrawSummary<'a> {
    requested: usize,
    pool_size: usize,
    cancelled: bool,
    winners: &'a [Winner],
}

pub async fn execute(args: DrawArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = AppConfig::load(config_path.as_deref())?;
    if let Some(ms) = args.rolling_ms {
        config.draw.rolling_duration_ms = ms;
    }

    let mut session = build_session(&config, args.seed)?;

    // Load comments
    if let Some(ref bvid) = args.bvid {
        match session.fetch(bvid).await {
            Ok(_) => {}
            Err(SessionError::Fetch(FetchError::RateLimited { page, partial })) => {
                tracing::warn!(
                    page,
                    kept = partial.len(),
                    "Rate limited; drawing from the comments fetched so far"
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to fetch comments for {}", bvid));
            }
        }
    } else if let Some(ref input) = args.input {
        let text = read_input(input)?;
        session
            .load_manual(&text)
            .context("Failed to parse comment input")?;
    }

    session.set_filter(filter_from_args(&args, &config));

    let pool_size = session.eligible_pool().len();
    tracing::info!(
        comments = session.comments().len(),
        eligible = pool_size,
        "Filters applied"
    );

    let count = args.count.unwrap_or(config.draw.winner_count);
    let handle = session.draw_handle();

    let cancel_task = tokio::spawn({
        let handle = handle.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        }
    });
    let display_task = (!args.json && config.draw.rolling_duration_ms > 0)
        .then(|| tokio::spawn(show_rolling(handle.subscribe())));

    let result = session.draw(count).await;

    cancel_task.abort();
    if let Some(task) = display_task {
        task.abort();
        eprintln!();
    }

    let report = result.context("Draw failed")?;

    if args.json {
        let summary = DrawSummary {
            requested: report.requested,
            pool_size,
            cancelled: report.cancelled,
            winners: &report.winners,
        };
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn filter_from_args(args: &DrawArgs, config: &AppConfig) -> FilterConfig {
    let mut filter = config.filter.filter_config();
    if let Some(ref keywords) = args.keywords {
        filter.keywords = FilterConfig::parse_keywords(keywords);
    }
    if let Some(min_level) = args.min_level {
        filter.min_level = min_level;
    }
    if args.no_dedupe {
        filter.dedupe_by_author = false;
    }
    filter
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Echo the rolling candidate on stderr until the task is aborted
async fn show_rolling(mut phases: watch::Receiver<DrawPhase>) {
    while phases.changed().await.is_ok() {
        let phase = phases.borrow_and_update().clone();
        if let DrawPhase::Rolling {
            candidate: Some(candidate),
        } = phase
        {
            let mut stderr = io::stderr();
            let _ = write!(stderr, "\r\x1b[2K  rolling: {}", candidate.author_name);
            let _ = stderr.flush();
        }
    }
}

fn print_report(report: &DrawReport) {
    println!(
        "Winners ({} of {})",
        report.winners.len(),
        report.requested
    );
    println!("===============");
    println!();

    if report.winners.is_empty() {
        println!("No winners drawn.");
    }

    for (i, winner) in report.winners.iter().enumerate() {
        let comment = &winner.comment;
        println!(
            "  {}. {} (uid {}, level {})",
            i + 1,
            comment.author_name,
            comment.author_id,
            comment.level
        );
        println!("     \"{}\"", comment.text);
    }

    if report.cancelled {
        println!();
        println!("Draw cancelled before all winners were drawn.");
    } else if report.is_short() {
        println!();
        println!("Ran out of eligible comments.");
    }
}
