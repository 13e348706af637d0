//! Lottery session - the context object a presentation layer drives
//!
//! Owns the loaded comments, filter rules, winners, progress log and draw
//! engine. Fetches are split into begin/run/complete so a caller can run the
//! network part on another task; completions from a superseded fetch are
//! rejected by generation.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::{
    model::{CanonicalComment, FilterConfig, LogEntry, Winner},
    normalize::{NormalizeError, parse_manual_batch},
    ports::{Clock, CommentSource},
    progress::ProgressLog,
    usecases::{
        draw::{DrawEngine, DrawError, DrawHandle, DrawOutcome},
        fetch::{CommentFetcher, FetchError, FetchReport},
        filter::eligible_pool_with_stats,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error("Fetch result from generation {completed} ignored; generation {current} is current")]
    Stale { completed: u64, current: u64 },
}

/// A fetch that has been started but not yet run
pub struct FetchTicket<S: CommentSource + ?Sized> {
    generation: u64,
    fetcher: CommentFetcher<S>,
    log: ProgressLog,
}

impl<S: CommentSource + ?Sized> FetchTicket<S> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run the network part of the fetch. Needs no access to the session.
    pub async fn run(self, video_id: &str) -> FetchCompletion {
        let result = self.fetcher.fetch(video_id, &self.log).await;
        FetchCompletion {
            generation: self.generation,
            video_id: video_id.to_string(),
            result,
        }
    }
}

/// Outcome of a fetch, waiting to be applied to the session
#[derive(Debug)]
pub struct FetchCompletion {
    pub generation: u64,
    pub video_id: String,
    pub result: Result<FetchReport, FetchError>,
}

/// Winners committed by one `draw` call
#[derive(Debug, Clone)]
pub struct DrawReport {
    pub requested: usize,
    pub winners: Vec<Winner>,
    pub cancelled: bool,
}

impl DrawReport {
    /// True when fewer winners were committed than requested
    pub fn is_short(&self) -> bool {
        self.winners.len() < self.requested
    }
}

pub struct LotterySession<S: CommentSource + ?Sized> {
    fetcher: CommentFetcher<S>,
    engine: DrawEngine,
    clock: Arc<dyn Clock>,
    generation: u64,
    comments: Vec<CanonicalComment>,
    filter: FilterConfig,
    winners: Vec<Winner>,
    log: ProgressLog,
}

impl<S: CommentSource + ?Sized> LotterySession<S> {
    pub fn new(fetcher: CommentFetcher<S>, engine: DrawEngine, clock: Arc<dyn Clock>) -> Self {
        let log = ProgressLog::new(Arc::clone(&clock));
        Self {
            fetcher,
            engine,
            clock,
            generation: 0,
            comments: Vec::new(),
            filter: FilterConfig::default(),
            winners: Vec::new(),
            log,
        }
    }

    /// Start a new fetch generation with a fresh progress log
    pub fn begin_fetch(&mut self) -> FetchTicket<S> {
        self.generation += 1;
        self.log = ProgressLog::new(Arc::clone(&self.clock));

        FetchTicket {
            generation: self.generation,
            fetcher: self.fetcher.clone(),
            log: self.log.clone(),
        }
    }

    /// Apply a finished fetch. Returns the number of comments now loaded.
    pub fn complete_fetch(&mut self, completion: FetchCompletion) -> Result<usize, SessionError> {
        if completion.generation != self.generation {
            tracing::debug!(
                completed = completion.generation,
                current = self.generation,
                video_id = %completion.video_id,
                "Dropping stale fetch completion"
            );
            return Err(SessionError::Stale {
                completed: completion.generation,
                current: self.generation,
            });
        }

        match completion.result {
            Ok(report) => {
                self.replace_comments(report.comments);
                Ok(self.comments.len())
            }
            Err(FetchError::RateLimited { page, partial }) => {
                let kept = partial.len();
                self.replace_comments(partial.clone());
                self.log.warning(format!(
                    "Keeping {} comments fetched before the rate limit",
                    kept
                ));
                Err(FetchError::RateLimited { page, partial }.into())
            }
            Err(e) => {
                if !self.comments.is_empty() {
                    self.log.info(format!(
                        "Keeping the {} previously loaded comments",
                        self.comments.len()
                    ));
                }
                Err(e.into())
            }
        }
    }

    /// Begin, run and complete a fetch in one call
    pub async fn fetch(&mut self, video_id: &str) -> Result<usize, SessionError> {
        let completion = self.begin_fetch().run(video_id).await;
        self.complete_fetch(completion)
    }

    /// Load comments from operator-supplied JSON. Malformed input leaves
    /// the current comments untouched.
    pub fn load_manual(&mut self, input: &str) -> Result<usize, SessionError> {
        self.generation += 1;
        let batch = match parse_manual_batch(input) {
            Ok(batch) => batch,
            Err(e) => {
                self.log.error(format!("Manual input rejected: {}", e));
                return Err(e.into());
            }
        };

        self.log.success(format!(
            "Parsed {} comments from manual input",
            batch.comments.len()
        ));
        if let Some(warning) = batch.warning() {
            self.log.warning(format!("Manual input: {}", warning));
        }
        self.replace_comments(batch.comments);
        Ok(self.comments.len())
    }

    pub fn set_filter(&mut self, filter: FilterConfig) {
        self.filter = filter;
        self.log_pool();
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn comments(&self) -> &[CanonicalComment] {
        &self.comments
    }

    pub fn winners(&self) -> &[Winner] {
        &self.winners
    }

    pub fn eligible_pool(&self) -> Vec<CanonicalComment> {
        eligible_pool_with_stats(&self.comments, &self.filter, &self.winners).0
    }

    /// Snapshot of the progress log for the current fetch generation
    pub fn log(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn progress(&self) -> &ProgressLog {
        &self.log
    }

    /// Handle for cancelling a draw and watching the rolling candidate
    pub fn draw_handle(&self) -> DrawHandle {
        self.engine.handle()
    }

    /// Draw up to `count` winners, one roll each, recomputing the pool after
    /// every commit. A `count` of zero draws one.
    pub async fn draw(&mut self, count: usize) -> Result<DrawReport, SessionError> {
        let requested = count.max(1);
        if self.eligible_pool().is_empty() {
            self.log.error("Nothing to draw from: the eligible pool is empty");
            return Err(DrawError::EmptyPool.into());
        }

        let epoch = self.engine.handle().epoch();
        let mut report = DrawReport {
            requested,
            winners: Vec::with_capacity(requested),
            cancelled: false,
        };

        while report.winners.len() < requested {
            let pool = self.eligible_pool();
            if pool.is_empty() {
                self.log.warning(format!(
                    "Pool ran dry after {} of {} winners",
                    report.winners.len(),
                    requested
                ));
                break;
            }

            match self.engine.roll_in_epoch(&pool, epoch).await? {
                DrawOutcome::Settled(comment) => {
                    let winner = Winner {
                        won_at: self.next_won_at(),
                        comment,
                    };
                    self.log.success(format!(
                        "Winner #{}: {} ({})",
                        self.winners.len() + 1,
                        winner.comment.author_name,
                        winner.comment.author_id
                    ));
                    self.winners.push(winner.clone());
                    report.winners.push(winner);
                }
                DrawOutcome::Cancelled => {
                    self.log.warning("Draw cancelled; nothing committed");
                    report.cancelled = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Cancel any draw in flight and clear all winners
    pub fn reset(&mut self) {
        self.engine.reset();
        if !self.winners.is_empty() {
            self.log
                .info(format!("Cleared {} winners", self.winners.len()));
        }
        self.winners.clear();
    }

    fn replace_comments(&mut self, comments: Vec<CanonicalComment>) {
        self.comments = comments;
        self.log_pool();
    }

    fn log_pool(&self) {
        let (_, stats) = eligible_pool_with_stats(&self.comments, &self.filter, &self.winners);
        self.log.info(format!(
            "Eligible pool: {} of {} comments (keywords {}, level {}, dedupe {})",
            stats.eligible,
            stats.input,
            stats.after_keywords,
            stats.after_level,
            stats.after_dedupe
        ));
    }

    /// Clock time, bumped past the previous winner if the clock stalls
    fn next_won_at(&self) -> OffsetDateTime {
        let now = self.clock.now();
        match self.winners.last() {
            Some(last) if now <= last.won_at => last.won_at + Duration::from_millis(1),
            _ => now,
        }
    }
}
