//! Paginated fetcher - resolves a video and pulls every comment page in order

use std::sync::Arc;
use std::time::Duration;

use crate::model::{ApiEnvelope, CanonicalComment, ReplyPage};
use crate::normalize::normalize_batch_at;
use crate::ports::CommentSource;
use crate::progress::ProgressLog;

/// Response code the source uses to signal throttling
pub const RATE_LIMIT_CODE: i64 = -352;

/// Configuration for the fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Hard cap on pages requested per fetch
    pub max_pages: u32,
    /// Pause between consecutive page requests
    pub page_delay: Duration,
    /// Consecutive empty pages treated as end of data
    pub empty_page_limit: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            page_delay: Duration::from_millis(500),
            empty_page_limit: 3,
        }
    }
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The page estimate from page 1 was reached
    TotalPagesReached,
    /// The hard page cap was reached
    PageCapReached,
    /// Too many consecutive pages came back empty
    ConsecutiveEmptyPages,
    /// The source flagged the last page via its cursor
    EndOfData,
}

impl Termination {
    pub fn describe(&self) -> &'static str {
        match self {
            Termination::TotalPagesReached => "reached the estimated page count",
            Termination::PageCapReached => "reached the page cap",
            Termination::ConsecutiveEmptyPages => "several consecutive pages were empty",
            Termination::EndOfData => "source reported end of data",
        }
    }
}

/// Result of a completed fetch
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub object_id: u64,
    pub comments: Vec<CanonicalComment>,
    pub pages_requested: u32,
    pub estimated_total_pages: Option<u32>,
    pub termination: Termination,
}

/// Errors that end a fetch
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),
    #[error("Rate limited by source on page {page} ({} comments kept)", .partial.len())]
    RateLimited {
        page: u32,
        partial: Vec<CanonicalComment>,
    },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Comments accumulated before the failure
    pub fn partial(&self) -> &[CanonicalComment] {
        match self {
            FetchError::RateLimited { partial, .. } => partial,
            _ => &[],
        }
    }
}

/// Per-call pagination state; dropped when the fetch returns
#[derive(Debug, Default)]
struct FetchSession {
    current_page: u32,
    estimated_total_pages: Option<u32>,
    consecutive_empty_pages: u32,
    accumulated: Vec<CanonicalComment>,
}

impl FetchSession {
    fn total_label(&self) -> String {
        self.estimated_total_pages
            .map(|total| total.to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Fetches all comments for a video through a [`CommentSource`]
pub struct CommentFetcher<S: CommentSource + ?Sized> {
    source: Arc<S>,
    config: FetchConfig,
}

impl<S: CommentSource + ?Sized> Clone for CommentFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: self.config.clone(),
        }
    }
}

impl<S: CommentSource + ?Sized> CommentFetcher<S> {
    pub fn new(source: Arc<S>, config: FetchConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve `video_id` and fetch every page
    pub async fn fetch(&self, video_id: &str, log: &ProgressLog) -> Result<FetchReport, FetchError> {
        log.info(format!("Resolving video {}", video_id));
        let object_id = self.resolve(video_id, log).await?;
        log.success(format!("Resolved {} => object {}", video_id, object_id));

        let mut session = FetchSession::default();
        let termination = loop {
            session.current_page += 1;
            let page = session.current_page;

            log.info(format!(
                "Fetching page {}/{}",
                page,
                session.total_label()
            ));

            match self.source.fetch_page(object_id, video_id, page).await {
                Ok(envelope) => {
                    if let Some(termination) = self.absorb_page(&mut session, envelope, log)? {
                        break termination;
                    }
                }
                Err(e) => {
                    log.error(format!("Page {} failed: {}", page, e));
                    if page == 1 {
                        return Err(FetchError::Transport(e.to_string()));
                    }
                }
            }

            if session
                .estimated_total_pages
                .is_some_and(|total| page >= total)
            {
                break Termination::TotalPagesReached;
            }
            if page >= self.config.max_pages {
                log.warning(format!(
                    "Stopping at the {}-page cap",
                    self.config.max_pages
                ));
                break Termination::PageCapReached;
            }

            if !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
        };

        log.success(format!(
            "Fetch complete: {} comments from {} pages ({})",
            session.accumulated.len(),
            session.current_page,
            termination.describe()
        ));

        tracing::info!(
            video_id = %video_id,
            object_id,
            comments = session.accumulated.len(),
            pages = session.current_page,
            termination = ?termination,
            "Fetched comments"
        );

        Ok(FetchReport {
            object_id,
            comments: session.accumulated,
            pages_requested: session.current_page,
            estimated_total_pages: session.estimated_total_pages,
            termination,
        })
    }

    async fn resolve(&self, video_id: &str, log: &ProgressLog) -> Result<u64, FetchError> {
        let envelope = match self.source.lookup_video(video_id).await {
            Ok(envelope) => envelope,
            Err(e) => {
                log.error(format!("Lookup for {} failed: {}", video_id, e));
                return Err(FetchError::Transport(e.to_string()));
            }
        };

        if envelope.code != 0 {
            let reason = format!(
                "lookup for {} returned code {}: {}",
                video_id, envelope.code, envelope.message
            );
            log.error(format!("Source not found: {}", reason));
            return Err(FetchError::SourceNotFound(reason));
        }

        match envelope.data.and_then(|view| view.object_id) {
            Some(object_id) => Ok(object_id),
            None => {
                let reason = format!("lookup for {} returned no object ID", video_id);
                log.error(format!("Source not found: {}", reason));
                Err(FetchError::SourceNotFound(reason))
            }
        }
    }

    /// Fold one page response into the session. Returns a termination when
    /// the page ends pagination.
    fn absorb_page(
        &self,
        session: &mut FetchSession,
        envelope: ApiEnvelope<ReplyPage>,
        log: &ProgressLog,
    ) -> Result<Option<Termination>, FetchError> {
        let page = session.current_page;

        if envelope.code == RATE_LIMIT_CODE {
            log.error(format!(
                "Rate limited on page {} (code {}); keeping {} comments",
                page,
                envelope.code,
                session.accumulated.len()
            ));
            return Err(FetchError::RateLimited {
                page,
                partial: std::mem::take(&mut session.accumulated),
            });
        }

        if envelope.code != 0 {
            let reason = format!(
                "source returned code {}: {}",
                envelope.code, envelope.message
            );
            log.warning(format!("Page {} skipped: {}", page, reason));
            if page == 1 {
                return Err(FetchError::Transport(reason));
            }
            return Ok(None);
        }

        let data = envelope.data.unwrap_or_default();

        if page == 1 {
            if let Some(counter) = data.page.filter(|c| c.size > 0) {
                let total = counter.count.div_ceil(counter.size);
                let total = u32::try_from(total).unwrap_or(u32::MAX);
                session.estimated_total_pages = Some(total);
                log.info(format!(
                    "Source reports {} comments, about {} pages",
                    counter.count, total
                ));
            }
        }

        let replies = data.replies.unwrap_or_default();
        let batch = normalize_batch_at(&replies, session.accumulated.len());
        if let Some(warning) = batch.warning() {
            log.warning(format!("Page {}: {}", page, warning));
        }
        let comments = batch.comments;

        if comments.is_empty() {
            session.consecutive_empty_pages += 1;
            log.warning(format!("Page {} returned no comments", page));
            if session.consecutive_empty_pages >= self.config.empty_page_limit {
                log.info(format!(
                    "{} consecutive empty pages, stopping early",
                    session.consecutive_empty_pages
                ));
                return Ok(Some(Termination::ConsecutiveEmptyPages));
            }
        } else {
            session.consecutive_empty_pages = 0;
            session.accumulated.extend(comments);
            log.success(format!(
                "Page {}: {} comments so far",
                page,
                session.accumulated.len()
            ));
        }

        if data.cursor.is_some_and(|cursor| cursor.is_end) {
            log.info("Source cursor marks the last page");
            return Ok(Some(Termination::EndOfData));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VideoView;
    use crate::ports::SourceError;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    enum ScriptedPage {
        Replies(Vec<Value>),
        Code(i64),
        Failure,
        Raw(ReplyPage),
    }

    struct ScriptedSource {
        lookup: Result<ApiEnvelope<VideoView>, String>,
        pages: Vec<ScriptedPage>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<ScriptedPage>) -> Self {
            Self {
                lookup: Ok(ApiEnvelope {
                    code: 0,
                    message: String::new(),
                    data: Some(VideoView {
                        object_id: Some(170001),
                    }),
                }),
                pages,
                requested: Mutex::new(vec![]),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommentSource for ScriptedSource {
        async fn lookup_video(
            &self,
            _video_id: &str,
        ) -> Result<ApiEnvelope<VideoView>, SourceError> {
            self.lookup.clone().map_err(SourceError::Network)
        }

        async fn fetch_page(
            &self,
            _object_id: u64,
            _video_id: &str,
            page: u32,
        ) -> Result<ApiEnvelope<ReplyPage>, SourceError> {
            self.requested.lock().unwrap().push(page);
            let ok = |data: ReplyPage| ApiEnvelope {
                code: 0,
                message: String::new(),
                data: Some(data),
            };
            match self.pages.get(page as usize - 1) {
                Some(ScriptedPage::Replies(replies)) => Ok(ok(ReplyPage {
                    replies: Some(replies.clone()),
                    ..Default::default()
                })),
                Some(ScriptedPage::Code(code)) => Ok(ApiEnvelope {
                    code: *code,
                    message: "scripted".to_string(),
                    data: None,
                }),
                Some(ScriptedPage::Failure) => Err(SourceError::Http {
                    status: 502,
                    body: "bad gateway".to_string(),
                }),
                Some(ScriptedPage::Raw(data)) => Ok(ok(data.clone())),
                None => Ok(ok(ReplyPage::default())),
            }
        }
    }

    fn replies(ids: &[u64]) -> Vec<Value> {
        ids.iter()
            .map(|id| {
                json!({
                    "rpid": id,
                    "member": {"mid": format!("u{}", id), "uname": "x", "level_info": {"current_level": 3}},
                    "content": {"message": "接好运"}
                })
            })
            .collect()
    }

    fn fetcher(source: Arc<ScriptedSource>) -> CommentFetcher<ScriptedSource> {
        CommentFetcher::new(source, FetchConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_empty_pages_stop_at_page_five() {
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::Replies(replies(&[1, 2])),
            ScriptedPage::Replies(replies(&[3])),
        ]));
        let log = ProgressLog::default();

        let report = fetcher(Arc::clone(&source))
            .fetch("BV1test", &log)
            .await
            .unwrap();

        assert_eq!(report.pages_requested, 5);
        assert_eq!(report.comments.len(), 3);
        assert_eq!(report.termination, Termination::ConsecutiveEmptyPages);
        assert_eq!(source.requested(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_keeps_earlier_pages() {
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::Replies(replies(&[1, 2])),
            ScriptedPage::Replies(replies(&[3, 4])),
            ScriptedPage::Code(RATE_LIMIT_CODE),
            ScriptedPage::Replies(replies(&[5])),
        ]));
        let log = ProgressLog::default();

        let err = fetcher(Arc::clone(&source))
            .fetch("BV1test", &log)
            .await
            .unwrap_err();

        match &err {
            FetchError::RateLimited { page, partial } => {
                assert_eq!(*page, 3);
                let ids: Vec<&str> = partial.iter().map(|c| c.comment_id.as_str()).collect();
                assert_eq!(ids, vec!["1", "2", "3", "4"]);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
        assert_eq!(err.partial().len(), 4);
        assert_eq!(source.requested(), vec![1, 2, 3]);
        assert!(
            log.entries()
                .iter()
                .any(|e| e.level == crate::model::LogLevel::Error && e.message.contains("Rate limited"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_estimate_from_first_page_bounds_fetch() {
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::Raw(ReplyPage {
                replies: Some(replies(&[1, 2])),
                page: Some(crate::model::PageCounter { count: 5, size: 2 }),
                cursor: None,
            }),
            ScriptedPage::Replies(replies(&[3, 4])),
            ScriptedPage::Replies(replies(&[5])),
            ScriptedPage::Replies(replies(&[6])),
        ]));
        let log = ProgressLog::default();

        let report = fetcher(Arc::clone(&source))
            .fetch("BV1test", &log)
            .await
            .unwrap();

        assert_eq!(report.estimated_total_pages, Some(3));
        assert_eq!(report.pages_requested, 3);
        assert_eq!(report.termination, Termination::TotalPagesReached);
        assert_eq!(report.comments.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_end_short_circuits() {
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::Replies(replies(&[1])),
            ScriptedPage::Raw(ReplyPage {
                replies: Some(replies(&[2])),
                page: None,
                cursor: Some(crate::model::ReplyCursor { is_end: true }),
            }),
            ScriptedPage::Replies(replies(&[3])),
        ]));

        let report = fetcher(Arc::clone(&source))
            .fetch("BV1test", &ProgressLog::default())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::EndOfData);
        assert_eq!(report.comments.len(), 2);
        assert_eq!(source.requested(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_cap_is_backstop() {
        let pages = (1..=10).map(|i| ScriptedPage::Replies(replies(&[i]))).collect();
        let source = Arc::new(ScriptedSource::new(pages));
        let config = FetchConfig {
            max_pages: 4,
            ..Default::default()
        };

        let report = CommentFetcher::new(Arc::clone(&source), config)
            .fetch("BV1test", &ProgressLog::default())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::PageCapReached);
        assert_eq!(report.pages_requested, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_middle_page_is_skipped() {
        let source = Arc::new(ScriptedSource::new(vec![
            ScriptedPage::Replies(replies(&[1])),
            ScriptedPage::Failure,
            ScriptedPage::Code(-404),
            ScriptedPage::Replies(replies(&[2])),
        ]));

        let report = fetcher(Arc::clone(&source))
            .fetch("BV1test", &ProgressLog::default())
            .await
            .unwrap();

        let ids: Vec<&str> = report.comments.iter().map(|c| c.comment_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        // Skipped pages do not count as empty: 5, 6, 7 end it
        assert_eq!(report.pages_requested, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_first_page_fails_fetch() {
        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::Failure]));
        let log = ProgressLog::default();

        let err = fetcher(source).fetch("BV1test", &log).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert!(!log.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_error_code_is_source_not_found() {
        let mut source = ScriptedSource::new(vec![]);
        source.lookup = Ok(ApiEnvelope {
            code: -400,
            message: "请求错误".to_string(),
            data: None,
        });
        let source = Arc::new(source);

        let err = fetcher(Arc::clone(&source))
            .fetch("BVbad", &ProgressLog::default())
            .await
            .unwrap_err();

        match err {
            FetchError::SourceNotFound(msg) => {
                assert!(msg.contains("-400"));
                assert!(msg.contains("请求错误"));
            }
            other => panic!("expected SourceNotFound, got {:?}", other),
        }
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_without_id_is_source_not_found() {
        let mut source = ScriptedSource::new(vec![]);
        source.lookup = Ok(ApiEnvelope {
            code: 0,
            message: String::new(),
            data: None,
        });

        let err = fetcher(Arc::new(source))
            .fetch("BVmissing", &ProgressLog::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_lookup_without_aid_is_source_not_found() {
        let mut source = ScriptedSource::new(vec![]);
        source.lookup = Ok(serde_json::from_value(json!({
            "code": 0,
            "message": "0",
            "data": {"bvid": "BVnoaid", "title": "no aid"}
        }))
        .unwrap());

        let err = fetcher(Arc::new(source))
            .fetch("BVnoaid", &ProgressLog::default())
            .await
            .unwrap_err();

        match err {
            FetchError::SourceNotFound(msg) => assert!(msg.contains("no object ID")),
            other => panic!("expected SourceNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_error_code_with_foreign_data_is_source_not_found() {
        let mut source = ScriptedSource::new(vec![]);
        source.lookup = Ok(serde_json::from_value(json!({
            "code": RATE_LIMIT_CODE,
            "message": "-352",
            "data": {"v_voucher": "voucher_abc"}
        }))
        .unwrap());
        let source = Arc::new(source);

        let err = fetcher(Arc::clone(&source))
            .fetch("BV1test", &ProgressLog::default())
            .await
            .unwrap_err();

        match err {
            FetchError::SourceNotFound(msg) => assert!(msg.contains("-352")),
            other => panic!("expected SourceNotFound, got {:?}", other),
        }
        assert!(source.requested().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_page_is_reported_in_log() {
        let mut page = replies(&[1]);
        page.push(json!("not a comment"));
        page.push(json!({"rpid": 2, "content": {"message": "no member"}}));
        let source = Arc::new(ScriptedSource::new(vec![ScriptedPage::Raw(ReplyPage {
            replies: Some(page),
            page: None,
            cursor: Some(crate::model::ReplyCursor { is_end: true }),
        })]));
        let log = ProgressLog::default();

        let report = fetcher(source).fetch("BV1test", &log).await.unwrap();

        assert_eq!(report.comments.len(), 2);
        let warnings: Vec<_> = log
            .entries()
            .into_iter()
            .filter(|e| e.level == crate::model::LogLevel::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("Page 1:"));
        assert!(warnings[0].message.contains("skipped 1"));
        assert!(warnings[0].message.contains("no author ID"));
    }

    #[tokio::test]
    async fn test_lookup_transport_failure() {
        let mut source = ScriptedSource::new(vec![]);
        source.lookup = Err("connection refused".to_string());

        let err = fetcher(Arc::new(source))
            .fetch("BV1test", &ProgressLog::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
    }
}
