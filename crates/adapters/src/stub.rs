//! Stub comment source for tests and offline demos

use async_trait::async_trait;
use luckydraw_domain::{
    ApiEnvelope, CommentSource, PageCounter, ReplyCursor, ReplyPage, SourceError, VideoView,
};
use serde_json::{Value, json};

/// Object ID reported by the demo source
pub const DEMO_OBJECT_ID: u64 = 999_999;

const DEMO_COMMENTS: usize = 25;
const DEMO_PAGE_SIZE: usize = 20;

/// Serves pre-scripted pages for any video ID
pub struct StubCommentSource {
    object_id: Option<u64>,
    pages: Vec<Vec<Value>>,
}

impl StubCommentSource {
    /// A source whose pages are served in order; the last one is flagged
    /// as the end of data
    pub fn with_pages(object_id: u64, pages: Vec<Vec<Value>>) -> Self {
        Self {
            object_id: Some(object_id),
            pages,
        }
    }

    /// A source that resolves no video
    pub fn not_found() -> Self {
        Self {
            object_id: None,
            pages: vec![],
        }
    }

    /// 25 synthetic comments over two pages
    pub fn demo() -> Self {
        let comments: Vec<Value> = (0..DEMO_COMMENTS).map(demo_reply).collect();
        let pages = comments
            .chunks(DEMO_PAGE_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect();
        Self::with_pages(DEMO_OBJECT_ID, pages)
    }

    fn total_comments(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

impl Default for StubCommentSource {
    fn default() -> Self {
        Self::demo()
    }
}

fn demo_reply(i: usize) -> Value {
    let message = if i % 2 == 0 {
        format!("这是一个模拟评论 #{}，接好运", i + 1)
    } else {
        format!("这是一个模拟评论 #{}", i + 1)
    };
    json!({
        "rpid": 500_000 + i,
        "ctime": 1_700_000_000 - (i as i64) * 3600,
        "like": i,
        "member": {
            "mid": format!("mock_{}", i),
            "uname": format!("测试用户 {}", i + 1),
            "avatar": format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", i),
            "level_info": {"current_level": i % 7}
        },
        "content": {"message": message}
    })
}

#[async_trait]
impl CommentSource for StubCommentSource {
    async fn lookup_video(&self, _video_id: &str) -> Result<ApiEnvelope<VideoView>, SourceError> {
        Ok(match self.object_id {
            Some(object_id) => ApiEnvelope {
                code: 0,
                message: "0".to_string(),
                data: Some(VideoView {
                    object_id: Some(object_id),
                }),
            },
            None => ApiEnvelope {
                code: -404,
                message: "啥都木有".to_string(),
                data: None,
            },
        })
    }

    async fn fetch_page(
        &self,
        _object_id: u64,
        _video_id: &str,
        page: u32,
    ) -> Result<ApiEnvelope<ReplyPage>, SourceError> {
        let index = page.saturating_sub(1) as usize;
        let replies = self.pages.get(index).cloned().unwrap_or_default();
        let size = self.pages.first().map(Vec::len).unwrap_or(0);

        Ok(ApiEnvelope {
            code: 0,
            message: "0".to_string(),
            data: Some(ReplyPage {
                replies: Some(replies),
                page: Some(PageCounter {
                    count: self.total_comments() as u64,
                    size: size as u64,
                }),
                cursor: Some(ReplyCursor {
                    is_end: index + 1 >= self.pages.len(),
                }),
            }),
        })
    }
}
