//! Comment normalizer - turns raw payloads of any known shape into
//! [`CanonicalComment`] records

use serde_json::Value;
use thiserror::Error;

use crate::lenient;
use crate::model::CanonicalComment;

/// Error type for the normalizer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

/// Payload shapes that carry a comment list, in match priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `[ ... ]`
    TopLevelList,
    /// `{ "data": { "replies": [ ... ] } }`
    DataReplies,
    /// `{ "replies": [ ... ] }`
    Replies,
    /// `{ "data": [ ... ] }`
    DataList,
}

impl PayloadShape {
    pub const PRIORITY: [PayloadShape; 4] = [
        PayloadShape::TopLevelList,
        PayloadShape::DataReplies,
        PayloadShape::Replies,
        PayloadShape::DataList,
    ];

    /// Return the comment list if the payload has this shape
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a [Value]> {
        let list = match self {
            PayloadShape::TopLevelList => payload.as_array(),
            PayloadShape::DataReplies => payload
                .get("data")
                .and_then(|data| data.get("replies"))
                .and_then(Value::as_array),
            PayloadShape::Replies => payload.get("replies").and_then(Value::as_array),
            PayloadShape::DataList => payload.get("data").and_then(Value::as_array),
        };
        list.map(Vec::as_slice)
    }

    /// First shape in priority order that matches the payload
    pub fn detect(payload: &Value) -> Option<(PayloadShape, &[Value])> {
        Self::PRIORITY
            .iter()
            .find_map(|shape| shape.extract(payload).map(|list| (*shape, list)))
    }
}

/// Comments normalized from one list, with counts of the items that needed
/// fallbacks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub comments: Vec<CanonicalComment>,
    /// Items that were not JSON objects and were dropped
    pub skipped: usize,
    /// Comments whose author ID fell back to the comment ID
    pub missing_author: usize,
}

impl NormalizedBatch {
    /// Operator-facing summary of skipped and author-less items, if any
    pub fn warning(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.skipped > 0 {
            parts.push(format!("skipped {} non-object items", self.skipped));
        }
        if self.missing_author > 0 {
            parts.push(format!(
                "{} comments have no author ID, so dedupe cannot catch repeats for them",
                self.missing_author
            ));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

fn locate(payload: &Value) -> Result<&[Value], NormalizeError> {
    let (shape, list) = PayloadShape::detect(payload).ok_or_else(|| {
        NormalizeError::MalformedInput(
            "no comment list could be located (expected an array, data.replies, replies or data)"
                .to_string(),
        )
    })?;

    tracing::debug!(shape = ?shape, items = list.len(), "Located comment list");
    Ok(list)
}

/// Normalize a whole payload, locating the comment list first
pub fn normalize_payload(payload: &Value) -> Result<Vec<CanonicalComment>, NormalizeError> {
    Ok(normalize_comments(locate(payload)?))
}

/// Parse operator-supplied JSON text and normalize it
pub fn parse_manual_input(input: &str) -> Result<Vec<CanonicalComment>, NormalizeError> {
    parse_manual_batch(input).map(|batch| batch.comments)
}

/// Like [`parse_manual_input`], keeping the skipped and author-less counts
pub fn parse_manual_batch(input: &str) -> Result<NormalizedBatch, NormalizeError> {
    if input.trim().is_empty() {
        return Err(NormalizeError::MalformedInput("input is empty".to_string()));
    }

    let payload: Value = serde_json::from_str(input)
        .map_err(|e| NormalizeError::MalformedInput(format!("invalid JSON: {}", e)))?;

    Ok(normalize_batch_at(locate(&payload)?, 0))
}

/// Normalize a list of raw comment objects
pub fn normalize_comments(items: &[Value]) -> Vec<CanonicalComment> {
    normalize_comments_at(items, 0)
}

/// Normalize a list whose first element sits at `offset` in the overall
/// result, so positional fallback IDs stay unique across pages
pub fn normalize_comments_at(items: &[Value], offset: usize) -> Vec<CanonicalComment> {
    normalize_batch_at(items, offset).comments
}

/// Normalize a list and count what had to be skipped or defaulted.
///
/// Every field is read on its own, so a mistyped field falls back to its
/// default instead of costing the whole comment. Only non-object items are
/// dropped.
pub fn normalize_batch_at(items: &[Value], offset: usize) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        comments: Vec::with_capacity(items.len()),
        ..Default::default()
    };

    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            tracing::warn!(index = offset + index, "Skipping comment that is not an object");
            batch.skipped += 1;
            continue;
        }

        let (comment, has_author) = to_canonical(item, offset + index);
        if !has_author {
            batch.missing_author += 1;
        }
        batch.comments.push(comment);
    }

    if batch.missing_author > 0 {
        tracing::warn!(
            count = batch.missing_author,
            "Comments without an author ID fall back to their comment ID; dedupe cannot catch repeats for them"
        );
    }

    batch
}

/// Returns the record and whether the source supplied an author ID
fn to_canonical(item: &Value, position: usize) -> (CanonicalComment, bool) {
    let comment_id = item
        .get("rpid_str")
        .and_then(lenient::id)
        .or_else(|| item.get("rpid").and_then(lenient::id))
        .unwrap_or_else(|| format!("#{}", position));

    let author_id = item.pointer("/member/mid").and_then(lenient::id);
    let has_author = author_id.is_some();
    let text_at = |pointer: &str| {
        item.pointer(pointer)
            .and_then(lenient::text)
            .unwrap_or_default()
    };

    let level = item
        .pointer("/member/level_info/current_level")
        .and_then(lenient::int)
        .unwrap_or(0);

    let comment = CanonicalComment {
        author_id: author_id.unwrap_or_else(|| comment_id.clone()),
        comment_id,
        author_name: text_at("/member/uname"),
        avatar_url: text_at("/member/avatar"),
        text: text_at("/content/message"),
        level: u32::try_from(level.max(0)).unwrap_or(u32::MAX),
        created_at: item.get("ctime").and_then(lenient::int).unwrap_or(0),
        likes: item.get("like").and_then(lenient::count).unwrap_or(0),
    };

    (comment, has_author)
}
