//! luckydraw domain crate
//!
//! Core logic, kept free of I/O behind ports:
//! - `model`: Canonical comments, filter rules, winners, wire envelopes
//! - `normalize`: Raw payload to canonical comment conversion
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `progress`: Operator-visible progress log
//! - `usecases`: Fetch, filter, draw, and the session that ties them together

mod lenient;
pub mod model;
pub mod normalize;
pub mod ports;
pub mod progress;
pub mod usecases;

pub use model::*;
pub use normalize::{
    NormalizeError, NormalizedBatch, PayloadShape, normalize_batch_at, normalize_comments,
    normalize_payload, parse_manual_batch, parse_manual_input,
};
pub use ports::*;
pub use progress::ProgressLog;
