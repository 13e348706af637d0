//! Application use cases / business logic

pub mod draw;
pub mod fetch;
pub mod filter;
pub mod session;

pub use draw::{DrawConfig, DrawEngine, DrawError, DrawHandle, DrawOutcome, DrawPhase};
pub use fetch::{CommentFetcher, FetchConfig, FetchError, FetchReport, Termination};
pub use filter::{FilterStats, eligible_pool, eligible_pool_with_stats};
pub use session::{DrawReport, FetchCompletion, FetchTicket, LotterySession, SessionError};
