//! luckydraw adapters crate
//!
//! Infrastructure adapters implementing the domain ports:
//! - `proxy`: HTTP client for the header-forging comment proxy
//! - `stub`: Scripted and demo comment sources for tests and offline use

pub mod proxy;
pub mod stub;

pub use proxy::{ProxyCommentSource, ProxyConfig};
pub use stub::{DEMO_OBJECT_ID, StubCommentSource};
