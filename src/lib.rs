pub mod core;
pub mod documents;
pub mod import;
pub mod packing;
pub mod pricing;
pub mod quotes;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

pub use crate::core::config::AppConfig;
pub use crate::core::error::{QuoteError, QuoteResult};
pub use crate::core::shared::state::AppState;
