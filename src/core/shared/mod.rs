pub mod enums;
pub mod models;
pub mod state;

pub use enums::*;
pub use models::*;
