//! Request handlers.

pub mod health;
pub mod jobs;
pub mod usage;

pub use health::*;
pub use jobs::*;
pub use usage::*;
