//! Helper utilities, functions, and macros.

#[macro_use]
mod print;

#[macro_use]
mod config;

mod error;
mod bitmap;
mod asyncvar;
mod actors;
mod quorum;

pub use error::TaglogError;
pub use bitmap::Bitmap;
pub use asyncvar::{AsyncVar, AsyncVarWatch, Trigger};
pub use actors::{ActorCollection, Outcome, TaskGuard};
pub use quorum::{quorum, wait_for_any};
