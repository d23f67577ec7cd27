//! Attendance redemption for Rollcall.
//!
//! This crate owns the one operation students actually care about:
//! turning a scanned (or hand-typed) string into an attendance record,
//! or into a message explaining why not.
//!
//! # How it fits in the stack
//!
//! ```text
//! Scan layer (above)     ← hands raw decoded strings to the engine
//!     ↕
//! Redeem layer (this crate)  ← validates cheap-first, then records
//!     ↕
//! Registry layer (below) ← the authority on duplicates and expiry
//! ```

#![allow(async_fn_in_trait)]

mod engine;
mod error;

pub use engine::RedemptionEngine;
pub use error::RedemptionError;
