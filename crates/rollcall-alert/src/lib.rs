//! Emergency alert workflow for Rollcall.
//!
//! Students raise alerts, the principal triages them, teachers watch
//! the list. This crate wraps the registry's alert operations with the
//! role gates and the forward-only status rules, and rejects obviously
//! bad reports before they cost a network round trip.

#![allow(async_fn_in_trait)]

mod error;
mod workflow;

pub use error::AlertError;
pub use workflow::AlertWorkflow;
