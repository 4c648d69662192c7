//! Application layer orchestrating the loan lifecycle.
//!
//! This module defines the `LendingEngine`, the primary entry point, plus
//! the services it composes: intake with fraud screening, staff review,
//! fee settlement across the payment rails, and disbursement. Services hold
//! store and gateway handles injected at construction and never reach for
//! globals.

pub mod disbursement;
pub mod engine;
pub mod fees;
pub mod fraud_screen;
pub mod intake;
pub mod review;
pub mod settlement;
