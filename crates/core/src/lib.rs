//! Core business logic for Tally.
//!
//! This crate contains business logic with ZERO web or SQL dependencies. The
//! only I/O it does is through the idempotency stores.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `auth` - User roles and their ledger permissions
//! - `ledger` - Double-entry rules, references, locks, reversals, reconciliation
//! - `idempotency` - Idempotency records, the gateway state machine, and its stores

pub mod auth;
pub mod idempotency;
pub mod ledger;
