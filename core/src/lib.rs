//! civicdesk-core: jurisdiction lookup, duplicate linking, complaint
//! lifecycle and SLA escalation for civic issue reports.
//!
//! HTTP routing, auth, uploads, messaging transport and AI providers live
//! outside this crate and are reached through the traits in `role`,
//! `effects` and `classify`.

pub mod activity;
pub mod admin_area;
pub mod classify;
pub mod clock;
pub mod complaint;
pub mod complaint_service;
pub mod config;
pub mod duplicate;
pub mod effects;
pub mod error;
pub mod escalation;
pub mod geo;
pub mod lifecycle;
pub mod query_planner;
pub mod role;
pub mod store;
pub mod types;
pub mod ward;
