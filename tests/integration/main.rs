//! Integration tests
//!
//! Drives the engine end to end through `AppState`: booking lifecycle,
//! availability projection, cancellation refunds, pricing, bus/gateway
//! fan-out, concurrency and the scheduler jobs.
//!
//! Run with `cargo test --test integration` or a specific file with
//! `cargo test --test integration lifecycle`.

#[path = "../common/mod.rs"]
mod common;

mod availability_test;
mod concurrency_test;
mod lifecycle_test;
mod pricing_test;
mod scheduler_test;
