#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
//! # beeq-core
//!
//! Runtime-agnostic contract layer for [`beeq`](https://docs.rs/beeq): the job
//! and queue data model, the fixed Redis key schema, queue settings and the
//! error taxonomy. Nothing in this crate talks to Redis directly — that is
//! `beeq-redis`'s job.

/// Error taxonomy: transport, misuse, handler and timeout errors.
pub mod error;
/// Event envelope types exchanged over the `events` pub/sub channel.
pub mod event;
/// The `Job` data model and its builder.
pub mod job;
/// Fixed Redis key schema for a queue `(prefix, name)` pair.
pub mod schema;
/// Queue-wide settings and their defaults.
pub mod settings;
