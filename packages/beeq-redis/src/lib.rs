#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
//! # beeq-redis
//!
//! The Redis-backed queue engine: atomic Lua scripts, the producer path, the
//! worker loop, the stall supervisor, and the pub/sub event bus, built on top
//! of the schema and data model in `beeq-core`.

mod events;
mod registry;
mod scripts;
/// The producer-facing pending job builder returned by
/// [`Queue::create_job`](queue::Queue::create_job).
pub mod pending_job;
/// The queue handle: connection lifecycle, producer path, worker loop and
/// stall supervisor.
pub mod queue;
mod worker;
