#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
//! # beeq
//!
//! A Redis-backed job queue for many short, real-time jobs, where end-to-end
//! latency from enqueue to result matters more than raw throughput.
//!
//! ```rust,no_run
//! use beeq::prelude::*;
//!
//! #[derive(serde::Serialize, serde::Deserialize, Clone)]
//! struct Addition {
//!     x: i64,
//!     y: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let queue: Queue<Addition> = Queue::new("addition", Settings::default()).await?;
//!
//!     queue.create_job(Addition { x: 2, y: 3 }).save().await?;
//!
//!     queue
//!         .process(5, |job, ctx| async move {
//!             let _ = ctx.report_progress(50).await;
//!             Ok(serde_json::json!(job.data().x + job.data().y))
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub use beeq_core::error::{Error, HandlerError};
pub use beeq_core::event::{JobEvent, QueueEvent};
pub use beeq_core::job::{Job, JobOptions};
pub use beeq_core::settings::Settings;

pub use beeq_redis::pending_job::{JobHandle, PendingJob};
pub use beeq_redis::queue::{HandlerContext, Queue};

/// Convenience re-exports for the common `use beeq::prelude::*;` pattern.
pub mod prelude {
    pub use crate::{
        Error, HandlerContext, HandlerError, Job, JobEvent, JobHandle, PendingJob, Queue,
        QueueEvent, Settings,
    };
}
