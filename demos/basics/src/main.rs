use std::time::Duration;

use beeq::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Addition {
    x: i64,
    y: i64,
}

async fn produce_jobs(queue: &Queue<Addition>) {
    for i in 0..5 {
        let job = queue
            .create_job(Addition { x: i, y: i + 1 })
            .retries(2)
            .save()
            .await
            .unwrap();
        tracing::info!(job_id = job.id(), "job enqueued");
    }
}

async fn add(job: Job<Addition>, ctx: HandlerContext<Addition>) -> Result<serde_json::Value, HandlerError> {
    let _ = ctx.report_progress(50).await;
    let sum = job.data().x + job.data().y;
    Ok(serde_json::json!(sum))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    std::env::set_var("RUST_LOG", "info");
    tracing_subscriber::fmt::init();

    let settings = Settings::default().set_redis_url("redis://127.0.0.1/");
    let queue: Queue<Addition> = Queue::new("addition", settings).await?;

    produce_jobs(&queue).await;

    queue.process(5, add).await?;

    tokio::time::sleep(Duration::from_secs(2)).await;

    queue.close().await?;
    Ok(())
}
