//! # Example: SEO article batch
//!
//! Generates a handful of articles with `max_concurrency = 2` against a flaky fake
//! provider, prints the live run table, then retries whatever failed.
//!
//! ```bash
//! RUST_LOG=batchvisor=info cargo run --example seo_batch --features logging
//! ```

use std::{sync::Arc, time::Duration};

use rand::Rng;
use tracing_subscriber::EnvFilter;

use batchvisor::{
    BackoffPolicy, HandlerFn, HandlerRef, JitterPolicy, LogWriter, Prune, RunContext, RunStatus,
    RunView, Runs, Scheduler, SchedulerConfig, Subscribe, TaskError,
};

#[derive(Clone, Debug)]
struct Article {
    slug: &'static str,
    keyword: &'static str,
}

const ARTICLES: [Article; 5] = [
    Article { slug: "best-espresso-grinders", keyword: "espresso grinder" },
    Article { slug: "pour-over-guide", keyword: "pour over" },
    Article { slug: "cold-brew-ratio", keyword: "cold brew ratio" },
    Article { slug: "moka-pot-tips", keyword: "moka pot" },
    Article { slug: "decaf-explained", keyword: "decaf coffee" },
];

/// Pretends to call an LLM provider, phase by phase.
async fn write_article(job: RunView<Article>, ctx: RunContext) -> Result<(), TaskError> {
    let phases = ["outline", "draft", "meta description"];
    for (i, phase) in phases.iter().enumerate() {
        if ctx.token().is_cancelled() {
            return Err(TaskError::fail("cancelled"));
        }
        ctx.set_stream_status(format!("{phase}: {}", job.record.keyword));
        let (pause, throttled) = {
            let mut rng = rand::rng();
            (rng.random_range(40..120u64), rng.random_bool(0.15))
        };
        tokio::time::sleep(Duration::from_millis(pause)).await;

        if throttled {
            return Err(TaskError::fail(format!("429 from provider during {phase}")));
        }
        ctx.set_progress(((i + 1) * 100 / phases.len()) as u8);
    }
    Ok(())
}

fn print_table(runs: &Runs<Article>) {
    println!("{:<26} {:<13} {:>4} {:>3}  error", "slug", "status", "pct", "try");
    for run in runs.iter() {
        println!(
            "{:<26} {:<13} {:>3}% {:>3}  {}",
            run.key,
            run.status(),
            run.state.progress,
            run.state.retry_count,
            run.state.error.as_deref().unwrap_or("")
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "batchvisor=info".into()))
        .init();

    let cfg = SchedulerConfig {
        max_concurrency: 2,
        max_retries: 1,
        delay: Duration::from_millis(50),
        timeout: Duration::from_secs(2),
        retry_backoff: Some(BackoffPolicy {
            first: Duration::from_millis(100),
            jitter: JitterPolicy::Equal,
            ..BackoffPolicy::default()
        }),
        ..SchedulerConfig::default()
    };

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let handler: HandlerRef<Article> = HandlerFn::arc(write_article);
    let scheduler = Scheduler::builder(cfg)
        .with_subscribers(subs)
        .build(|a: &Article| Arc::from(a.slug), handler);

    scheduler.load_tasks(ARTICLES, Prune::Abandon);

    let mut runs = scheduler.watch_runs();
    scheduler.start_all();
    while scheduler.is_running() {
        runs.changed().await?;
    }
    print_table(&scheduler.runs());

    let failed = scheduler
        .runs()
        .iter()
        .filter(|r| r.status() == RunStatus::Failed)
        .count();
    if failed > 0 {
        println!("\nretrying {failed} failed article(s)\n");
        scheduler.start_failed_only(true);
        while scheduler.is_running() {
            runs.changed().await?;
        }
        print_table(&scheduler.runs());
    }

    // Force one article again, outside the batch.
    match scheduler.run_one_now("moka-pot-tips").await {
        Ok(()) => println!("\nmoka-pot-tips regenerated"),
        Err(e) => println!("\nmoka-pot-tips: {e}"),
    }

    println!("{:?}", scheduler.stats());
    scheduler.shutdown();
    Ok(())
}
