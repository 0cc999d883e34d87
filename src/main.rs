mod config;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tokio::time::{self, Instant};
use trailcrab::{Throttler, ThrottlerBuilder};

use crate::config::DemoConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = DemoConfig::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("trailcrab={}", config.log_level).parse()?),
        )
        .init();

    tracing::info!(
        "Throttling {} requests every {:?} against a {:?} window",
        config.requests,
        config.interval,
        config.wait
    );

    let throttler = demo_throttler(&config)?;
    let started = Instant::now();

    let mut completions = Vec::new();
    for n in 1..=config.requests {
        completions.push((n, throttler.request(n)));
        time::sleep(config.interval).await;
    }

    for (n, completion) in completions {
        match completion.await {
            Some(ran) if ran == n => tracing::info!("Request #{} executed", n),
            Some(ran) => tracing::info!("Request #{} superseded by #{}", n, ran),
            None => tracing::info!("Request #{} settled without a result", n),
        }
    }

    tracing::info!(
        "{} requests led to {} executions in {:?}",
        config.requests,
        throttler.execution_count(),
        started.elapsed()
    );

    if config.json {
        println!("{}", serde_json::to_string_pretty(&throttler.metrics())?);
    } else {
        print!("{}", throttler.export_prometheus());
    }

    Ok(())
}

/// Operation that takes `work` and fails every `fail_every`-th run
fn demo_throttler(config: &DemoConfig) -> Result<Throttler<u64, u64, String>> {
    let runs = Arc::new(AtomicU64::new(0));
    let work = config.work;
    let fail_every = config.fail_every;

    let throttler = ThrottlerBuilder::new()
        .wait(config.wait)
        .name("demo")
        .on_error(|e: &String| tracing::warn!("Observed failure: {}", e))
        .build(move |n: u64| {
            let run = runs.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!("Execution {} started for request #{}", run, n);
            async move {
                time::sleep(work).await;
                if fail_every > 0 && run % fail_every == 0 {
                    Err(format!("execution {run} for request #{n} failed"))
                } else {
                    Ok(n)
                }
            }
        })?;

    Ok(throttler)
}
