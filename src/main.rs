// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context};
use chrono::Utc;
use std::env;
use tokio_util::sync::CancellationToken;

use the_conductor::config::{load_conductor_config, RuntimeBuilder};
use the_conductor::observability::init_tracing;
use the_conductor::service::{run_once, serve};

const USAGE: &str = "Usage: the-conductor <once|serve> <conductor.toml>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        bail!(USAGE);
    }
    let (mode, config_path) = (args[1].as_str(), &args[2]);

    let config = load_conductor_config(config_path)
        .with_context(|| format!("loading {}", config_path))?;
    let runtime = RuntimeBuilder::new().build(&config).await?;

    match mode {
        "once" => {
            let report = run_once(&runtime, Utc::now()).await?;
            tracing::info!(
                enqueued = report.enqueued,
                succeeded = report.queue.success,
                failed = report.queue.failed,
                clean_shutdown = report.clean_shutdown,
                "Run complete"
            );
        }
        "serve" => {
            let cancel = CancellationToken::new();
            let stopper = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received, draining workers");
                }
                stopper.cancel();
            });

            let clean = serve(&runtime, cancel).await?;
            tracing::info!(clean_shutdown = clean, "Conductor stopped");
        }
        other => bail!("unknown mode '{}'. {}", other, USAGE),
    }

    Ok(())
}
