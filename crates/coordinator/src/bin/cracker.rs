//! Cracker binary entry point
//!
//! Usage: `cracker <input.csv> [workers] [config.json]`
//!
//! Runs a local cluster over the input file, serves the status API while the
//! run lasts and prints one result line per password record.

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coordinator::{http_api::AppState, server, CsvBatchSource, LocalCluster, MasterMessage};
use coordinator::{ServerConfig, StatusServer};
use runtime_core::{RuntimeConfig, RuntimeManager, ShutdownReceiver};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coordinator=info,runtime_core=info,transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let input_arg = args.next();
    let workers_arg = args.next();
    let config_arg = args.next();

    let mut config = match config_arg {
        Some(path) => RuntimeConfig::load(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => RuntimeConfig::default(),
    };
    if let Some(workers) = workers_arg {
        config.worker.local_workers = workers
            .parse()
            .with_context(|| format!("invalid worker count {:?}", workers))?;
    }
    if let Some(path) = input_arg {
        config.input.path = Some(path);
    }
    let Some(input) = config.input.path.clone() else {
        bail!("usage: cracker <input.csv> [workers] [config.json]");
    };

    let manager = RuntimeManager::new(config.clone())?;
    let mut cracking = manager.spawn(run(config, input, manager.shutdown_receiver()));

    // Ctrl+C ends the run early; results so far are still printed
    let outcome = manager.block_on(async {
        tokio::select! {
            joined = &mut cracking => joined,
            _ = server::shutdown_signal() => {
                manager.shutdown();
                (&mut cracking).await
            }
        }
    });
    outcome?
}

async fn run(config: RuntimeConfig, input: String, mut shutdown: ShutdownReceiver) -> anyhow::Result<()> {
    tracing::info!(
        input = %input,
        workers = config.worker.local_workers,
        "Starting cracker"
    );

    let source = CsvBatchSource::open(&input, &config.input)?;
    let server_config = ServerConfig::from_address(&config.coordinator.http_bind_address)?;
    let cluster = LocalCluster::start(config, source)?;

    // Status API for the lifetime of the run
    let state = AppState {
        master: cluster.master().clone(),
        registry: cluster.registry(),
    };
    let (stop_http, http_stopped) = tokio::sync::oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = http_stopped.await;
        };
        if let Err(e) = StatusServer::new(server_config, state).run(shutdown).await {
            tracing::error!(error = %e, "Status API failed");
        }
    });

    let master = cluster.master().clone();
    let signal_handle = tokio::spawn(async move {
        if shutdown.recv().await.is_ok() {
            master.tell(MasterMessage::Shutdown);
        }
    });

    let report = cluster.wait().await?;
    signal_handle.abort();
    let _ = stop_http.send(());
    let _ = http_handle.await;

    tracing::info!(
        results = report.results.len(),
        progress_notices = report.progress.len(),
        "Cracker finished"
    );
    Ok(())
}
