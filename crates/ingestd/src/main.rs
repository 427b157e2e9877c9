mod config;
mod import;
mod state;
mod sweep;
mod watch;

use std::future::Future;
use std::sync::Arc;

use config::{config_path_from_env, load_or_create_config};
use import::create_task;
use library::{Catalog, LoftyExtractor, Scanner};
use state::AppState;
use sweep::start_hash_sweep;
use tracing::{info, warn};
use watch::configure_watcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let roots = config.media_roots(&config_path);
    for root in [&roots.music, &roots.audiobook] {
        if !root.is_dir() {
            warn!("Media root {:?} does not exist", root);
        }
    }
    std::fs::create_dir_all(&roots.covers)?;

    let index_path = config.index_path(&config_path);
    let catalog = Catalog::open(&index_path)?;
    info!("Opened catalog at {:?}", index_path);

    let scanner = Scanner::new(Arc::new(LoftyExtractor), roots.covers.clone())
        .with_extensions(config.extensions.as_slice());
    let sweep_delay = config.hash_sweep_delay();
    let startup_mode = config.startup_import.mode();
    let state = AppState::new(&config_path, config, catalog, scanner);

    let _sweep = start_hash_sweep(state.clone(), sweep_delay);

    let startup_task = match startup_mode {
        Some(mode) => match create_task(&state, mode) {
            Ok(task) => {
                info!("Startup import {} started", task.id);
                Some(task.id)
            }
            Err(err) => {
                warn!("Startup import not started: {}", err);
                None
            }
        },
        None => {
            info!("Startup import disabled");
            configure_watcher(&state);
            None
        }
    };

    shutdown_signal().await;
    if let Some(task) = import::running_task(&state) {
        warn!("Shutting down with import {} still running", task.id);
    } else if let Some(task) = startup_task.and_then(|id| import::get_task(&state, &id)) {
        info!("Startup import {} ended {:?}", task.id, task.status);
    }
    *state.watcher.write() = None;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => Some(async move {
                term.recv().await;
            }),
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                None
            }
        }
    };
    #[cfg(not(unix))]
    let terminate: Option<std::future::Ready<()>> = None;

    wait_for_shutdown(tokio::signal::ctrl_c(), terminate).await;
    info!("Shutdown signal received.");
}

/// Resolves on ctrl-c or on `terminate`. When ctrl-c cannot be listened for
/// it only resolves on `terminate`, or never.
async fn wait_for_shutdown<C, T>(ctrl_c: C, terminate: Option<T>)
where
    C: Future<Output = std::io::Result<()>>,
    T: Future<Output = ()>,
{
    let ctrl_c = async {
        if let Err(err) = ctrl_c.await {
            warn!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };
    match terminate {
        Some(terminate) => {
            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }
        }
        None => ctrl_c.await,
    }
}
