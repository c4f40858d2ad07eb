use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use relay_coordinator::Coordinator;
use relay_engine::{
    ArchiveEngine, LedgerHashOracle, NoopOracle, ReplayEngine, SqliteHashStore, VerifyingEngine,
};

use crate::config::RelayConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Open the replay engine described by `config`: the configured history
/// archives, verified against the hash database when one is set.
pub fn open_engine(config: &RelayConfig) -> ServerResult<Box<dyn ReplayEngine>> {
    let archive = ArchiveEngine::open(config.archive_config())?;
    let oracle: Box<dyn LedgerHashOracle> = match &config.database_url {
        Some(url) => Box::new(SqliteHashStore::open(url)?),
        None => Box::new(NoopOracle),
    };
    Ok(Box::new(VerifyingEngine::new(archive, oracle, config.oracle_policy)))
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

#[derive(Default)]
struct Lifecycle {
    running: Option<Running>,
    stopped: bool,
}

/// Ledger relay server.
///
/// `start` and `stop` are both idempotent. Once stopped, the server and its
/// engine cannot be started again.
pub struct RelayServer {
    config: RelayConfig,
    coordinator: Arc<Coordinator>,
    lifecycle: Mutex<Lifecycle>,
}

impl RelayServer {
    pub fn new(config: RelayConfig, coordinator: Arc<Coordinator>) -> Self {
        Self {
            config,
            coordinator,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Validate `config` and open its engine.
    pub fn from_config(config: RelayConfig) -> ServerResult<Self> {
        config.validate()?;
        let engine = open_engine(&config)?;
        let coordinator = Arc::new(Coordinator::from_boxed(engine));
        Ok(Self::new(config, coordinator))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            coordinator: Arc::clone(&self.coordinator),
            info: self.config.info(),
            request_timeout: self.config.request_timeout(),
        })
    }

    /// Bind the listener and start serving. Returns the bound address.
    pub async fn start(&self) -> ServerResult<SocketAddr> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.stopped {
            return Err(ServerError::Stopped);
        }
        if let Some(running) = &lifecycle.running {
            return Ok(running.addr);
        }

        let listener = TcpListener::bind(self.config.listen_addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        info!(%addr, "ledger relay listening");
        lifecycle.running = Some(Running { addr, shutdown, task });
        Ok(addr)
    }

    /// Stop accepting requests, let the in-flight engine operation finish,
    /// then release the engine.
    pub async fn stop(&self) -> ServerResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.stopped {
            return Ok(());
        }
        lifecycle.stopped = true;

        info!("ledger relay stopping");
        self.coordinator.begin_drain();
        let running = lifecycle.running.take();
        let task = running.map(|r| {
            let _ = r.shutdown.send(());
            r.task
        });

        let coordinator = Arc::clone(&self.coordinator);
        let closed = tokio::task::spawn_blocking(move || coordinator.close())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        if let Some(task) = task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "HTTP server exited with an error"),
                Err(err) => warn!(error = %err, "HTTP server task failed"),
            }
        }

        closed?;
        info!("ledger relay stopped");
        Ok(())
    }

    /// Serve until `shutdown` resolves, then stop.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.lock().await.running.as_ref().map(|r| r.addr)
    }
}
