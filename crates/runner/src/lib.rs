//! Supervises long-running service processes with graceful shutdown.
//!
//! Processes run concurrently and share a [`CancellationToken`]. When any
//! process fails, a shutdown signal (SIGINT/SIGTERM) arrives, or the token is
//! cancelled externally, every process is asked to stop and the registered
//! closers run under a timeout.
//!
//! # Example
//!
//! ```no_run
//! use fieldgate_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Runner::new()
//!         .with_named_process("heartbeat", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("still alive");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("releasing resources");
//!             Ok(())
//!         })
//!         .run()
//!         .await
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type BoxFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// A named long-running process. The name shows up in shutdown logs.
struct ServiceProcess {
    name: &'static str,
    start: Box<dyn FnOnce(CancellationToken) -> BoxFuture + Send>,
}

/// Cleanup hook run after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> BoxFuture + Send>;

/// Runs service processes until one fails or shutdown is requested, then
/// executes closers.
pub struct Runner {
    processes: Vec<ServiceProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Registers a process under a name used for logging.
    ///
    /// The process receives a child view of the runner's cancellation token
    /// and is expected to return once that token is cancelled.
    pub fn with_named_process<F, Fut>(mut self, name: &'static str, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.processes.push(ServiceProcess {
            name,
            start: Box::new(|token| Box::pin(process(token))),
        });
        self
    }

    /// Registers a cleanup hook. Closers run after every process has
    /// stopped, whether the stop was clean or not, and all of them run even
    /// if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Caps how long the closers may run. Defaults to 10 seconds.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Uses an externally-owned token, letting callers trigger shutdown
    /// without a signal.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Drives all processes to completion.
    ///
    /// Returns the first process error, if any, after closers have run. A
    /// shutdown signal produces `Ok(())`.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for process in self.processes {
            let child = token.child_token();
            let name = process.name;
            let start = process.start;
            join_set.spawn(async move {
                let result = start(child).await;
                (name, result)
            });
        }

        spawn_signal_listeners(token.clone());

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = name, "Process finished");
                }
                Ok((name, Err(err))) => {
                    error!(process = name, error = %format!("{err:#}"), "Process failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "Process panicked");
                    token.cancel();
                }
            }
        }

        if !self.closers.is_empty() {
            info!(timeout = ?self.closer_timeout, "Running closers");
            if tokio::time::timeout(self.closer_timeout, run_closers(self.closers))
                .await
                .is_err()
            {
                error!("Closers did not finish before the timeout");
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn spawn_signal_listeners(token: CancellationToken) {
    let interrupt_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, shutting down");
                interrupt_token.cancel();
            }
            Err(err) => {
                error!(error = %err, "Failed to install interrupt handler");
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, shutting down");
                token.cancel();
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
            }
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(joined) = closer_set.join_next().await {
        match joined {
            Ok(Ok(())) => debug!("Closer finished"),
            Ok(Err(err)) => error!(error = %format!("{err:#}"), "Closer failed"),
            Err(err) => error!(error = %err, "Closer panicked"),
        }
    }
}
