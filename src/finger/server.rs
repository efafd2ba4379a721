//! Finger TCP listener

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::FingerHandler;
use crate::error::AppError;
use crate::metrics::{FINGER_CONNECTIONS_ACTIVE, FINGER_CONNECTIONS_TOTAL};
use crate::tasks::TaskScope;

/// Pause after a failed `accept`, e.g. when file descriptors run out
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Running Finger listener
///
/// Every accepted connection is handled on its own task in the server's
/// `TaskScope`; the accept loop never waits for them.
pub struct FingerServer {
    local_addr: SocketAddr,
    scope: TaskScope,
    join_handle: JoinHandle<()>,
}

impl FingerServer {
    /// Bind `addr` and start accepting connections
    ///
    /// # Errors
    /// Returns `AppError::Io` if the port cannot be bound
    pub async fn bind(addr: &str, handler: FingerHandler, scope: TaskScope) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "Finger server listening");

        let join_handle = tokio::spawn(accept_loop(listener, handler, scope.clone()));

        Ok(Self {
            local_addr,
            scope,
            join_handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for in-flight connections
    pub async fn shutdown(self) {
        tracing::info!("Shutting down Finger server");
        self.scope.shutdown().await;
        if let Err(e) = self.join_handle.await {
            tracing::error!(error = %e, "Finger accept loop panicked");
        }
    }
}

async fn accept_loop(listener: TcpListener, handler: FingerHandler, scope: TaskScope) {
    loop {
        tokio::select! {
            _ = scope.cancelled() => {
                tracing::debug!("Finger accept loop stopped");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept Finger connection");
                        if back_off(&scope).await {
                            continue;
                        }
                        break;
                    }
                };

                FINGER_CONNECTIONS_TOTAL.inc();
                FINGER_CONNECTIONS_ACTIVE.inc();
                tracing::debug!(%peer, "Accepted Finger connection");

                let handler = handler.clone();
                let task_scope = scope.clone();
                scope.spawn(
                    async move {
                        handler.handle(stream, &task_scope).await;
                        FINGER_CONNECTIONS_ACTIVE.dec();
                    }
                    .instrument(tracing::info_span!("finger", %peer)),
                );
            }
        }
    }
}

/// Sleep for `ACCEPT_ERROR_BACKOFF`; false if the scope was cancelled first
async fn back_off(scope: &TaskScope) -> bool {
    tokio::select! {
        _ = scope.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
    }
}
