//! Unix socket front end of the coordinator.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::rpc::{self, ProtocolError, Request, Response};

use crate::core::MRCoordinator;

/// Bind the coordinator socket, replacing a stale socket file left behind
/// by an earlier run.
pub fn bind(path: &Path) -> io::Result<UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed stale socket {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    UnixListener::bind(path)
}

/// Accept connections until `shutdown` is cancelled.
///
/// Each connection gets its own task and may carry any number of calls.
pub async fn serve(
    listener: UnixListener,
    coordinator: Arc<MRCoordinator>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("coordinator server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!("failed to accept connection: {e}");
                        continue;
                    }
                };

                let coordinator = coordinator.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        result = handle_connection(stream, coordinator) => {
                            if let Err(e) = result {
                                debug!("connection dropped: {e}");
                            }
                        }
                    }
                });
            }
        }
    }
}

/// Serve `coordinator` until its job is done, then keep answering for
/// `linger` so workers still polling get `Shutdown`.
pub async fn serve_until_done(
    listener: UnixListener,
    coordinator: Arc<MRCoordinator>,
    done_poll: Duration,
    linger: Duration,
) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, coordinator.clone(), shutdown.clone()));

    let mut ticker = tokio::time::interval(done_poll.max(Duration::from_millis(1)));
    while !coordinator.is_done().await {
        ticker.tick().await;
    }

    info!("job over, answering stragglers for {linger:?}");
    tokio::time::sleep(linger).await;
    shutdown.cancel();
    server.await??;
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    coordinator: Arc<MRCoordinator>,
) -> Result<(), ProtocolError> {
    let mut conn = rpc::framed(stream);

    loop {
        let response = match rpc::recv_frame::<_, Request>(&mut conn).await {
            Ok(Some(request)) => coordinator.handle(request).await,
            Ok(None) => return Ok(()),
            // A frame that doesn't decode is a protocol violation, not a
            // reason to drop the peer.
            Err(e @ ProtocolError::Codec(_)) => {
                warn!("malformed request: {e}");
                Response::Error(e)
            }
            Err(e) => return Err(e),
        };

        rpc::send_frame(&mut conn, &response).await?;
    }
}
