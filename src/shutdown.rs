//! Lifecycle controller.
//!
//! Two things end a run: the configured maximum run time elapsing, or a
//! SIGINT (Ctrl+C) / SIGTERM / SIGHUP. Both cancel the same
//! [`tokio_util::sync::CancellationToken`] the scheduler watches. After a
//! signal the process gets a fixed grace period to unwind before it is
//! force-exited; a second signal force-exits at once.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status when the grace period after a signal runs out.
const GRACE_EXPIRED_EXIT_CODE: i32 = 1;
/// Exit status when a second signal arrives.
const FORCED_EXIT_CODE: i32 = 130;

/// Install signal handlers that cancel `token` on the first SIGINT /
/// SIGTERM / SIGHUP and terminate the process `grace` later, whether or not
/// the scheduler has finished unwinding. A second signal exits immediately.
pub(crate) fn install_signal_handler(token: CancellationToken, grace: Duration) -> std::io::Result<()> {
    // Register up front so a failure surfaces to the caller instead of
    // inside the listener task.
    #[cfg(unix)]
    let (mut sigterm, mut sighup) = {
        use tokio::signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::terminate())?,
            signal(SignalKind::hangup())?,
        )
    };

    tokio::spawn(async move {
        let mut received = 0u32;
        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                    _ = sighup.recv() => {}
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }
            }

            received += 1;
            on_signal(received, &token, grace, exit_process);
        }
    });

    Ok(())
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

/// React to the `received`-th shutdown signal. The first cancels `token`
/// and arms `exit(1)` for `grace` later; any further one calls `exit(130)`.
fn on_signal<E>(received: u32, token: &CancellationToken, grace: Duration, exit: E)
where
    E: Fn(i32) + Send + 'static,
{
    if received == 1 {
        tracing::info!("Received shutdown signal, finishing current updates...");
        tracing::info!("Press Ctrl+C again to force exit");
        token.cancel();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            tracing::warn!(
                "Still running {} after shutdown signal, exiting",
                humantime::format_duration(grace)
            );
            exit(GRACE_EXPIRED_EXIT_CODE);
        });
    } else {
        tracing::warn!("Force exit requested");
        exit(FORCED_EXIT_CODE);
    }
}

/// Cancel `token` once `limit` has elapsed. The task ends early, without
/// touching the token, if something else cancels it first.
pub(crate) fn spawn_run_deadline(token: CancellationToken, limit: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                tracing::info!(
                    "Maximum run time of {} reached",
                    humantime::format_duration(limit)
                );
                token.cancel();
            }
        }
    })
}
