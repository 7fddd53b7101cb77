//! Interval loop driving report refreshes until cancelled.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Run `tick` once immediately, then once per `interval`, until `shutdown`
/// is cancelled.
///
/// Each tick is spawned on `tracker` rather than awaited, so a slow refresh
/// does not delay the next one and ticks may overlap. Cancellation is only
/// observed between ticks: in-flight ticks keep running, and the caller
/// decides how long to wait for them via the tracker.
///
/// `interval` must be non-zero.
pub async fn run<F, Fut>(
    interval: Duration,
    shutdown: CancellationToken,
    tracker: &TaskTracker,
    tick: F,
) where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    tracing::info!(
        "Update interval is: {}",
        humantime::format_duration(interval)
    );

    let mut n = 0u64;
    spawn_tick(tracker, n, &tick);

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!(in_flight = tracker.len(), "Stopping...");
                return;
            }
            _ = ticker.tick() => {
                n += 1;
                if !tracker.is_empty() {
                    tracing::debug!(in_flight = tracker.len(), "Previous update still running");
                }
                spawn_tick(tracker, n, &tick);
            }
        }
    }
}

fn spawn_tick<F, Fut>(tracker: &TaskTracker, n: u64, tick: &F)
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    tracker.spawn(tick(n).instrument(tracing::info_span!("tick", n)));
}
