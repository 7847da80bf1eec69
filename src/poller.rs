use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Run `tick` every `period`, the first time immediately, until `shutdown`
/// flips to `true` or its sender is dropped. A tick that overruns the
/// period delays the next one instead of bursting.
pub fn spawn_poller<F, Fut>(
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Poller shutdown sender dropped");
                        break;
                    }
                }
            }
        }
        tracing::debug!("Poller stopped");
    })
}
