use std::future::{Future, pending};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::Receiver;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::EvalError;
use crate::input::Input;

/// One `repeat` loop: ticks at a fixed period until the deadline passes, the
/// cancellation channel yields, or the stop token is cancelled.
///
/// The action runs inline on each tick, so two evaluations never overlap; when
/// one outlasts the period the following ticks are delayed, not doubled up.
#[derive(Debug)]
pub struct RepeatSession {
    period: Duration,
    deadline: Option<Duration>,
    cancel: Option<Receiver<Input>>,
    stop: Option<CancellationToken>,
}

impl RepeatSession {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
            cancel: None,
            stop: None,
        }
    }

    /// End the loop once `after` has elapsed since `run` started.
    pub fn with_deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(after);
        self
    }

    /// End the loop on the first message (or the channel closing).
    pub fn with_cancel(mut self, rx: Receiver<Input>) -> Self {
        self.cancel = Some(rx);
        self
    }

    /// End the loop when `token` is cancelled.
    pub fn with_stop(mut self, token: CancellationToken) -> Self {
        self.stop = Some(token);
        self
    }

    /// Tick until a terminating condition; returns the number of completed ticks.
    ///
    /// The first tick fires one period after the start. A failing `on_tick`
    /// ends the loop with its error.
    pub async fn run<F, Fut>(mut self, mut on_tick: F) -> Result<u64, EvalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, EvalError>>,
    {
        let start = Instant::now();
        let deadline = self.deadline.map(|after| start + after);
        let stop = self.stop.take().unwrap_or_else(CancellationToken::new);

        // `interval_at` panics on a zero period; parsed frequencies never produce
        // one, but `new` takes any duration.
        let period = self.period.max(Duration::from_nanos(1));
        let mut ticker = time::interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    trace!(target: "keyweave::repeat", ticks, "Stopped");
                    break;
                }
                _ = cancelled(&mut self.cancel) => {
                    trace!(target: "keyweave::repeat", ticks, "Cancelled by trigger");
                    break;
                }
                _ = expired(deadline) => {
                    trace!(target: "keyweave::repeat", ticks, "Deadline reached");
                    break;
                }
                _ = ticker.tick() => {
                    on_tick().await?;
                    ticks += 1;
                }
            }
        }
        Ok(ticks)
    }
}

async fn cancelled(rx: &mut Option<Receiver<Input>>) {
    match rx {
        Some(rx) => {
            rx.recv().await;
        }
        None => pending().await,
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Flag, vk};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tokio::sync::mpsc;

    fn ok() -> std::future::Ready<Result<Value, EvalError>> {
        std::future::ready(Ok(Value::Null))
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_ticks() {
        let start = Instant::now();
        let ticks = RepeatSession::new(Duration::from_millis(20))
            .with_deadline(Duration::from_millis(100))
            .run(ok)
            .await
            .unwrap();
        // 20, 40, 60, 80; the tick due at 100 loses to the deadline
        assert_eq!(ticks, 4);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_rate_short_window() {
        let ticks = RepeatSession::new(Duration::from_millis(100))
            .with_deadline(Duration::from_millis(100))
            .run(ok)
            .await
            .unwrap();
        assert_eq!(ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_channel_stops_loop() {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(55)).await;
            let _ = tx.send(Input::new(vk::ESC, Flag::KeyDown)).await;
        });

        let ticks = RepeatSession::new(Duration::from_millis(20))
            .with_cancel(rx)
            .run(ok)
            .await
            .unwrap();
        assert_eq!(ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_token_stops_loop() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(45)).await;
            trigger.cancel();
        });

        let ticks = RepeatSession::new(Duration::from_millis(10))
            .with_stop(token)
            .run(ok)
            .await
            .unwrap();
        assert_eq!(ticks, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_action_never_overlaps() {
        let busy = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicU64::new(0));

        let ticks = RepeatSession::new(Duration::from_millis(20))
            .with_deadline(Duration::from_millis(100))
            .run(|| {
                let busy = Arc::clone(&busy);
                let count = Arc::clone(&count);
                async move {
                    assert!(!busy.swap(true, Ordering::SeqCst), "ticks overlapped");
                    time::sleep(Duration::from_millis(30)).await;
                    busy.store(false, Ordering::SeqCst);
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            })
            .await
            .unwrap();

        assert_eq!(ticks, count.load(Ordering::SeqCst));
        assert!((2..=4).contains(&ticks), "ticks = {ticks}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_still_ticks() {
        let ticks = RepeatSession::new(Duration::ZERO)
            .with_deadline(Duration::from_millis(50))
            .run(|| async {
                time::sleep(Duration::from_millis(1)).await;
                Ok(Value::Null)
            })
            .await
            .unwrap();
        assert!(ticks > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_error_ends_loop() {
        let err = RepeatSession::new(Duration::from_millis(10))
            .with_deadline(Duration::from_secs(1))
            .run(|| {
                std::future::ready(Err(EvalError::Include {
                    path: "x.json".into(),
                    reason: "gone".into(),
                }))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Include { .. }));
    }
}
