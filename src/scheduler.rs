use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Callback run on every tick. Failures are logged, never fatal.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Runs a callback on a fixed period.
///
/// Each tick runs in its own task, so a failing or panicking callback is reported
/// and the next tick still fires. Must be started from within a Tokio runtime.
pub struct FixedInterval {
    name: String,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FixedInterval {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: Mutex::new(None),
        }
    }

    /// Start ticking every `period` after `initial_delay`.
    ///
    /// With `run_immediately` the first tick fires right after the delay, otherwise
    /// one `period` later. Returns `false` without touching the running timer when
    /// already started and `force` is unset; `force` replaces the running timer.
    pub fn start(
        &self,
        period: Duration,
        initial_delay: Duration,
        run_immediately: bool,
        callback: TickFn,
        force: bool,
    ) -> bool {
        let mut handle = self.handle.lock();
        if let Some(existing) = handle.as_ref() {
            if !existing.is_finished() && !force {
                return false;
            }
        }
        if let Some(existing) = handle.take() {
            existing.abort();
        }

        let name = self.name.clone();
        let period = period.max(Duration::from_millis(1));
        let first = if run_immediately {
            Instant::now() + initial_delay
        } else {
            Instant::now() + initial_delay + period
        };

        debug!(task = %name, ?period, ?initial_delay, run_immediately, "starting interval");
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match tokio::spawn((callback)()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(task = %name, error = %e, "scheduled task failed"),
                    Err(e) => error!(task = %name, error = %e, "scheduled task panicked"),
                }
            }
        }));
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            debug!(task = %self.name, "stopping interval");
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FixedInterval {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>) -> TickFn {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_periodically() {
        let counter = Arc::new(AtomicUsize::new(0));
        let interval = FixedInterval::new("test");
        assert!(interval.start(
            Duration::from_millis(20),
            Duration::ZERO,
            true,
            counting(counter.clone()),
            false,
        ));
        assert!(interval.is_running());

        tokio::time::sleep(Duration::from_millis(110)).await;
        interval.stop();
        let seen = counter.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected at least 3 ticks, saw {seen}");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
        assert!(!interval.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_one_period_without_run_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let interval = FixedInterval::new("test");
        interval.start(
            Duration::from_millis(300),
            Duration::ZERO,
            false,
            counting(counter.clone()),
            false,
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_unless_forced() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let interval = FixedInterval::new("test");

        assert!(interval.start(
            Duration::from_secs(3600),
            Duration::ZERO,
            false,
            counting(first.clone()),
            false,
        ));
        assert!(!interval.start(
            Duration::from_millis(10),
            Duration::ZERO,
            true,
            counting(second.clone()),
            false,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(second.load(Ordering::SeqCst), 0);

        assert!(interval.start(
            Duration::from_millis(10),
            Duration::ZERO,
            true,
            counting(second.clone()),
            true,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(second.load(Ordering::SeqCst) >= 1);
        assert_eq!(first.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tick_counter = counter.clone();
        let callback: TickFn = Arc::new(move || {
            let counter = tick_counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    anyhow::bail!("first tick fails");
                }
                if n == 1 {
                    panic!("second tick panics");
                }
                Ok(())
            }
            .boxed()
        });

        let interval = FixedInterval::new("flaky");
        interval.start(Duration::from_millis(15), Duration::ZERO, true, callback, false);
        tokio::time::sleep(Duration::from_millis(120)).await;
        interval.stop();

        assert!(counter.load(Ordering::SeqCst) >= 3);
    }
}
