//! Background anomaly scanning.
//!
//! One dedicated thread walks every store on a fixed cadence. Callers can
//! also request an immediate pass through [`ScannerHandle::trigger`]; pending
//! triggers coalesce into one pass. Failures are logged and retried with
//! bounded exponential backoff and never reach the caller.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use wgrid_ai::Anomaly;
use wgrid_core::{EngineResult, StoreId};

/// Something whose stores can be scanned.
pub trait ScanTarget: Send + Sync + 'static {
    fn store_ids(&self) -> EngineResult<Vec<StoreId>>;
    /// Scan one store, returning the anomalies newly recorded.
    fn scan(&self, store_id: &StoreId) -> EngineResult<Vec<Anomaly>>;
    /// Housekeeping run once after every pass, clean or not.
    fn maintain(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct AnomalyScanner {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for AnomalyScanner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for the running scanner (shutdown + trigger hook).
#[derive(Debug)]
pub struct ScannerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ScannerHandle {
    /// Request a pass as soon as possible. No-op if one is already pending.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the thread and wait for it.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl AnomalyScanner {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn spawn<T: ScanTarget>(&self, name: &'static str, target: Arc<T>) -> std::io::Result<ScannerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || scanner_loop(name, cfg, shutdown_rx, trigger_rx, target))?;

        Ok(ScannerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn scanner_loop<T: ScanTarget>(
    name: &'static str,
    cfg: AnomalyScanner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    target: Arc<T>,
) {
    info!(scanner = name, interval_ms = cfg.interval.as_millis() as u64, "anomaly scanner started");

    let interval = cfg.interval.max(Duration::from_millis(10));
    let mut next_tick = Instant::now() + interval;
    let mut pending = true; // first pass on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            while next_tick <= now {
                next_tick += interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(20));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(100));
            thread::sleep(sleep_for);
            continue;
        }
        pending = false;

        let clean = scan_all(name, target.as_ref());
        if let Err(e) = target.maintain() {
            warn!(scanner = name, error = %e, "maintenance after scan failed");
        }
        if clean {
            failures = 0;
            continue;
        }

        failures += 1;
        if failures <= cfg.max_retries {
            pending = true;
            backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
        } else {
            warn!(scanner = name, failures, "giving up until the next tick");
            failures = 0;
        }
    }

    info!(scanner = name, "anomaly scanner stopped");
}

/// One pass over every store. Returns whether every store scanned cleanly.
fn scan_all<T: ScanTarget>(name: &'static str, target: &T) -> bool {
    let stores = match target.store_ids() {
        Ok(s) => s,
        Err(e) => {
            warn!(scanner = name, error = %e, "failed to list stores");
            return false;
        }
    };

    let mut clean = true;
    for store in &stores {
        match target.scan(store) {
            Ok(recorded) if !recorded.is_empty() => {
                info!(scanner = name, store = %store, recorded = recorded.len(), "anomalies recorded");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(scanner = name, store = %store, error = %e, "store scan failed");
                clean = false;
            }
        }
    }
    clean
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wgrid_core::EngineError;

    #[derive(Default)]
    struct Counting {
        scans: AtomicUsize,
        fail_first: AtomicUsize,
        maintained: AtomicUsize,
    }

    impl ScanTarget for Counting {
        fn store_ids(&self) -> EngineResult<Vec<StoreId>> {
            Ok(vec![StoreId::new("andheri").unwrap(), StoreId::new("bandra").unwrap()])
        }

        fn scan(&self, _store_id: &StoreId) -> EngineResult<Vec<Anomaly>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(EngineError::conflict("busy"));
            }
            Ok(Vec::new())
        }

        fn maintain(&self) -> EngineResult<()> {
            self.maintained.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn scans_every_store_on_start_and_on_trigger() {
        let target = Arc::new(Counting::default());
        let scanner = AnomalyScanner::with_interval(Duration::from_secs(3600));
        let handle = scanner.spawn("test-scanner", target.clone()).unwrap();

        wait_for(|| target.scans.load(Ordering::SeqCst) >= 2);
        handle.trigger();
        wait_for(|| target.scans.load(Ordering::SeqCst) >= 4);
        wait_for(|| target.maintained.load(Ordering::SeqCst) >= 2);
        handle.shutdown();
    }

    #[test]
    fn failed_pass_is_retried() {
        let target = Arc::new(Counting::default());
        target.fail_first.store(1, Ordering::SeqCst);
        let scanner = AnomalyScanner {
            interval: Duration::from_secs(3600),
            max_retries: 3,
            base_backoff: Duration::from_millis(1),
        };
        let handle = scanner.spawn("retry-scanner", target.clone()).unwrap();

        // first pass: 2 scans (one failed), retry pass: 2 more
        wait_for(|| target.scans.load(Ordering::SeqCst) >= 4);
        handle.shutdown();
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff(base, 1), Duration::from_millis(250));
        assert_eq!(backoff(base, 3), Duration::from_millis(1000));
        assert_eq!(backoff(base, 30), Duration::from_secs(10));
    }
}
