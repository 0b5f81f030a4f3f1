use crate::service::ServiceDiscovery;
use anyhow::bail;
use chrono::Utc;
use pkg_mesh::MeshManager;
use pkg_metrics::{MetricsRegistry, names};
use pkg_types::config::DiscoveryOptions;
use pkg_types::endpoint::ServiceEndpoint;
use pkg_types::status::{LoopPhase, LoopStatus};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the polling schedule: sequences discover → probe → update on a
/// timer, retries failed ticks with exponential backoff, and never lets
/// two ticks run at once.
///
/// Cheap to clone; all clones share one scheduler.
#[derive(Clone)]
pub struct DiscoveryLoop {
    inner: Arc<LoopInner>,
}

struct LoopInner {
    discovery: ServiceDiscovery,
    mesh: Arc<MeshManager>,
    metrics: Arc<MetricsRegistry>,
    options: Mutex<DiscoveryOptions>,
    state: Mutex<LoopState>,
    /// Serializes tick execution between the scheduler task and
    /// `force_discovery`.
    tick_lock: tokio::sync::Mutex<()>,
    last_endpoints: Mutex<Vec<ServiceEndpoint>>,
}

struct LoopState {
    phase: LoopPhase,
    retry_count: u32,
    last_successful_run: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    /// The single pending timer. Every scheduling path cancels it before
    /// arming a new one; a timer that has started its tick is no longer
    /// here, so cancellation never preempts in-flight work.
    pending: Option<JoinHandle<()>>,
}

impl DiscoveryLoop {
    pub fn new(
        discovery: ServiceDiscovery,
        mesh: Arc<MeshManager>,
        metrics: Arc<MetricsRegistry>,
        options: DiscoveryOptions,
    ) -> anyhow::Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(LoopInner {
                discovery,
                mesh,
                metrics,
                options: Mutex::new(options),
                state: Mutex::new(LoopState {
                    phase: LoopPhase::Stopped,
                    retry_count: 0,
                    last_successful_run: None,
                    last_error: None,
                    pending: None,
                }),
                tick_lock: tokio::sync::Mutex::new(()),
                last_endpoints: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Start polling. Runs one tick immediately, then settles into the
    /// configured cadence. Calling `start` on a running loop is a no-op.
    pub fn start(&self) {
        let interval = {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase != LoopPhase::Stopped {
                debug!("Discovery loop already running");
                return;
            }
            state.retry_count = 0;
            state.phase = LoopPhase::Idle;
            self.inner.options.lock().unwrap().interval
        };
        info!("Discovery loop started (interval={:?})", interval);
        LoopInner::schedule(&self.inner, Duration::ZERO);
    }

    /// Stop polling: cancel the pending timer and release the mesh
    /// manager's resources. A tick already in flight finishes its I/O but
    /// schedules no further work. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase == LoopPhase::Stopped {
                debug!("Discovery loop already stopped");
                return;
            }
            state.phase = LoopPhase::Stopped;
            if let Some(timer) = state.pending.take() {
                timer.abort();
            }
        }
        self.inner.mesh.cleanup();
        info!("Discovery loop stopped");
    }

    /// Run a tick right now, outside the schedule. The regular cadence
    /// resumes afterwards; a failed forced run restores the retry counter
    /// it found, so manual runs do not corrupt retry bookkeeping.
    pub async fn force_discovery(&self) -> anyhow::Result<bool> {
        let saved_retry_count = {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase == LoopPhase::Stopped {
                bail!("discovery loop is not running");
            }
            if let Some(timer) = state.pending.take() {
                timer.abort();
            }
            let saved = state.retry_count;
            state.retry_count = 0;
            state.phase = LoopPhase::Ticking;
            saved
        };

        info!("Forced discovery run");
        let result = self.inner.run_tick().await;
        let interval = self.inner.options.lock().unwrap().interval;

        {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase == LoopPhase::Stopped {
                return result;
            }
            match &result {
                Ok(_) => {
                    state.retry_count = 0;
                    state.last_successful_run = Some(Utc::now());
                    state.last_error = None;
                }
                Err(e) => {
                    state.retry_count = saved_retry_count;
                    state.last_error = Some(e.to_string());
                }
            }
            state.phase = LoopPhase::Idle;
        }
        LoopInner::schedule(&self.inner, interval);
        result
    }

    /// Replace the loop's options. Validation failures surface here,
    /// synchronously — never inside the loop. If a timer is pending it is
    /// rescheduled with the new interval; a tick already in progress is
    /// not interrupted.
    pub fn update_config(&self, new_options: DiscoveryOptions) -> anyhow::Result<()> {
        new_options.validate()?;
        let interval = new_options.interval;
        *self.inner.options.lock().unwrap() = new_options;

        let reschedule = {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase == LoopPhase::Stopped {
                false
            } else if let Some(timer) = state.pending.take() {
                timer.abort();
                true
            } else {
                false
            }
        };
        if reschedule {
            info!("Discovery options updated; next tick in {:?}", interval);
            LoopInner::schedule(&self.inner, interval);
        } else {
            info!("Discovery options updated");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().unwrap().phase != LoopPhase::Stopped
    }

    pub fn status(&self) -> LoopStatus {
        let state = self.inner.state.lock().unwrap();
        LoopStatus {
            phase: state.phase,
            retry_count: state.retry_count,
            last_successful_run: state.last_successful_run,
            last_error: state.last_error.clone(),
            interval_ms: self.inner.options.lock().unwrap().interval.as_millis() as u64,
        }
    }

    pub fn options(&self) -> DiscoveryOptions {
        self.inner.options.lock().unwrap().clone()
    }

    /// Endpoints seen by the most recent completed tick.
    pub fn last_endpoints(&self) -> Vec<ServiceEndpoint> {
        self.inner.last_endpoints.lock().unwrap().clone()
    }
}

impl LoopInner {
    /// Arm the single pending timer, cancelling any existing one.
    fn schedule(inner: &Arc<LoopInner>, delay: Duration) {
        let mut state = inner.state.lock().unwrap();
        if state.phase == LoopPhase::Stopped {
            return;
        }
        if let Some(timer) = state.pending.take() {
            timer.abort();
        }
        let task_inner = inner.clone();
        state.pending = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            LoopInner::run_scheduled(task_inner).await;
        }));
    }

    /// Body of the timer task: run one tick, then decide what to schedule
    /// next (regular cadence, backoff retry, or nothing if stopped).
    async fn run_scheduled(inner: Arc<LoopInner>) {
        {
            let mut state = inner.state.lock().unwrap();
            if state.phase == LoopPhase::Stopped {
                return;
            }
            // Past the cancellable window: the timer has fired.
            state.pending = None;
            state.phase = LoopPhase::Ticking;
        }

        let result = inner.run_tick().await;
        let (interval, retry_delay, max_retries) = {
            let options = inner.options.lock().unwrap();
            (options.interval, options.retry_delay, options.max_retries)
        };

        let next_delay = {
            let mut state = inner.state.lock().unwrap();
            if state.phase == LoopPhase::Stopped {
                return;
            }
            match result {
                Ok(_) => {
                    state.retry_count = 0;
                    state.last_successful_run = Some(Utc::now());
                    state.last_error = None;
                    state.phase = LoopPhase::Idle;
                    interval
                }
                Err(e) => {
                    state.retry_count += 1;
                    state.last_error = Some(e.to_string());
                    if state.retry_count <= max_retries {
                        let delay = backoff_delay(retry_delay, state.retry_count);
                        warn!(
                            "Discovery tick failed (retry {}/{}), backing off {:?}: {}",
                            state.retry_count, max_retries, delay, e
                        );
                        state.phase = LoopPhase::RetryBackoff;
                        delay
                    } else {
                        warn!(
                            "Discovery tick failed after {} retries, resuming normal cadence: {}",
                            max_retries, e
                        );
                        state.retry_count = 0;
                        state.phase = LoopPhase::Idle;
                        interval
                    }
                }
            }
        };
        LoopInner::schedule(&inner, next_delay);
    }

    /// One full discover → probe → update pass. Returns whether the mesh
    /// configuration changed.
    async fn run_tick(&self) -> anyhow::Result<bool> {
        let _tick = self.tick_lock.lock().await;
        let started = Instant::now();
        let result = self.tick_body().await;
        self.metrics.set(
            names::LAST_TICK_DURATION_MS,
            started.elapsed().as_millis() as i64,
        );
        if result.is_err() {
            self.metrics.inc(names::DISCOVERY_FAILURES);
        }
        result
    }

    async fn tick_body(&self) -> anyhow::Result<bool> {
        let selector = self.options.lock().unwrap().selector.clone();
        debug!("Running service discovery (selector={})", selector);

        let services = self.discovery.discover_all_services(&selector).await?;
        let probed = self.discovery.probe_openapi_endpoints(services).await;

        let with_spec = probed.iter().filter(|s| s.has_openapi).count();
        self.metrics.set(names::SERVICES_DISCOVERED, probed.len() as i64);
        self.metrics.set(names::SERVICES_WITH_OPENAPI, with_spec as i64);
        *self.last_endpoints.lock().unwrap() = probed.clone();

        let changed = self.mesh.update_configuration(&probed).await?;
        if changed {
            self.metrics.inc(names::CONFIG_UPDATES);
        }
        self.metrics.inc(names::DISCOVERY_TICKS);
        info!(
            "Discovery tick complete: {} services, {} with specs, changed={}",
            probed.len(),
            with_spec,
            changed
        );
        Ok(changed)
    }
}

/// Delay before retry `retry_count` (1-based): `base * 2^(retry_count-1)`.
fn backoff_delay(base: Duration, retry_count: u32) -> Duration {
    base * 2u32.saturating_pow(retry_count.saturating_sub(1))
}
