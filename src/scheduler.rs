use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use u50_protocol::Probe;

use crate::error::{Result, TelemetryError};
use crate::snapshot::Snapshot;
use crate::webhook::{Dispatch, FieldMap, build_payload};

/// Shortest accepted loop interval, in seconds.
pub const MIN_INTERVAL_SECS: f64 = 1.0;

type SharedProbe = Arc<Mutex<Probe>>;
type Latest = Option<Arc<Snapshot>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Collection,
    Webhook,
}

impl LoopKind {
    /// Interval used when the configured text stops parsing mid-run.
    pub fn default_interval(self) -> Duration {
        match self {
            LoopKind::Collection => Duration::from_secs(5),
            LoopKind::Webhook => Duration::from_secs(30),
        }
    }
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::Collection => f.write_str("collection"),
            LoopKind::Webhook => f.write_str("webhook"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => f.write_str("idle"),
            LoopState::Running => f.write_str("running"),
        }
    }
}

/// Parse an interval in seconds. Must be a finite number >= 1.
pub fn parse_interval(text: &str) -> Result<Duration> {
    let invalid = || TelemetryError::InvalidInterval(text.to_string());
    let secs: f64 = text.trim().parse().map_err(|_| invalid())?;
    if !secs.is_finite() || secs < MIN_INTERVAL_SECS {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Bookkeeping locks recover from poisoning; their contents stay consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LoopHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner<D> {
    link: watch::Sender<Option<SharedProbe>>,
    snapshot: watch::Sender<Latest>,
    intervals: Mutex<HashMap<LoopKind, String>>,
    field_map: RwLock<FieldMap>,
    loops: Mutex<HashMap<LoopKind, LoopHandle>>,
    dispatcher: D,
}

impl<D> Inner<D> {
    fn is_connected(&self) -> bool {
        self.link.borrow().is_some()
    }

    fn state(&self, kind: LoopKind) -> LoopState {
        let loops = lock(&self.loops);
        match loops.get(&kind) {
            Some(handle)
                if !handle.task.is_finished() && !*handle.cancel.borrow() && self.is_connected() =>
            {
                LoopState::Running
            }
            _ => LoopState::Idle,
        }
    }

    fn interval(&self, kind: LoopKind) -> Duration {
        let text = lock(&self.intervals).get(&kind).cloned().unwrap_or_default();
        parse_interval(&text).unwrap_or_else(|e| {
            let fallback = kind.default_interval();
            warn!("{kind} loop: {e}, using {fallback:?}");
            fallback
        })
    }

    fn field_map(&self) -> FieldMap {
        self.field_map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One request/decode on the blocking pool, published as the latest snapshot.
async fn collect<D>(inner: &Inner<D>) -> Result<Arc<Snapshot>> {
    let probe = inner
        .link
        .borrow()
        .clone()
        .ok_or(TelemetryError::NotConnected)?;

    let (reading, values) = tokio::task::spawn_blocking(move || {
        let mut probe = probe
            .lock()
            .map_err(|_| TelemetryError::Task("probe mutex poisoned".into()))?;
        probe.read_reading().map_err(TelemetryError::from)
    })
    .await
    .map_err(|e| TelemetryError::Task(e.to_string()))??;

    info!("received {} values from {}", values.len(), reading.site_name);
    let snapshot = Arc::new(Snapshot::new(reading, values));
    inner.snapshot.send_replace(Some(snapshot.clone()));
    Ok(snapshot)
}

/// Send the latest snapshot through the dispatcher.
async fn dispatch_latest<D: Dispatch>(inner: &Inner<D>) -> Result<()> {
    let snapshot = inner
        .snapshot
        .borrow()
        .clone()
        .filter(|s| s.has_values())
        .ok_or(TelemetryError::NoData)?;
    let payload = build_payload(&inner.field_map(), &snapshot.values);
    inner.dispatcher.dispatch(&payload).await
}

async fn webhook_tick<D: Dispatch>(inner: &Inner<D>) {
    if inner.state(LoopKind::Collection) == LoopState::Idle
        && let Err(e) = collect(inner).await
    {
        error!("error requesting data: {e}");
    }

    match dispatch_latest(inner).await {
        Ok(()) => {}
        Err(TelemetryError::NoData) => debug!("no data to send"),
        Err(e) => error!("error sending webhook: {e}"),
    }
}

async fn run_loop<D: Dispatch>(
    inner: Arc<Inner<D>>,
    kind: LoopKind,
    mut cancel: watch::Receiver<bool>,
) {
    let mut link = inner.link.subscribe();

    loop {
        if *cancel.borrow() || link.borrow().is_none() {
            break;
        }

        match kind {
            LoopKind::Collection => {
                if let Err(e) = collect(&inner).await {
                    error!("error requesting data: {e}");
                }
            }
            LoopKind::Webhook => webhook_tick(&inner).await,
        }

        let interval = inner.interval(kind);
        debug!("{kind} loop sleeping {interval:?}");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.changed() => {}
            _ = link.changed() => {}
        }
    }

    info!("{kind} loop stopped");
}

/// Owns the probe link, the two loops and the latest published reading.
///
/// Each loop is a tokio task. Serial exchanges run on the blocking pool with
/// the probe behind a mutex, so the two loops never interleave on the wire.
/// Readings reach consumers as immutable [`Snapshot`]s through a watch channel.
pub struct Scheduler<D: Dispatch> {
    inner: Arc<Inner<D>>,
}

impl<D: Dispatch> Scheduler<D> {
    pub fn new(dispatcher: D) -> Self {
        let intervals = [LoopKind::Collection, LoopKind::Webhook]
            .into_iter()
            .map(|kind| (kind, kind.default_interval().as_secs().to_string()))
            .collect();

        Self {
            inner: Arc::new(Inner {
                link: watch::Sender::new(None),
                snapshot: watch::Sender::new(None),
                intervals: Mutex::new(intervals),
                field_map: RwLock::new(FieldMap::default()),
                loops: Mutex::new(HashMap::new()),
                dispatcher,
            }),
        }
    }

    pub fn connect(&self, probe: Probe) {
        self.inner
            .link
            .send_replace(Some(Arc::new(Mutex::new(probe))));
        info!("probe connected");
    }

    /// Stop both loops and release the probe once any in-flight exchange finishes.
    pub fn disconnect(&self) {
        self.stop(LoopKind::Collection);
        self.stop(LoopKind::Webhook);
        if self.inner.link.send_replace(None).is_some() {
            info!("probe disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Store the interval text for `kind`. It is validated when the loop
    /// starts and re-read after every iteration.
    pub fn set_interval(&self, kind: LoopKind, text: impl Into<String>) {
        lock(&self.inner.intervals).insert(kind, text.into());
    }

    pub fn interval_text(&self, kind: LoopKind) -> String {
        lock(&self.inner.intervals)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_field_map(&self, map: FieldMap) {
        *self
            .inner
            .field_map
            .write()
            .unwrap_or_else(PoisonError::into_inner) = map;
    }

    pub fn field_map(&self) -> FieldMap {
        self.inner.field_map()
    }

    pub fn state(&self, kind: LoopKind) -> LoopState {
        self.inner.state(kind)
    }

    /// Start `kind`. Must be called from within a tokio runtime.
    ///
    /// Refused while disconnected or when the interval text is invalid.
    pub fn start(&self, kind: LoopKind) -> Result<()> {
        if self.state(kind) == LoopState::Running {
            return Ok(());
        }
        if !self.is_connected() {
            return Err(TelemetryError::NotConnected);
        }
        let interval = parse_interval(&self.interval_text(kind))?;

        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.inner.clone(), kind, cancel_rx));
        lock(&self.inner.loops).insert(kind, LoopHandle { cancel, task });

        info!("started {kind} loop every {interval:?}");
        Ok(())
    }

    /// Ask `kind` to stop. An exchange already in flight still completes.
    pub fn stop(&self, kind: LoopKind) {
        if let Some(handle) = lock(&self.inner.loops).remove(&kind) {
            handle.cancel.send_replace(true);
            info!("{kind} loop stopping");
        }
    }

    /// Flip `kind` between idle and running; returns the new state.
    pub fn toggle(&self, kind: LoopKind) -> Result<LoopState> {
        match self.state(kind) {
            LoopState::Running => {
                self.stop(kind);
                Ok(LoopState::Idle)
            }
            LoopState::Idle => {
                self.start(kind)?;
                Ok(LoopState::Running)
            }
        }
    }

    /// One request/decode outside the loops.
    pub async fn request_now(&self) -> Result<Arc<Snapshot>> {
        collect(&self.inner).await
    }

    /// Send the latest snapshot once. [`TelemetryError::NoData`] if it has no values.
    pub async fn send_now(&self) -> Result<()> {
        dispatch_latest(&self.inner).await
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Latest> {
        self.inner.snapshot.subscribe()
    }
}

impl<D: Dispatch> Drop for Scheduler<D> {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.inner.loops).drain() {
            handle.cancel.send_replace(true);
        }
    }
}
