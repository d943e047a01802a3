//! # Session Facade
//!
//! [`Session`] owns one logical connection to the node network:
//!
//! 1. `connect` validates configuration, starts the I/O runtime, dials the
//!    transport and spawns the dispatch worker.
//! 2. Inbound heartbeats and payloads are routed to the registered handlers
//!    on the worker thread (see [`crate::dispatch`]).
//! 3. Callers query peers, log, sleep, and finally `close`.
//!
//! The API is blocking. Create and close sessions outside of async contexts
//! (use `spawn_blocking` from async code).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{FilterSpec, SessionConfig, SessionFilters};
use crate::dispatch::{pump, run_dispatcher, DispatchCounters, DispatchStats};
use crate::error::{SessionError, SessionResult};
use crate::events::{HeartbeatData, Payload};
use crate::handlers::SessionHandlers;
use crate::identity::{AddressIdentity, StaticIdentity};
use crate::network::NetworkReport;
use crate::tracker::PeerTracker;
use crate::transport::{NetworkTransport, TcpJsonTransport};

/// How long `close` waits for runtime tasks to wind down.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Handle to a live session.
///
/// Cheap to clone; all clones refer to the same session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) id: Uuid,
    pub(crate) config: SessionConfig,
    pub(crate) filters: SessionFilters,
    pub(crate) handlers: SessionHandlers,
    pub(crate) identity: Arc<dyn AddressIdentity>,
    pub(crate) endpoint: String,
    pub(crate) tracker: Arc<PeerTracker>,
    pub(crate) counters: DispatchCounters,
    /// Handlers run under the read side; `close` takes the write side.
    pub(crate) drain: RwLock<()>,
    pub(crate) dispatch_thread_id: OnceLock<ThreadId>,
    accepting: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    runtime: Mutex<Option<Runtime>>,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    fn on_dispatch_thread(&self) -> bool {
        self.dispatch_thread_id.get() == Some(&thread::current().id())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            debug!(session_id = %self.id, "Session dropped without close, releasing resources");
        }
        let _ = self.shutdown_tx.send(true);
        self.tracker.close();
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl Session {
    /// Start building a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Connect with configuration only (no handlers, TCP transport).
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        Self::builder().config(config).connect()
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    /// Session identifier, used to correlate log records.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Configuration the session was built with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Normalized filters.
    #[must_use]
    pub fn filters(&self) -> &SessionFilters {
        &self.inner.filters
    }

    /// Identity collaborator used for whitelist checks.
    #[must_use]
    pub fn identity(&self) -> &dyn AddressIdentity {
        self.inner.identity.as_ref()
    }

    /// Transport endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.inner.is_accepting()
    }

    /// Whether the network link is still up.
    ///
    /// Turns false when the transport ends on its own; `close` does not
    /// change it.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.tracker.is_connected()
    }

    /// Dispatch counters so far.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.inner.counters.snapshot(self.inner.tracker.updates())
    }

    /// Known peers, waiting up to the configured network timeout for the
    /// first snapshot.
    ///
    /// With `online_only`, peers whose status tag is not the online sentinel
    /// are excluded.
    pub fn get_network_known_nodes(&self, online_only: bool) -> SessionResult<NetworkReport> {
        self.get_network_known_nodes_within(online_only, self.inner.config.network_timeout())
    }

    /// Known peers, waiting up to `timeout` for the first snapshot.
    ///
    /// Fails with `Connection` once the network link has dropped, even if a
    /// snapshot was received before.
    pub fn get_network_known_nodes_within(
        &self,
        online_only: bool,
        timeout: Duration,
    ) -> SessionResult<NetworkReport> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let snapshot = self.inner.tracker.wait(timeout).inspect_err(|e| match e {
            SessionError::Timeout(_) => {
                warn!(session_id = %self.inner.id, ?timeout, "No network snapshot received");
            }
            SessionError::Connection(reason) => {
                warn!(session_id = %self.inner.id, %reason, "Network link is down");
            }
            _ => {}
        })?;

        let report = NetworkReport::from_snapshot(&snapshot, self.identity(), online_only);
        if !self.inner.config.silent {
            info!(
                session_id = %self.inner.id,
                reporter = %report.reporter,
                nodes = report.len(),
                online_only,
                "Network snapshot ready"
            );
        }
        Ok(report)
    }

    /// Block the caller; dispatch continues on the worker thread.
    pub fn sleep(&self, duration: Duration) {
        debug!(session_id = %self.inner.id, ?duration, "Caller sleeping");
        thread::sleep(duration);
    }

    /// Emit an operator-visible message.
    pub fn log(&self, message: impl fmt::Display) {
        info!(target: "node_session::operator", session_id = %self.inner.id, "{message}");
    }

    /// Emit an operator-visible message with a color hint for the console.
    pub fn log_colored(&self, message: impl fmt::Display, color: &str) {
        info!(
            target: "node_session::operator",
            session_id = %self.inner.id,
            color,
            "{message}"
        );
    }

    /// Stop dispatch and release connection resources.
    ///
    /// Idempotent. Once this returns no handler is invoked again. Safe to
    /// call from inside a handler: the current handler finishes and nothing
    /// runs after it.
    pub fn close(&self) {
        let inner = &self.inner;
        let first = inner.accepting.swap(false, Ordering::SeqCst);
        let on_dispatch_thread = inner.on_dispatch_thread();

        if first {
            if !inner.config.silent {
                info!(session_id = %inner.id, endpoint = %inner.endpoint, "Closing session");
            }
            let _ = inner.shutdown_tx.send(true);
            inner.tracker.close();
        }

        if !on_dispatch_thread {
            // Wait out the handler in flight, if any.
            drop(inner.drain.write());
        }

        if !first {
            return;
        }

        let runtime = inner.runtime.lock().take();
        if let Some(runtime) = runtime {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
            }
        }

        let worker = inner.dispatch_thread.lock().take();
        if let Some(worker) = worker {
            if !on_dispatch_thread && worker.join().is_err() {
                error!(session_id = %inner.id, "Dispatch worker panicked");
            }
        }

        if !inner.config.silent {
            info!(session_id = %inner.id, stats = ?self.stats(), "Session closed");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint)
            .field("closed", &self.is_closed())
            .field("handlers", &self.inner.handlers)
            .finish()
    }
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    handlers: SessionHandlers,
    transport: Option<Arc<dyn NetworkTransport>>,
    identity: Option<Arc<dyn AddressIdentity>>,
}

impl SessionBuilder {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Suppress internal informational logging.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.config.silent = silent;
        self
    }

    /// Accept events only from these nodes.
    #[must_use]
    pub fn node_filter(mut self, filter: impl Into<FilterSpec>) -> Self {
        self.config.filters.node = Some(filter.into());
        self
    }

    /// Accept payloads only from these pipelines.
    #[must_use]
    pub fn pipeline_filter(mut self, filter: impl Into<FilterSpec>) -> Self {
        self.config.filters.pipeline = Some(filter.into());
        self
    }

    /// Accept payloads only from these plugin signatures.
    #[must_use]
    pub fn plugin_filter(mut self, filter: impl Into<FilterSpec>) -> Self {
        self.config.filters.plugin = Some(filter.into());
        self
    }

    /// Register the heartbeat handler.
    #[must_use]
    pub fn on_heartbeat<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Session, &str, &HeartbeatData) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.on_heartbeat = Some(Arc::new(handler));
        self
    }

    /// Register the payload handler.
    #[must_use]
    pub fn on_payload<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Session, &str, &str, &str, &str, &Payload) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.on_payload = Some(Arc::new(handler));
        self
    }

    /// Use a specific transport instead of TCP to the configured endpoint.
    #[must_use]
    pub fn transport(mut self, transport: impl NetworkTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a specific identity instead of the configured address.
    #[must_use]
    pub fn identity(mut self, identity: impl AddressIdentity + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    /// Validate configuration, establish connectivity and start dispatch.
    ///
    /// # Errors
    ///
    /// - `Configuration` for missing or malformed options, or when called
    ///   from inside an async runtime
    /// - `Connection` when the network cannot be reached
    pub fn connect(self) -> SessionResult<Session> {
        let Self {
            config,
            handlers,
            transport,
            identity,
        } = self;

        let filters = config.validate()?;
        if Handle::try_current().is_ok() {
            return Err(SessionError::config(
                "sessions are blocking; connect from outside the async runtime",
            ));
        }

        let transport =
            transport.unwrap_or_else(|| Arc::new(TcpJsonTransport::from_config(&config)));
        let identity: Arc<dyn AddressIdentity> = identity.unwrap_or_else(|| {
            Arc::new(
                config
                    .address
                    .clone()
                    .map_or_else(StaticIdentity::anonymous, StaticIdentity::new),
            )
        });
        let id = Uuid::new_v4();
        let endpoint = transport.endpoint();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads)
            .thread_name("node-session-io")
            .enable_all()
            .build()
            .map_err(|e| SessionError::Connection(format!("cannot start I/O runtime: {e}")))?;

        let inbound = runtime.block_on(transport.connect()).inspect_err(|e| {
            warn!(session_id = %id, endpoint = %endpoint, error = %e, "Connect failed");
        })?;

        let (queue_tx, queue_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tracker = Arc::new(PeerTracker::new());
        runtime.spawn(pump(
            inbound,
            queue_tx,
            Arc::clone(&tracker),
            shutdown_rx,
            endpoint.clone(),
        ));

        let silent = config.silent;
        let inner = Arc::new(SessionInner {
            id,
            config,
            filters,
            handlers,
            identity,
            endpoint,
            tracker,
            counters: DispatchCounters::default(),
            drain: RwLock::new(()),
            dispatch_thread_id: OnceLock::new(),
            accepting: AtomicBool::new(true),
            shutdown_tx,
            runtime: Mutex::new(Some(runtime)),
            dispatch_thread: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let worker = thread::Builder::new()
            .name("node-session-dispatch".to_string())
            .spawn(move || run_dispatcher(weak, queue_rx))
            .map_err(|e| SessionError::Connection(format!("cannot start dispatch worker: {e}")))?;
        *inner.dispatch_thread.lock() = Some(worker);

        if !silent {
            info!(
                session_id = %inner.id,
                endpoint = %inner.endpoint,
                handlers = ?inner.handlers,
                filters = ?inner.filters,
                "Session connected"
            );
        }
        Ok(Session { inner })
    }
}
