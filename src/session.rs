//! The session state machine: connect, register, calibrate, disconnect,
//! reconnect, and the sender/receiver transport tasks.
//!
//! A [`Session`] owns the socket for exactly one logical connection. All
//! traffic flows through two registries (inbound for received messages,
//! outbound for observers of sent traffic) and one bounded outbound queue;
//! background tasks are stopped through the shutdown coordinator and their
//! handles joined before the transport is abandoned.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use tern_proto::{LineCodec, Message, ReplyTable};

use crate::config::Config;
use crate::ctcp;
use crate::dispatch::{SubscriberRegistry, SUBSCRIBER_BUFFER};
use crate::error::{Result, SessionError};
use crate::keepalive;
use crate::shutdown::{ShutdownCoordinator, StopSignal};
use crate::transport::Transport;

/// Bounded nick-mutation retries during registration.
const MAX_NICK_ATTEMPTS: usize = 5;

/// Protocol nick length limit the registration loop truncates to.
const MAX_NICK_LEN: usize = 9;

/// Stop-broadcast attempts during disconnect.
const TEARDOWN_ATTEMPTS: usize = 2;

/// How long disconnect waits for each task handle to finish.
const JOIN_GRACE: Duration = Duration::from_secs(5);

/// Minimum QUIT flush window, for when the measured lag is near zero.
const MIN_FLUSH_WAIT: Duration = Duration::from_millis(10);

type WireSink = SplitSink<Framed<Transport, LineCodec>, String>;
type WireStream = SplitStream<Framed<Transport, LineCodec>>;

/// Shared state behind a [`Session`] handle.
pub(crate) struct SessionInner {
    pub(crate) config: Config,
    pub(crate) replies: ReplyTable,
    /// Current nick; mutated by the registration retry loop and `set_nick`.
    pub(crate) nick: Mutex<String>,
    /// Measured round-trip lag, re-estimated by calibration pings.
    pub(crate) lag: Mutex<Duration>,
    pub(crate) connected: AtomicBool,
    /// Received traffic fan-out. Shared so correlation cleanup can outlive
    /// a cancelled request future.
    pub(crate) inbound: Arc<SubscriberRegistry>,
    /// Sent-traffic fan-out for observers such as loggers.
    pub(crate) outbound: SubscriberRegistry,
    pub(crate) shutdown: ShutdownCoordinator,
    queue_tx: mpsc::Sender<Message>,
    /// The queue's consuming end; the sender task borrows it while the
    /// session is connected and returns it on exit.
    queue_slot: Mutex<Option<mpsc::Receiver<Message>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionInner {
    pub(crate) fn new(config: Config, replies: ReplyTable) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth);
        let nick = config.nick.clone();
        let lag = config.initial_lag;
        SessionInner {
            config,
            replies,
            nick: Mutex::new(nick),
            lag: Mutex::new(lag),
            connected: AtomicBool::new(false),
            inbound: Arc::new(SubscriberRegistry::new()),
            outbound: SubscriberRegistry::new(),
            shutdown: ShutdownCoordinator::new(),
            queue_tx,
            queue_slot: Mutex::new(Some(queue_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Fire-and-forget enqueue onto the outbound queue; waits when full.
    pub(crate) async fn enqueue(&self, msg: Message) -> Result<()> {
        self.queue_tx
            .send(msg)
            .await
            .map_err(|_| SessionError::Internal("outbound queue closed".into()))
    }

    pub(crate) fn lag(&self) -> Duration {
        *self.lag.lock()
    }

    /// Deadline for one correlated wait: measured lag plus a fixed margin.
    pub(crate) fn request_deadline(&self) -> Duration {
        self.lag() + self.config.request_margin
    }

    /// Emergency teardown invoked by a task that hit a fatal transport
    /// error. Marks the session disconnected and stops the sibling tasks;
    /// not surfaced to callers — they observe the disconnected state.
    pub(crate) async fn teardown_from_task(&self, reason: &str) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        warn!(%reason, "transport failure, stopping session tasks");
        let stale = self.shutdown.broadcast().await;
        if stale > 0 {
            debug!(stale, "participants already gone during emergency stop");
        }
    }

    /// PASS submission. Quiet deadline means the server accepted it; the
    /// only terminal outcomes are the listed error numerics.
    async fn authenticate(&self, password: &str) -> Result<()> {
        let listen = self.resolve_all(&["ERR_NEEDMOREPARAMS", "ERR_ALREADYREGISTRED"]);
        let outcome = self
            .request(Message::pass(password), &listen, |_| {
                crate::request::Verdict::Reject
            })
            .await?;
        self.expect_quiet(outcome)
    }

    /// One NICK attempt. Any listed numeric is a terminal rejection; a
    /// quiet deadline means the nick is ours.
    pub(crate) async fn negotiate_nick(&self, want: &str) -> Result<()> {
        // An empty nick is a no-op; nothing is sent to the server.
        if want.is_empty() {
            return Ok(());
        }
        let mut want = want.to_owned();
        if want.chars().count() > MAX_NICK_LEN {
            want = want.chars().take(MAX_NICK_LEN).collect();
        }
        let listen = self.resolve_all(&[
            "ERR_NONICKNAMEGIVEN",
            "ERR_ERRONEUSNICKNAME",
            "ERR_NICKNAMEINUSE",
            "ERR_NICKCOLLISION",
        ]);
        let outcome = self
            .request(Message::nick(&want), &listen, |_| {
                crate::request::Verdict::Reject
            })
            .await?;
        self.expect_quiet(outcome)?;
        *self.nick.lock() = want;
        Ok(())
    }

    /// USER registration, same quiet-deadline contract as PASS.
    async fn register_user(&self) -> Result<()> {
        let listen = self.resolve_all(&["ERR_NEEDMOREPARAMS", "ERR_ALREADYREGISTRED"]);
        let outcome = self
            .request(
                Message::user(&self.config.user, &self.config.realname),
                &listen,
                |_| crate::request::Verdict::Reject,
            )
            .await?;
        self.expect_quiet(outcome)
    }

    /// Map an error-watch outcome: rejection is a protocol error, anything
    /// else (including the deadline lapsing) is success.
    pub(crate) fn expect_quiet(&self, outcome: crate::request::Outcome) -> Result<()> {
        match outcome {
            crate::request::Outcome::Refused { code, .. } => {
                Err(SessionError::Protocol(self.replies.describe(&code)))
            }
            _ => Ok(()),
        }
    }

    /// Resolve symbolic reply identifiers to wire commands.
    pub(crate) fn resolve_all(&self, identifiers: &[&str]) -> Vec<String> {
        identifiers
            .iter()
            .map(|id| self.replies.resolve(id))
            .collect()
    }
}

/// A single logical IRC connection.
///
/// `Session` is a cheap-clone handle; clones share all state. `connect`,
/// `reconnect`, and `disconnect` are not designed to be called concurrently
/// with each other — callers serialize them.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session with the standard reply table.
    pub fn new(config: Config) -> Self {
        Self::with_reply_table(config, ReplyTable::standard())
    }

    /// Create a session with a custom reply table.
    pub fn with_reply_table(config: Config, replies: ReplyTable) -> Self {
        Session {
            inner: Arc::new(SessionInner::new(config, replies)),
        }
    }

    /// The nick currently held (or desired, when disconnected).
    pub fn nick(&self) -> String {
        self.inner.nick.lock().clone()
    }

    /// Whether the session believes its transport is alive.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// The measured round-trip lag estimate.
    pub fn lag(&self) -> Duration {
        self.inner.lag()
    }

    /// Fire-and-forget send: enqueue a command with no reply correlation.
    pub async fn send(&self, msg: Message) -> Result<()> {
        self.inner.enqueue(msg).await
    }

    /// Subscribe to inbound messages with the given command (or the
    /// wildcard `"*"`) under a subscriber name. The returned channel closes
    /// when the subscription is removed.
    pub async fn subscribe(
        &self,
        command: &str,
        name: &str,
    ) -> Result<mpsc::Receiver<Arc<Message>>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.inner.inbound.register(command, name, tx).await?;
        Ok(rx)
    }

    /// Remove an inbound subscription.
    pub async fn unsubscribe(&self, command: &str, name: &str) -> Result<()> {
        self.inner.inbound.unregister(command, name).await?;
        Ok(())
    }

    /// Subscribe to sent traffic (for loggers and other observers).
    pub async fn subscribe_outbound(
        &self,
        command: &str,
        name: &str,
    ) -> Result<mpsc::Receiver<Arc<Message>>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.inner.outbound.register(command, name, tx).await?;
        Ok(rx)
    }

    /// Remove an outbound-observer subscription.
    pub async fn unsubscribe_outbound(&self, command: &str, name: &str) -> Result<()> {
        self.inner.outbound.unregister(command, name).await?;
        Ok(())
    }

    /// Connect and register.
    ///
    /// Refuses on incomplete identity; drains commands left queued by a
    /// previous session; dials TLS-first with plain fallback; spawns the
    /// transport, keepalive, and CTCP tasks; then runs the registration
    /// sequence (optional PASS, nick acquisition with bounded underscore
    /// retries, USER) and seeds the lag estimate with a calibration ping.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.config.identity_complete() {
            return Err(SessionError::InvalidIdentity);
        }

        let transport = Transport::dial(&inner.config.server).await?;
        let framed = Framed::new(transport, LineCodec::new());
        let (sink, stream) = framed.split();

        let mut queue_rx = inner
            .queue_slot
            .lock()
            .take()
            .ok_or_else(|| SessionError::Internal("outbound queue already in use".into()))?;
        // Stale commands from a previous session are out of context now.
        while queue_rx.try_recv().is_ok() {}

        let receiver_stop = inner.shutdown.subscribe()?;
        let sender_stop = inner.shutdown.subscribe()?;
        let pinger_stop = inner.shutdown.subscribe()?;
        let ponger_stop = inner.shutdown.subscribe()?;
        let ctcp_stop = inner.shutdown.subscribe()?;

        inner.connected.store(true, Ordering::SeqCst);
        let handles = vec![
            tokio::spawn(receiver_task(inner.clone(), stream, receiver_stop)),
            tokio::spawn(sender_task(inner.clone(), sink, queue_rx, sender_stop)),
            tokio::spawn(keepalive::pinger(inner.clone(), pinger_stop)),
            tokio::spawn(keepalive::ponger(inner.clone(), ponger_stop)),
            tokio::spawn(ctcp::responder(inner.clone(), ctcp_stop)),
        ];
        *inner.tasks.lock() = handles;
        info!(server = %inner.config.server, "transport up, registering");

        if let Err(e) = self.register_identity().await {
            let _ = self.disconnect("registration failed").await;
            return Err(e);
        }

        match inner.calibrate().await {
            Ok(lag) => info!(?lag, nick = %self.nick(), "session registered"),
            Err(e) => debug!(error = %e, "calibration ping failed"),
        }

        if !inner.connected.load(Ordering::SeqCst) {
            let _ = self.disconnect("connection lost during registration").await;
            return Err(SessionError::Transport(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection lost during registration",
            )));
        }
        Ok(())
    }

    /// Disconnect-if-connected, then connect.
    pub async fn reconnect(&self, reason: &str) -> Result<()> {
        info!(%reason, "reconnecting");
        self.disconnect(reason).await?;
        self.connect().await
    }

    /// Disconnect: send QUIT, wait one round trip for the flush, stop all
    /// tasks through the shutdown coordinator, and join their handles.
    ///
    /// Always ends with the session marked disconnected and the lag reset
    /// to its conservative default. Tasks that survive the bounded stop
    /// attempts and the join grace period yield [`SessionError::TeardownFailed`].
    pub async fn disconnect(&self, reason: &str) -> Result<()> {
        let inner = &self.inner;
        if inner.connected.load(Ordering::SeqCst) {
            let _ = inner.enqueue(Message::quit(reason)).await;
            tokio::time::sleep(inner.lag().max(MIN_FLUSH_WAIT)).await;
        }
        inner.connected.store(false, Ordering::SeqCst);

        let mut stale = 0;
        for attempt in 1..=TEARDOWN_ATTEMPTS {
            stale = inner.shutdown.broadcast().await;
            if stale == 0 {
                break;
            }
            warn!(attempt, stale, "shutdown broadcast left unresponsive tasks");
        }

        let handles = std::mem::take(&mut *inner.tasks.lock());
        for handle in handles {
            if tokio::time::timeout(JOIN_GRACE, handle).await.is_err() {
                *inner.lag.lock() = inner.config.initial_lag;
                return Err(SessionError::TeardownFailed {
                    stale: stale.max(1),
                });
            }
        }

        *inner.lag.lock() = inner.config.initial_lag;
        debug!(%reason, "session disconnected");
        Ok(())
    }

    /// Optional PASS, nick acquisition with bounded mutation retries, USER.
    async fn register_identity(&self) -> Result<()> {
        let inner = &self.inner;
        if let Some(password) = inner.config.password.clone() {
            inner.authenticate(&password).await?;
        }

        let mut want = inner.nick.lock().clone();
        let mut attempts = 0;
        loop {
            match inner.negotiate_nick(&want).await {
                Ok(()) => break,
                Err(SessionError::Protocol(code)) => {
                    attempts += 1;
                    if attempts > MAX_NICK_ATTEMPTS {
                        return Err(SessionError::NickExhausted);
                    }
                    debug!(rejected = %want, %code, attempts, "nick taken, mutating");
                    want = format!("_{want}");
                }
                Err(e) => return Err(e),
            }
        }

        inner.register_user().await
    }
}

/// Drains the outbound queue onto the wire. Malformed commands (empty
/// encoding) are logged and skipped; successfully written messages are
/// fanned out to the outbound observers; a write failure is fatal.
async fn sender_task(
    inner: Arc<SessionInner>,
    mut sink: WireSink,
    mut queue_rx: mpsc::Receiver<Message>,
    mut stop: mpsc::Receiver<StopSignal>,
) {
    let mut failed = false;
    loop {
        tokio::select! {
            signal = stop.recv() => {
                if let Some(signal) = signal {
                    signal.acknowledge();
                }
                break;
            }
            msg = queue_rx.recv() => match msg {
                Some(msg) => {
                    let line = msg.encode();
                    if line.is_empty() {
                        warn!(?msg, "refusing to send malformed command");
                        continue;
                    }
                    trace!(%line, "send");
                    if let Err(e) = sink.send(line).await {
                        warn!(error = %e, "write failed");
                        failed = true;
                        break;
                    }
                    let observers = Arc::clone(&inner);
                    let msg = Arc::new(msg);
                    tokio::spawn(async move {
                        observers.outbound.dispatch(msg).await;
                    });
                }
                None => break,
            },
        }
    }
    // Hand the queue back for the next connect.
    *inner.queue_slot.lock() = Some(queue_rx);
    if failed {
        drop(stop);
        inner.teardown_from_task("write failure").await;
    }
}

/// Reads wire lines, decodes them, and spawns one fan-out dispatch per
/// message so a stalled subscriber never blocks the read loop. Undecodable
/// lines are logged and skipped; read errors and EOF are fatal.
async fn receiver_task(
    inner: Arc<SessionInner>,
    mut stream: WireStream,
    mut stop: mpsc::Receiver<StopSignal>,
) {
    let mut failed = false;
    loop {
        tokio::select! {
            signal = stop.recv() => {
                if let Some(signal) = signal {
                    signal.acknowledge();
                }
                break;
            }
            item = stream.next() => match item {
                Some(Ok(line)) => match Message::decode(&line) {
                    Ok(msg) => {
                        trace!(%line, "recv");
                        let registry = Arc::clone(&inner);
                        let msg = Arc::new(msg);
                        tokio::spawn(async move {
                            registry.inbound.dispatch(msg).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "skipping undecodable line"),
                },
                Some(Err(e)) => {
                    warn!(error = %e, "read failed");
                    failed = true;
                    break;
                }
                None => {
                    info!("server closed the connection");
                    failed = true;
                    break;
                }
            },
        }
    }
    if failed {
        drop(stop);
        inner.teardown_from_task("read failure").await;
    }
}
