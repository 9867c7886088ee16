//! Keepalive tasks: the pinger keeps the lag estimate fresh on quiet
//! connections, the ponger answers server PINGs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use tern_proto::{Message, WILDCARD};

use crate::session::SessionInner;
use crate::shutdown::StopSignal;

/// How often the pinger checks for idleness.
const IDLE_CHECK: Duration = Duration::from_secs(60);

/// Silence on the wire longer than this triggers a keepalive ping.
const IDLE_THRESHOLD: Duration = Duration::from_secs(240);

/// A ping is forced at this cadence even on a busy connection, so the lag
/// estimate never goes completely stale.
const FORCED_PING: Duration = Duration::from_secs(900);

/// Traffic-watch channel depth; the pinger only samples arrival times.
const TRAFFIC_BUFFER: usize = 64;

/// Hold the task until its stop signal arrives, then acknowledge it.
async fn park_until_stopped(mut stop: mpsc::Receiver<StopSignal>) {
    if let Some(signal) = stop.recv().await {
        signal.acknowledge();
    }
}

/// Watches all inbound traffic and sends a calibration ping when the
/// connection has been silent too long, refreshing the lag estimate.
pub(crate) async fn pinger(inner: Arc<SessionInner>, mut stop: mpsc::Receiver<StopSignal>) {
    let (tx, mut traffic) = mpsc::channel(TRAFFIC_BUFFER);
    if let Err(e) = inner.inbound.register(WILDCARD, "ticker", tx).await {
        warn!(error = %e, "pinger could not watch traffic");
        park_until_stopped(stop).await;
        return;
    }

    let mut last_activity = Instant::now();
    let mut last_forced = Instant::now();
    let mut check = tokio::time::interval_at(Instant::now() + IDLE_CHECK, IDLE_CHECK);

    loop {
        tokio::select! {
            signal = stop.recv() => {
                if let Some(signal) = signal {
                    signal.acknowledge();
                }
                break;
            }
            seen = traffic.recv() => match seen {
                Some(_) => last_activity = Instant::now(),
                None => break,
            },
            _ = check.tick() => {
                let now = Instant::now();
                let idle = now.duration_since(last_activity) >= IDLE_THRESHOLD;
                let overdue = now.duration_since(last_forced) >= FORCED_PING;
                if idle || overdue {
                    last_forced = now;
                    match inner.calibrate().await {
                        Ok(lag) => {
                            last_activity = Instant::now();
                            trace!(?lag, "keepalive ping answered");
                        }
                        Err(e) => debug!(error = %e, "keepalive ping failed"),
                    }
                }
            }
        }
    }

    let _ = inner.inbound.unregister(WILDCARD, "ticker").await;
}

/// Answers every server PING with a PONG echoing its token.
pub(crate) async fn ponger(inner: Arc<SessionInner>, mut stop: mpsc::Receiver<StopSignal>) {
    let (tx, mut pings) = mpsc::channel(crate::dispatch::SUBSCRIBER_BUFFER);
    if let Err(e) = inner.inbound.register("PING", "ponger", tx).await {
        warn!(error = %e, "ponger could not subscribe");
        park_until_stopped(stop).await;
        return;
    }

    loop {
        tokio::select! {
            signal = stop.recv() => {
                if let Some(signal) = signal {
                    signal.acknowledge();
                }
                break;
            }
            ping = pings.recv() => match ping {
                Some(msg) => {
                    let token = msg.params.first().cloned().unwrap_or_default();
                    trace!(%token, "answering server ping");
                    if inner.enqueue(Message::pong(token)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let _ = inner.inbound.unregister("PING", "ponger").await;
}
