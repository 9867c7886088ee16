//! Reply correlation: send one command, watch a set of reply commands, and
//! classify what comes back until a terminal reply or the deadline.
//!
//! Each in-flight request registers a uniquely named subscriber under every
//! reply command it cares about, all feeding one channel. The deadline is
//! the current lag estimate plus a fixed margin, re-armed every time a
//! non-terminal reply arrives, so multi-line responses survive as long as
//! the server keeps talking. The subscriptions are removed on every exit
//! path; a completed request leaves no trace in the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use tern_proto::Message;

use crate::dispatch::{SubscriberRegistry, SUBSCRIBER_BUFFER};
use crate::error::{Result, SessionError};
use crate::session::SessionInner;

/// Monotonic source for correlation tokens, unique per process.
static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_token() -> String {
    format!("corr-{}", TOKEN_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// A judge's classification of one received reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Terminal success; the reply completes the request.
    Accept,
    /// Terminal failure; the reply refuses the request.
    Reject,
    /// Part of the response; keep it and re-arm the deadline.
    Collect,
}

/// Removes a token's registrations when the request ends. The orderly
/// paths call [`CleanupGuard::cleanup_now`]; if the request future panics
/// or is cancelled instead, `Drop` finishes the unregistration on a
/// spawned task, so the registry never keeps a dead token's entries.
struct CleanupGuard {
    registry: Arc<SubscriberRegistry>,
    token: String,
    listen: Vec<String>,
}

impl CleanupGuard {
    fn new(registry: Arc<SubscriberRegistry>, token: String) -> Self {
        CleanupGuard {
            registry,
            token,
            listen: Vec::new(),
        }
    }

    fn track(&mut self, reply_cmd: String) {
        self.listen.push(reply_cmd);
    }

    /// Unregister everything now, leaving nothing for `Drop` to do.
    async fn cleanup_now(&mut self) {
        for reply_cmd in std::mem::take(&mut self.listen) {
            let _ = self.registry.unregister(&reply_cmd, &self.token).await;
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.listen.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let registry = Arc::clone(&self.registry);
        let token = std::mem::take(&mut self.token);
        let listen = std::mem::take(&mut self.listen);
        handle.spawn(async move {
            for reply_cmd in listen {
                let _ = registry.unregister(&reply_cmd, &token).await;
            }
        });
    }
}

/// How a correlated request ended.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A terminal success reply arrived.
    Done {
        /// Non-terminal replies collected along the way, in arrival order.
        replies: Vec<Arc<Message>>,
        /// The accepting reply.
        terminal: Arc<Message>,
    },
    /// A terminal failure reply arrived.
    Refused {
        /// Wire command of the refusing reply.
        code: String,
        /// The refusing reply itself.
        reply: Arc<Message>,
    },
    /// The deadline lapsed with no terminal reply.
    Lapsed {
        /// Non-terminal replies collected before the lapse.
        replies: Vec<Arc<Message>>,
    },
}

impl SessionInner {
    /// Send `command` and correlate replies whose command is in `listen`.
    ///
    /// `judge` classifies each received reply. The wait re-arms its
    /// deadline (lag plus margin) after every collected reply and gives up
    /// once a full deadline passes in silence.
    pub(crate) async fn request<J>(
        &self,
        command: Message,
        listen: &[String],
        mut judge: J,
    ) -> Result<Outcome>
    where
        J: FnMut(&Message) -> Verdict,
    {
        let (tx, mut rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut guard = CleanupGuard::new(Arc::clone(&self.inbound), next_token());

        for reply_cmd in listen {
            if let Err(e) = self.inbound.register(reply_cmd, &guard.token, tx.clone()).await {
                // Unwind the partial registration before reporting.
                guard.cleanup_now().await;
                return Err(SessionError::CorrelationSetup(e));
            }
            guard.track(reply_cmd.clone());
        }
        drop(tx);

        let result = self.await_outcome(command, &mut rx, &mut judge).await;

        // Close the reply channel first so a dispatch blocked on a full
        // channel fails fast instead of holding the registry read lock
        // while cleanup waits on the write lock.
        drop(rx);
        guard.cleanup_now().await;
        result
    }

    async fn await_outcome<J>(
        &self,
        command: Message,
        rx: &mut mpsc::Receiver<Arc<Message>>,
        judge: &mut J,
    ) -> Result<Outcome>
    where
        J: FnMut(&Message) -> Verdict,
    {
        self.enqueue(command).await?;

        let mut collected = Vec::new();
        loop {
            match timeout(self.request_deadline(), rx.recv()).await {
                Ok(Some(reply)) => match judge(&reply) {
                    Verdict::Accept => {
                        return Ok(Outcome::Done {
                            replies: collected,
                            terminal: reply,
                        })
                    }
                    Verdict::Reject => {
                        return Ok(Outcome::Refused {
                            code: reply.command.clone(),
                            reply,
                        })
                    }
                    Verdict::Collect => collected.push(reply),
                },
                Ok(None) => {
                    return Err(SessionError::Internal(
                        "correlation channel closed mid-request".into(),
                    ))
                }
                Err(_) => return Ok(Outcome::Lapsed { replies: collected }),
            }
        }
    }

    /// Measure round-trip lag with a timestamped PING and store the result.
    pub(crate) async fn calibrate(&self) -> Result<Duration> {
        let payload = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string();
        let mut listen = self.resolve_all(&["ERR_NOORIGIN", "ERR_NOSUCHSERVER"]);
        listen.push("PONG".to_owned());

        let started = Instant::now();
        let expected = payload.clone();
        let outcome = self
            .request(Message::ping(&payload), &listen, move |msg| {
                if msg.command != "PONG" {
                    return Verdict::Reject;
                }
                // Unrelated pongs (stale tokens) are not ours to judge.
                if msg.params.last().map(String::as_str) == Some(expected.as_str()) {
                    Verdict::Accept
                } else {
                    Verdict::Collect
                }
            })
            .await?;

        match outcome {
            Outcome::Done { .. } => {
                let lag = started.elapsed();
                *self.lag.lock() = lag;
                debug!(?lag, "lag calibrated");
                Ok(lag)
            }
            Outcome::Refused { code, .. } => {
                Err(SessionError::Protocol(self.replies.describe(&code)))
            }
            Outcome::Lapsed { .. } => Err(SessionError::Timeout),
        }
    }
}
