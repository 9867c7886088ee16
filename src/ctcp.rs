//! The CTCP auto-responder: a PRIVMSG subscriber answering the common
//! client-to-client queries with NOTICEs to the asking nick.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use tern_proto::ctcp;
use tern_proto::Message;

use crate::dispatch::SUBSCRIBER_BUFFER;
use crate::session::SessionInner;
use crate::shutdown::StopSignal;

const VERSION_REPLY: &str = concat!("tern-irc ", env!("CARGO_PKG_VERSION"));
const CLIENTINFO_REPLY: &str = "VERSION CLIENTINFO USERINFO PING TIME SOURCE FINGER";
const SOURCE_REPLY: &str = concat!("https://crates.io/crates/", env!("CARGO_PKG_NAME"));

/// Answers CTCP queries arriving inside PRIVMSGs.
pub(crate) async fn responder(inner: Arc<SessionInner>, mut stop: mpsc::Receiver<StopSignal>) {
    let (tx, mut queries) = mpsc::channel(SUBSCRIBER_BUFFER);
    if let Err(e) = inner.inbound.register("PRIVMSG", "ctcp", tx).await {
        warn!(error = %e, "ctcp responder could not subscribe");
        if let Some(signal) = stop.recv().await {
            signal.acknowledge();
        }
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
            msg = queries.recv() => match msg {
                Some(msg) => answer(&inner, &msg).await,
                None => break,
            },
        }
    }

    let _ = inner.inbound.unregister("PRIVMSG", "ctcp").await;
}

async fn answer(inner: &SessionInner, msg: &Message) {
    let Some(text) = msg.text() else { return };
    let Some(query) = ctcp::parse(text) else { return };
    let Some(asker) = msg.source_nick() else { return };

    let payload = match query.tag {
        "VERSION" => ctcp::quote("VERSION", Some(VERSION_REPLY)),
        "CLIENTINFO" => ctcp::quote("CLIENTINFO", Some(CLIENTINFO_REPLY)),
        "USERINFO" => {
            let body = format!("{} ({})", inner.config.user, inner.config.realname);
            ctcp::quote("USERINFO", Some(&body))
        }
        "PING" => match query.args {
            Some(args) => ctcp::quote("PING", Some(args)),
            None => {
                debug!(from = %asker, "ctcp ping without a timestamp, ignoring");
                return;
            }
        },
        "TIME" => {
            let now = chrono::Local::now().to_rfc2822();
            ctcp::quote("TIME", Some(&now))
        }
        "SOURCE" => ctcp::quote("SOURCE", Some(SOURCE_REPLY)),
        "FINGER" => ctcp::quote("FINGER", Some(&inner.config.realname)),
        other => {
            trace!(tag = %other, from = %asker, "unsupported ctcp query");
            return;
        }
    };

    if inner
        .enqueue(Message::notice(asker, payload))
        .await
        .is_err()
    {
        debug!("outbound queue gone, dropping ctcp reply");
    }
}
