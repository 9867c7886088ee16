//! A scripted in-process IRC server for integration tests.
//!
//! The server binds an ephemeral loopback port, refuses TLS handshakes by
//! dropping any connection whose first byte is a TLS record header (which
//! makes the session's secure-first dial fall back to plain TCP), and then
//! answers each decoded client message with whatever lines the script
//! returns. Every decoded message is recorded for post-test assertions.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tern_irc::{Config, Message};

/// Sentinel reply: close the connection instead of writing a line.
pub const CLOSE: &str = "<close>";

const TLS_RECORD_HEADER: u8 = 0x16;

pub struct ScriptedServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<Message>>,
}

impl ScriptedServer {
    /// Start a server that serves `sessions` plain-TCP connections, feeding
    /// every decoded message to `script` and writing back its replies.
    pub async fn start<F>(sessions: usize, mut script: F) -> ScriptedServer
    where
        F: FnMut(&Message) -> Vec<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut served = 0;
            while served < sessions {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                match first_byte(stream).await {
                    Some((stream, first)) => {
                        serve(stream, first, &mut script, &mut received).await;
                        served += 1;
                    }
                    // TLS attempt or instantly dead connection; refuse it.
                    None => continue,
                }
            }
            received
        });

        ScriptedServer { addr, handle }
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.addr.port())
    }

    /// Wait for the server to finish and return every message it decoded,
    /// across all served connections, in arrival order.
    pub async fn finish(self) -> Vec<Message> {
        self.handle.await.unwrap()
    }
}

async fn first_byte(mut stream: TcpStream) -> Option<(TcpStream, u8)> {
    let mut first = [0u8; 1];
    match stream.read_exact(&mut first).await {
        Ok(_) if first[0] == TLS_RECORD_HEADER => None,
        Ok(_) => Some((stream, first[0])),
        Err(_) => None,
    }
}

async fn serve<F>(stream: TcpStream, first: u8, script: &mut F, received: &mut Vec<Message>)
where
    F: FnMut(&Message) -> Vec<String>,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    line.push(first as char);

    loop {
        match reader.read_line(&mut line).await {
            Ok(0) => return,
            Ok(_) => {
                let decoded = Message::decode(&line);
                line.clear();
                let Ok(msg) = decoded else { continue };
                received.push(msg.clone());

                for reply in script(&msg) {
                    if reply == CLOSE {
                        return;
                    }
                    let framed = format!("{reply}\r\n");
                    if write_half.write_all(framed.as_bytes()).await.is_err() {
                        return;
                    }
                }
                if msg.command == "QUIT" {
                    return;
                }
            }
            Err(_) => return,
        }
    }
}

/// A config pointed at the scripted server with deadlines shrunk so
/// quiet-deadline operations finish quickly.
pub fn fast_config(addr: &str) -> Config {
    init_tracing();
    let mut config = Config::new(addr, "tern", "tern", "Tern Bot");
    config.initial_lag = Duration::from_millis(100);
    config.request_margin = Duration::from_millis(100);
    config
}

/// Route test logs through `RUST_LOG`, once per process.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Script fragment answering calibration pings with a matching pong.
pub fn answer_ping(msg: &Message) -> Vec<String> {
    if msg.command == "PING" {
        let token = msg.params.first().cloned().unwrap_or_default();
        vec![format!(":scripted.test PONG scripted.test :{token}")]
    } else {
        Vec::new()
    }
}
