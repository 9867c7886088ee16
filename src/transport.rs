//! The raw transport: a unified stream type over plain TCP and client TLS,
//! and the secure-first dial policy.
//!
//! The session always attempts a TLS handshake with the platform's native
//! roots first and falls back to plain TCP when that fails. The policy is
//! fixed; callers do not select the transport.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

/// A connected stream, plain or encrypted.
pub(crate) enum Transport {
    /// Plain TCP stream.
    Plain(TcpStream),
    /// Client-side TLS stream (boxed for size).
    Secure(Box<TlsStream<TcpStream>>),
}

impl Transport {
    /// Dial `host:port`, trying TLS first and falling back to plain TCP.
    pub(crate) async fn dial(server: &str) -> io::Result<Transport> {
        match Self::dial_secure(server).await {
            Ok(transport) => {
                info!(%server, "connected over TLS");
                Ok(transport)
            }
            Err(e) => {
                debug!(%server, error = %e, "TLS dial failed, falling back to plain TCP");
                let stream = TcpStream::connect(server).await?;
                info!(%server, "connected over plain TCP");
                Ok(Transport::Plain(stream))
            }
        }
    }

    async fn dial_secure(server: &str) -> io::Result<Transport> {
        let host = server.rsplit_once(':').map_or(server, |(host, _)| host);
        let name = ServerName::try_from(host.to_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut roots = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().certs {
            let _ = roots.add(cert);
        }
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));

        let stream = TcpStream::connect(server).await?;
        let tls = connector.connect(name, stream).await?;
        Ok(Transport::Secure(Box::new(tls)))
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(inner) => Pin::new(inner).poll_read(cx, buf),
            Transport::Secure(inner) => Pin::new(inner).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(inner) => Pin::new(inner).poll_write(cx, buf),
            Transport::Secure(inner) => Pin::new(inner).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(inner) => Pin::new(inner).poll_flush(cx),
            Transport::Secure(inner) => Pin::new(inner).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(inner) => Pin::new(inner).poll_shutdown(cx),
            Transport::Secure(inner) => Pin::new(inner).poll_shutdown(cx),
        }
    }
}
