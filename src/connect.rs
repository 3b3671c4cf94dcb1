use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use http::Uri;
use hyper_util::rt::TokioIo;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tower_service::Service;

use crate::dns::Pool;
use crate::error::{self, BoxError, TimedOut};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

type Dialing = Pin<Box<dyn Future<Output = Result<TokioIo<TcpStream>, BoxError>> + Send>>;

/// Opens TCP connections using addresses from a [`Pool`].
///
/// [`fast_dial`](Dialer::fast_dial) connects straight to a pooled address
/// and reports any failure. [`dial`](Dialer::dial) falls back to a regular
/// resolve-then-connect when the fast path fails, so the pool only ever
/// speeds connections up.
///
/// The `Dialer` is also a `tower_service::Service<Uri>`, which makes it
/// usable as the connector of a `hyper_util` client.
#[derive(Clone, Debug)]
pub struct Dialer {
    pool: Pool,
    connect_timeout: Option<Duration>,
    keepalive: Option<Duration>,
    nodelay: bool,
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer {
    /// Constructs a `Dialer` with its own default [`Pool`].
    pub fn new() -> Dialer {
        Dialer::with_pool(Pool::new())
    }

    /// Constructs a `Dialer` sharing `pool`.
    pub fn with_pool(pool: Pool) -> Dialer {
        Dialer {
            pool,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            keepalive: Some(DEFAULT_KEEPALIVE),
            nodelay: false,
        }
    }

    /// The pool addresses are taken from.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Set the connect timeout, `None` to wait for the OS.
    ///
    /// Default is 30 seconds.
    pub fn set_connect_timeout(&mut self, dur: Option<Duration>) {
        self.connect_timeout = dur;
    }

    /// Set TCP keep-alive on connected sockets, `None` to leave it off.
    ///
    /// With keep-alive on, sockets also get `SO_LINGER` 0 and
    /// `TCP_NODELAY`. Default is 30 seconds.
    pub fn set_keepalive(&mut self, dur: Option<Duration>) {
        self.keepalive = dur;
    }

    /// Set `TCP_NODELAY` regardless of keep-alive.
    ///
    /// Default is `false`.
    pub fn set_nodelay(&mut self, nodelay: bool) {
        self.nodelay = nodelay;
    }

    /// Connects to an address the pool holds for `hostport`.
    ///
    /// # Errors
    ///
    /// Any pool error is returned as is. A failed connect is reported as a
    /// connect error.
    pub async fn fast_dial(&self, hostport: &str) -> crate::Result<TcpStream> {
        let addr = self.pool.get(hostport).await?;
        log::trace!("fast dial {hostport} at {addr}");
        self.connect(TcpStream::connect(addr), hostport).await
    }

    /// Connects to `hostport`, trying [`fast_dial`](Dialer::fast_dial) first.
    ///
    /// If the fast path fails, the address is resolved and connected to the
    /// usual way instead; only that second failure is returned.
    pub async fn dial(&self, hostport: &str) -> crate::Result<TcpStream> {
        match self.fast_dial(hostport).await {
            Ok(stream) => Ok(stream),
            Err(err) => {
                log::warn!("fast dial to {hostport} failed, falling back: {err}");
                self.connect(TcpStream::connect(hostport), hostport).await
            }
        }
    }

    async fn connect<F>(&self, connecting: F, hostport: &str) -> crate::Result<TcpStream>
    where
        F: Future<Output = io::Result<TcpStream>>,
    {
        let res = match self.connect_timeout {
            Some(dur) => match tokio::time::timeout(dur, connecting).await {
                Ok(res) => res,
                Err(_elapsed) => Err(io::Error::new(io::ErrorKind::TimedOut, TimedOut)),
            },
            None => connecting.await,
        };
        let stream = res.map_err(|e| error::connect(e, hostport))?;
        self.configure(&stream)
            .map_err(|e| error::connect(e, hostport))?;
        Ok(stream)
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        if self.nodelay {
            stream.set_nodelay(true)?;
        }
        if let Some(period) = self.keepalive {
            let sock = SockRef::from(stream);
            sock.set_tcp_keepalive(&keepalive(period))?;
            sock.set_linger(Some(Duration::ZERO))?;
            stream.set_nodelay(true)?;
        }
        Ok(())
    }
}

// Idle time and probe interval both follow the configured period, where
// the platform lets us set the interval.
fn keepalive(period: Duration) -> TcpKeepalive {
    let keepalive = TcpKeepalive::new().with_time(period);
    #[cfg(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "fuchsia",
        target_os = "illumos",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "netbsd",
        target_os = "tvos",
        target_os = "watchos",
        target_os = "windows",
    ))]
    let keepalive = keepalive.with_interval(period);
    keepalive
}

impl Service<Uri> for Dialer {
    type Response = TokioIo<TcpStream>;
    type Error = BoxError;
    type Future = Dialing;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let dialer = self.clone();
        Box::pin(async move {
            let hostport = uri_hostport(&dst)?;
            let stream = dialer.dial(&hostport).await?;
            Ok(TokioIo::new(stream))
        })
    }
}

/// The `host:port` to dial for `dst`; the port defaults by scheme.
fn uri_hostport(dst: &Uri) -> Result<String, BoxError> {
    let host = dst.host().ok_or("missing host")?;
    let port = dst.port_u16().unwrap_or_else(|| match dst.scheme_str() {
        Some("https") => 443,
        _ => 80,
    });

    if host.contains(':') && !host.starts_with('[') {
        Ok(format!("[{host}]:{port}"))
    } else {
        Ok(format!("{host}:{port}"))
    }
}
