use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use hickory_proto::op::ResponseCode;

/// A `Result` alias where the `Err` case is `fastdial::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// The Errors that may occur when resolving or dialing a `host:port`.
///
/// Note: Errors may include the full host name queried, which is often
/// harmless but may be sensitive when logging.
pub struct Error {
    inner: Box<Inner>,
}

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    host: Option<String>,
    nameserver: Option<SocketAddr>,
    elapsed: Option<Duration>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                host: None,
                nameserver: None,
                elapsed: None,
            }),
        }
    }

    /// Returns the host this error relates to, if any.
    pub fn host(&self) -> Option<&str> {
        self.inner.host.as_deref()
    }

    /// Returns the nameserver that was queried, if any.
    pub fn nameserver(&self) -> Option<SocketAddr> {
        self.inner.nameserver
    }

    /// Returns the cumulative time spent in exchanges before the failure,
    /// if the error came out of a resolution.
    pub fn elapsed(&self) -> Option<Duration> {
        self.inner.elapsed
    }

    /// Returns the DNS response code, if this is a protocol error.
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self.inner.kind {
            Kind::Protocol(code) => Some(code),
            _ => None,
        }
    }

    /// Returns true if the `host:port` given was malformed.
    pub fn is_invalid_address(&self) -> bool {
        matches!(self.inner.kind, Kind::InvalidAddress)
    }

    /// Returns true if the error came from a failed exchange with the
    /// nameserver.
    pub fn is_resolve(&self) -> bool {
        matches!(self.inner.kind, Kind::Resolve)
    }

    /// Returns true if the nameserver answered with a non-success code.
    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, Kind::Protocol(_))
    }

    /// Returns true if the resolution yielded no addresses, or the cache
    /// holds none for the key.
    pub fn is_empty(&self) -> bool {
        matches!(self.inner.kind, Kind::EmptyAddressSet)
    }

    /// Returns true if the nameserver kept marking its replies truncated.
    pub fn is_truncated(&self) -> bool {
        matches!(self.inner.kind, Kind::Truncated)
    }

    /// Returns true if the error is related to connecting.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::Connect)
    }

    /// Returns true if the error is from a type Builder.
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// Returns true if the error is related to a timeout.
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if err.is::<TimedOut>() {
                return true;
            }
            if let Some(io) = err.downcast_ref::<io::Error>() {
                if io.kind() == io::ErrorKind::TimedOut {
                    return true;
                }
            }
            source = err.source();
        }

        false
    }

    pub(crate) fn with_host(mut self, host: impl Into<String>) -> Error {
        self.inner.host = Some(host.into());
        self
    }

    pub(crate) fn with_nameserver(mut self, nameserver: SocketAddr) -> Error {
        self.inner.nameserver = Some(nameserver);
        self
    }

    pub(crate) fn with_elapsed(mut self, elapsed: Duration) -> Error {
        self.inner.elapsed = Some(elapsed);
        self
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("fastdial::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref host) = self.inner.host {
            builder.field("host", host);
        }
        if let Some(ref nameserver) = self.inner.nameserver {
            builder.field("nameserver", nameserver);
        }
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Builder => f.write_str("builder error")?,
            Kind::InvalidAddress => f.write_str("invalid address")?,
            Kind::Resolve | Kind::Protocol(_) | Kind::Truncated => {
                f.write_str("error resolving")?;
                if let Some(ref host) = self.inner.host {
                    write!(f, " {host}")?;
                }
                if let Some(ref nameserver) = self.inner.nameserver {
                    write!(f, " via {nameserver}")?;
                }
                match self.inner.kind {
                    Kind::Protocol(code) => write!(f, ": {code}")?,
                    Kind::Truncated => f.write_str(": reply still truncated after retries")?,
                    _ => (),
                }
                return Ok(());
            }
            Kind::EmptyAddressSet => f.write_str("no addresses for host")?,
            Kind::Connect => f.write_str("error connecting")?,
        }

        if let Some(ref host) = self.inner.host {
            write!(f, " ({host})")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    Builder,
    InvalidAddress,
    Resolve,
    Protocol(ResponseCode),
    EmptyAddressSet,
    Truncated,
    Connect,
}

// constructors

pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder, Some(e))
}

pub(crate) fn invalid_address<E: Into<BoxError>>(e: E, hostport: &str) -> Error {
    Error::new(Kind::InvalidAddress, Some(e)).with_host(hostport)
}

pub(crate) fn resolve<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Resolve, Some(e))
}

pub(crate) fn protocol(code: ResponseCode) -> Error {
    Error::new(Kind::Protocol(code), None::<Error>)
}

pub(crate) fn truncated() -> Error {
    Error::new(Kind::Truncated, None::<Error>)
}

pub(crate) fn empty(key: &str) -> Error {
    Error::new(Kind::EmptyAddressSet, None::<Error>).with_host(key)
}

pub(crate) fn connect<E: Into<BoxError>>(e: E, hostport: &str) -> Error {
    Error::new(Kind::Connect, Some(e)).with_host(hostport)
}

/// Errors coming out of a `Resolve` implementation are kept as they are
/// when they already are a `fastdial::Error`.
pub(crate) fn cast_to_internal_error(error: BoxError) -> Error {
    match error.downcast::<Error>() {
        Ok(e) => *e,
        Err(e) => resolve(e),
    }
}

#[derive(Debug)]
pub(crate) struct TimedOut;

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("operation timed out")
    }
}

impl StdError for TimedOut {}

#[derive(Debug)]
pub(crate) struct BadAddress(pub(crate) &'static str);

impl fmt::Display for BadAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl StdError for BadAddress {}
