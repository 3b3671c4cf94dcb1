use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BoxError;

/// Alias for the `Future` type returned by a DNS resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Resolved, BoxError>> + Send>>;

/// Trait for customizing how a [`Pool`](crate::Pool) resolves host names.
pub trait Resolve: Send + Sync {
    /// Performs DNS resolution of `name` against `nameserver`.
    ///
    /// It differs from `tower_service::Service<Name>` in several ways:
    ///  * It is assumed that `resolve` will always be ready to poll.
    ///  * It does not need a mutable reference to `self`.
    ///  * Since trait objects cannot make use of associated types, it requires
    ///    wrapping the returned `Future` with `Box`.
    ///
    /// Errors that are already a [`crate::Error`] are handed to the caller
    /// unchanged; anything else is reported as a resolve error.
    fn resolve(&self, name: Name, nameserver: SocketAddr) -> Resolving;
}

/// A name that must be resolved to addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Name(Box<str>);

/// The outcome of one successful resolution.
#[derive(Clone, Debug, Default)]
pub struct Resolved {
    addrs: Vec<IpAddr>,
    elapsed: Duration,
}

/// A more general trait implemented for types implementing `Resolve`.
///
/// Unnameable, only exported to aid seeing what implements this.
pub trait IntoResolve {
    #[doc(hidden)]
    fn into_resolve(self) -> Arc<dyn Resolve>;
}

impl Name {
    /// View the name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Name {
    type Err = sealed::InvalidNameError;

    fn from_str(host: &str) -> Result<Self, Self::Err> {
        if host.is_empty() || host.len() > 253 || host.contains(|c: char| c == ':' || c.is_whitespace()) {
            return Err(sealed::InvalidNameError { _ext: () });
        }
        Ok(Name(host.into()))
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Resolved {
    /// Creates a result from the addresses found and the time it took.
    pub fn new(addrs: Vec<IpAddr>, elapsed: Duration) -> Self {
        Resolved { addrs, elapsed }
    }

    /// The addresses, in the order the nameserver answered them.
    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// Cumulative time spent exchanging messages with the nameserver.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Consumes the result, returning the addresses.
    pub fn into_addrs(self) -> Vec<IpAddr> {
        self.addrs
    }
}

impl IntoResolve for Arc<dyn Resolve> {
    fn into_resolve(self) -> Arc<dyn Resolve> {
        self
    }
}

impl<R> IntoResolve for Arc<R>
where
    R: Resolve + 'static,
{
    fn into_resolve(self) -> Arc<dyn Resolve> {
        self
    }
}

impl<R> IntoResolve for R
where
    R: Resolve + 'static,
{
    fn into_resolve(self) -> Arc<dyn Resolve> {
        Arc::new(self)
    }
}

mod sealed {
    use std::fmt;

    #[derive(Debug)]
    pub struct InvalidNameError {
        pub(super) _ext: (),
    }

    impl fmt::Display for InvalidNameError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("invalid DNS name")
        }
    }

    impl std::error::Error for InvalidNameError {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rejects_ports_and_blanks() {
        assert!("example.com".parse::<Name>().is_ok());
        assert!("".parse::<Name>().is_err());
        assert!("example.com:80".parse::<Name>().is_err());
        assert!("exa mple.com".parse::<Name>().is_err());
    }

    #[test]
    fn name_display_matches_input() {
        let name: Name = "www.example.com".parse().unwrap();
        assert_eq!(name.as_str(), "www.example.com");
        assert_eq!(name.to_string(), "www.example.com");
    }
}
