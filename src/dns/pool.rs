use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use super::cache::AddressCache;
use super::resolve::{IntoResolve, Name, Resolve};
use super::stub::StubResolver;
use super::{
    DEFAULT_MAX_TRUNCATION_RETRIES, DEFAULT_NAMESERVER, DEFAULT_RETRY_WAIT, DEFAULT_STEP_TIMEOUT,
    DEFAULT_TIMEOUT,
};
use crate::error::{self, BadAddress};

/// A caching pool of resolved addresses.
///
/// The first [`get`](Pool::get) for a `host:port` asks the nameserver and
/// remembers every address it answers with; later calls for the same
/// `host:port` are served from memory. Entries live as long as the pool:
/// record TTLs are not honored.
///
/// The cache key is the `host:port` string as given, so `example.com:80`
/// and `example.com:443` are resolved and stored separately.
///
/// The `Pool` is cheap to clone and every clone shares the same cache, so
/// create one and **reuse** it.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolRef>,
}

struct PoolRef {
    nameserver: SocketAddr,
    randomize: bool,
    resolver: Arc<dyn Resolve>,
    cache: AddressCache,
}

/// A `PoolBuilder` can be used to create a `Pool` with custom configuration.
#[must_use]
pub struct PoolBuilder {
    config: Config,
}

struct Config {
    nameserver: String,
    randomize: bool,
    timeout: Duration,
    step_timeout: Duration,
    retry_wait: Duration,
    max_truncation_retries: u32,
    resolver: Option<Arc<dyn Resolve>>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolBuilder {
    /// Constructs a new `PoolBuilder`.
    ///
    /// This is the same as `Pool::builder()`.
    pub fn new() -> PoolBuilder {
        PoolBuilder {
            config: Config {
                nameserver: DEFAULT_NAMESERVER.to_owned(),
                randomize: true,
                timeout: DEFAULT_TIMEOUT,
                step_timeout: DEFAULT_STEP_TIMEOUT,
                retry_wait: DEFAULT_RETRY_WAIT,
                max_truncation_retries: DEFAULT_MAX_TRUNCATION_RETRIES,
                resolver: None,
            },
        }
    }

    /// Returns a `Pool` that uses this `PoolBuilder` configuration.
    ///
    /// # Errors
    ///
    /// This method fails if the nameserver is not an `ip:port` or bare `ip`.
    pub fn build(self) -> crate::Result<Pool> {
        let config = self.config;
        let nameserver = parse_nameserver(&config.nameserver)?;

        let resolver = match config.resolver {
            Some(resolver) => resolver,
            None => Arc::new(
                StubResolver::new()
                    .timeout(config.timeout)
                    .step_timeout(config.step_timeout)
                    .retry_wait(config.retry_wait)
                    .max_truncation_retries(config.max_truncation_retries),
            ),
        };

        Ok(Pool {
            inner: Arc::new(PoolRef {
                nameserver,
                randomize: config.randomize,
                resolver,
                cache: AddressCache::new(),
            }),
        })
    }

    /// Sets the nameserver queried on a cache miss.
    ///
    /// Accepts `ip:port`, `[ipv6]:port`, or a bare address which implies
    /// port 53. Default is `8.8.8.8:53`.
    pub fn nameserver(mut self, nameserver: impl Into<String>) -> PoolBuilder {
        self.config.nameserver = nameserver.into();
        self
    }

    /// Pick a random cached address on each `get` instead of the first one.
    ///
    /// Default is `true`.
    pub fn randomize(mut self, enable: bool) -> PoolBuilder {
        self.config.randomize = enable;
        self
    }

    /// Sets the overall budget for retrying transient resolution failures.
    ///
    /// Default is 5 seconds.
    pub fn timeout(mut self, timeout: Duration) -> PoolBuilder {
        self.config.timeout = timeout;
        self
    }

    /// Sets the limit for each connect, write and read with the nameserver.
    ///
    /// Default is 2 seconds.
    pub fn step_timeout(mut self, timeout: Duration) -> PoolBuilder {
        self.config.step_timeout = timeout;
        self
    }

    /// Sets the wait before the first retry; it doubles after every retry.
    ///
    /// Waits shorter than a millisecond are raised to one. Default is
    /// 2 seconds.
    pub fn retry_wait(mut self, wait: Duration) -> PoolBuilder {
        self.config.retry_wait = wait;
        self
    }

    /// Sets how many truncated replies are re-queried before giving up.
    ///
    /// Default is 3.
    pub fn max_truncation_retries(mut self, max: u32) -> PoolBuilder {
        self.config.max_truncation_retries = max;
        self
    }

    /// Override the resolver used on cache misses.
    ///
    /// The timeout options above only configure the default
    /// [`StubResolver`] and are ignored once a resolver is given.
    pub fn resolver<R: IntoResolve>(mut self, resolver: R) -> PoolBuilder {
        self.config.resolver = Some(resolver.into_resolve());
        self
    }
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("nameserver", &self.config.nameserver)
            .field("randomize", &self.config.randomize)
            .field("timeout", &self.config.timeout)
            .field("step_timeout", &self.config.step_timeout)
            .field("retry_wait", &self.config.retry_wait)
            .field("custom_resolver", &self.config.resolver.is_some())
            .finish()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    /// Constructs a new `Pool` asking `8.8.8.8:53`, with random selection.
    ///
    /// # Panics
    ///
    /// This method panics if the default configuration cannot be built.
    ///
    /// Use `Pool::builder()` if you wish to handle the failure as an `Error`
    /// instead of panicking.
    pub fn new() -> Pool {
        PoolBuilder::new().build().expect("Pool::new()")
    }

    /// Creates a `PoolBuilder` to configure a `Pool`.
    ///
    /// This is the same as `PoolBuilder::new()`.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Returns an address to connect to for `hostport`.
    ///
    /// A cached `hostport` is answered without touching the resolver.
    /// Otherwise the host is resolved, every address found is cached under
    /// `hostport`, and one of them is returned. Hosts that already are IP
    /// literals are returned as they are.
    ///
    /// # Errors
    ///
    /// - an invalid-address error for a malformed `hostport`,
    /// - the resolver's error, unchanged,
    /// - an empty-address-set error if resolution found nothing; nothing is
    ///   cached in that case.
    pub async fn get(&self, hostport: &str) -> crate::Result<SocketAddr> {
        let (host, port) = split_host_port(hostport)?;

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        let inner = &self.inner;
        if inner.cache.exists(hostport) {
            log::trace!("address cache hit for {hostport}");
            return inner.cache.select(hostport, inner.randomize);
        }

        let name: Name = host
            .parse()
            .map_err(|e| error::invalid_address(e, hostport))?;

        let resolved = inner
            .resolver
            .resolve(name, inner.nameserver)
            .await
            .map_err(|e| {
                let err = error::cast_to_internal_error(e);
                if err.host().is_some() {
                    err
                } else {
                    err.with_host(host).with_nameserver(inner.nameserver)
                }
            })?;

        log::debug!(
            "{hostport} took {:?} to resolve {:?}",
            resolved.elapsed(),
            resolved.addrs()
        );

        if resolved.addrs().is_empty() {
            return Err(error::empty(hostport));
        }

        let addrs = resolved
            .into_addrs()
            .into_iter()
            .map(|ip| SocketAddr::new(ip, port))
            .collect();
        if !inner.cache.populate(hostport, addrs) {
            log::trace!("{hostport} was cached by a concurrent lookup");
        }

        inner.cache.select(hostport, inner.randomize)
    }

    /// The cache backing this pool.
    pub fn cache(&self) -> &AddressCache {
        &self.inner.cache
    }

    /// The nameserver queried on cache misses.
    pub fn nameserver(&self) -> SocketAddr {
        self.inner.nameserver
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("nameserver", &self.inner.nameserver)
            .field("randomize", &self.inner.randomize)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

fn parse_nameserver(nameserver: &str) -> crate::Result<SocketAddr> {
    if let Ok(addr) = nameserver.parse::<SocketAddr>() {
        return Ok(addr);
    }
    nameserver
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(error::builder)
}

/// Splits `host:port` or `[host]:port` into its host and numeric port.
pub(crate) fn split_host_port(hostport: &str) -> crate::Result<(&str, u16)> {
    let bad = |msg: &'static str| error::invalid_address(BadAddress(msg), hostport);

    let (host, port) = if let Some(rest) = hostport.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(|| bad("missing ']' in address"))?;
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| bad("missing port in address"))?;
        (&rest[..end], port)
    } else {
        let colon = hostport
            .rfind(':')
            .ok_or_else(|| bad("missing port in address"))?;
        let host = &hostport[..colon];
        if host.contains(':') {
            return Err(bad("too many colons in address"));
        }
        (host, &hostport[colon + 1..])
    };

    if host.is_empty() {
        return Err(bad("missing host in address"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| error::invalid_address(e, hostport))?;
    Ok((host, port))
}
