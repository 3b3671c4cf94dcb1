//! A minimal DNS stub client speaking to one nameserver over TCP.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name as DnsName, RData, RecordType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::resolve::{Name, Resolve, Resolved, Resolving};
use super::{
    DEFAULT_MAX_TRUNCATION_RETRIES, DEFAULT_RETRY_WAIT, DEFAULT_STEP_TIMEOUT, DEFAULT_TIMEOUT,
};
use crate::error::{self, BoxError, TimedOut};

const MIN_RETRY_WAIT: Duration = Duration::from_millis(1);

/// Alias for the `Future` type returned by an [`Exchange`].
pub type Exchanging = Pin<Box<dyn Future<Output = io::Result<Message>> + Send>>;

/// A single query/response exchange with a nameserver.
///
/// The default is [`TcpExchange`]. Implementations report transport
/// failures as `io::Error`; timeouts, resets and interruptions are treated
/// as transient by [`StubResolver`] and retried within its budget.
pub trait Exchange: Send + Sync {
    /// Sends `query` to `nameserver` and waits for one reply, bounding each
    /// step of the exchange by `step_timeout`.
    fn exchange(&self, query: Message, nameserver: SocketAddr, step_timeout: Duration)
        -> Exchanging;
}

/// Exchanges length-prefixed messages over a fresh TCP connection.
///
/// The connection lives for a single attempt only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpExchange;

impl Exchange for TcpExchange {
    fn exchange(
        &self,
        query: Message,
        nameserver: SocketAddr,
        step_timeout: Duration,
    ) -> Exchanging {
        Box::pin(exchange_tcp(query, nameserver, step_timeout))
    }
}

async fn exchange_tcp(
    query: Message,
    nameserver: SocketAddr,
    step_timeout: Duration,
) -> io::Result<Message> {
    let bytes = query
        .to_vec()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let len = u16::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "query too large"))?;

    let mut stream = step(step_timeout, TcpStream::connect(nameserver)).await?;

    let mut buf = Vec::with_capacity(2 + bytes.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&bytes);
    step(step_timeout, stream.write_all(&buf)).await?;

    let mut len = [0u8; 2];
    step(step_timeout, stream.read_exact(&mut len)).await?;
    let mut reply = vec![0u8; u16::from_be_bytes(len) as usize];
    step(step_timeout, stream.read_exact(&mut reply)).await?;

    let reply =
        Message::from_vec(&reply).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if reply.id() != query.id() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "reply id does not match query",
        ));
    }
    Ok(reply)
}

async fn step<F, T>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_elapsed) => Err(io::Error::new(io::ErrorKind::TimedOut, TimedOut)),
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

/// Resolves host names by asking a single nameserver for `A` records.
///
/// Transient transport failures are retried with a doubling wait for as
/// long as the time already spent in exchanges plus the next wait stays
/// under the overall timeout. Replies marked truncated are re-queried
/// straight away, at most `max_truncation_retries` times.
///
/// Both `A` and `AAAA` answer records are collected, in answer order.
#[derive(Clone)]
pub struct StubResolver {
    exchange: Arc<dyn Exchange>,
    timeout: Duration,
    step_timeout: Duration,
    retry_wait: Duration,
    max_truncation_retries: u32,
}

impl StubResolver {
    /// Constructs a resolver with the default timeouts, talking TCP.
    pub fn new() -> StubResolver {
        StubResolver {
            exchange: Arc::new(TcpExchange),
            timeout: DEFAULT_TIMEOUT,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            retry_wait: DEFAULT_RETRY_WAIT,
            max_truncation_retries: DEFAULT_MAX_TRUNCATION_RETRIES,
        }
    }

    /// Sets the overall budget for retrying transient failures.
    ///
    /// Default is 5 seconds.
    pub fn timeout(mut self, timeout: Duration) -> StubResolver {
        self.timeout = timeout;
        self
    }

    /// Sets the limit for each connect, write and read of an attempt.
    ///
    /// Default is 2 seconds.
    pub fn step_timeout(mut self, timeout: Duration) -> StubResolver {
        self.step_timeout = timeout;
        self
    }

    /// Sets the wait before the first retry. It doubles after each retry.
    ///
    /// Waits shorter than a millisecond are raised to one, so that retries
    /// always back off. Default is 2 seconds.
    pub fn retry_wait(mut self, wait: Duration) -> StubResolver {
        self.retry_wait = wait.max(MIN_RETRY_WAIT);
        self
    }

    /// Sets how many times a truncated reply is re-queried before giving up.
    ///
    /// Default is 3.
    pub fn max_truncation_retries(mut self, max: u32) -> StubResolver {
        self.max_truncation_retries = max;
        self
    }

    /// Replaces the transport used to talk to the nameserver.
    pub fn exchange<E>(mut self, exchange: E) -> StubResolver
    where
        E: Exchange + 'static,
    {
        self.exchange = Arc::new(exchange);
        self
    }

    /// Resolves `name` against `nameserver`.
    ///
    /// On success, returns every address found along with the time spent
    /// exchanging messages.
    ///
    /// # Errors
    ///
    /// - a resolve error when the transport fails, after retries if the
    ///   failure was transient,
    /// - a protocol error when the nameserver answers anything but `NoError`,
    /// - a truncated error when the reply stays truncated.
    pub async fn resolve_name(&self, name: &str, nameserver: SocketAddr) -> crate::Result<Resolved> {
        let query = build_query(name).map_err(|e| error::invalid_address(e, name))?;

        let mut addrs = Vec::new();
        let mut elapsed = Duration::ZERO;
        let mut retry_wait = self.retry_wait;
        let mut truncations = 0;

        loop {
            let started = Instant::now();
            let result = self
                .exchange
                .exchange(query.clone(), nameserver, self.step_timeout)
                .await;
            elapsed += started.elapsed();

            let reply = match result {
                Ok(reply) => reply,
                Err(err) if is_transient(&err) && self.can_wait(elapsed, retry_wait) => {
                    log::trace!("resolving {name} via {nameserver} failed ({err}), retry in {retry_wait:?}");
                    tokio::time::sleep(retry_wait).await;
                    retry_wait = retry_wait.saturating_mul(2);
                    continue;
                }
                Err(err) => {
                    return Err(error::resolve(err)
                        .with_host(name)
                        .with_nameserver(nameserver)
                        .with_elapsed(elapsed));
                }
            };

            if reply.response_code() != ResponseCode::NoError {
                return Err(error::protocol(reply.response_code())
                    .with_host(name)
                    .with_nameserver(nameserver)
                    .with_elapsed(elapsed));
            }

            collect_addrs(&reply, &mut addrs);

            if reply.truncated() {
                if truncations >= self.max_truncation_retries {
                    return Err(error::truncated()
                        .with_host(name)
                        .with_nameserver(nameserver)
                        .with_elapsed(elapsed));
                }
                truncations += 1;
                log::debug!("reply for {name} from {nameserver} truncated, re-querying ({truncations})");
                continue;
            }

            return Ok(Resolved::new(addrs, elapsed));
        }
    }

    fn can_wait(&self, elapsed: Duration, retry_wait: Duration) -> bool {
        elapsed
            .checked_add(retry_wait)
            .map_or(false, |total| total < self.timeout)
    }
}

impl Default for StubResolver {
    fn default() -> Self {
        StubResolver::new()
    }
}

impl fmt::Debug for StubResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubResolver")
            .field("timeout", &self.timeout)
            .field("step_timeout", &self.step_timeout)
            .field("retry_wait", &self.retry_wait)
            .field("max_truncation_retries", &self.max_truncation_retries)
            .finish()
    }
}

impl Resolve for StubResolver {
    fn resolve(&self, name: Name, nameserver: SocketAddr) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            resolver
                .resolve_name(name.as_str(), nameserver)
                .await
                .map_err(|err| -> BoxError { Box::new(err) })
        })
    }
}

fn build_query(name: &str) -> Result<Message, BoxError> {
    let mut fqdn = DnsName::from_ascii(name)?;
    fqdn.set_fqdn(true);

    let mut query = Message::new();
    query
        .set_id(crate::util::fast_random() as u16)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(fqdn, RecordType::A));
    Ok(query)
}

fn collect_addrs(reply: &Message, addrs: &mut Vec<IpAddr>) {
    for record in reply.answers() {
        match record.data() {
            RData::A(a) => addrs.push(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => addrs.push(IpAddr::V6(aaaa.0)),
            _ => (),
        }
    }
}
