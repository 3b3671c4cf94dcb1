//! DNS resolution

use std::time::Duration;

pub use self::cache::AddressCache;
pub use self::pool::{Pool, PoolBuilder};
pub use self::resolve::{IntoResolve, Name, Resolve, Resolved, Resolving};
pub use self::stub::{Exchange, Exchanging, StubResolver, TcpExchange};

mod cache;
pub(crate) mod pool;
mod resolve;
mod stub;

/// The nameserver a [`Pool`] asks by default.
pub const DEFAULT_NAMESERVER: &str = "8.8.8.8:53";

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_MAX_TRUNCATION_RETRIES: u32 = 3;
