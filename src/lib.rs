#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # fastdial
//!
//! The `fastdial` crate caches DNS answers so that repeated connections to
//! the same `host:port` skip resolution.
//!
//! - A [`StubResolver`](dns::StubResolver) asks one nameserver for `A`
//!   records over TCP, with a doubling retry wait inside an overall budget.
//! - A [`Pool`] keeps every address found per `host:port`, and hands one
//!   out (random or first) on each lookup.
//! - A [`Dialer`] connects to pooled addresses, falling back to a regular
//!   resolve-then-connect if that fails.
//!
//! ## Looking up an address
//!
//! ```no_run
//! # async fn run() -> fastdial::Result<()> {
//! let pool = fastdial::Pool::new();
//!
//! // the first call asks 8.8.8.8, the second is served from memory
//! let addr = pool.get("example.com:80").await?;
//! let again = pool.get("example.com:80").await?;
//! println!("{addr} {again}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuring the pool
//!
//! ```no_run
//! # fn run() -> fastdial::Result<()> {
//! use std::time::Duration;
//!
//! let pool = fastdial::Pool::builder()
//!     .nameserver("1.1.1.1:53")
//!     .timeout(Duration::from_secs(10))
//!     .randomize(false)
//!     .build()?;
//! # drop(pool);
//! # Ok(())
//! # }
//! ```
//!
//! ## Dialing
//!
//! ```no_run
//! # async fn run() -> fastdial::Result<()> {
//! let dialer = fastdial::Dialer::new();
//! let stream = dialer.dial("example.com:80").await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```
//!
//! The `Dialer` implements `tower_service::Service<http::Uri>`, so it can
//! also be handed to `hyper_util::client::legacy::Client` as its connector.
//!
//! Cached entries are never refreshed: record TTLs are ignored and an entry
//! lives as long as its pool.

pub use self::connect::Dialer;
pub use self::dns::{AddressCache, Pool, PoolBuilder};
pub use self::error::{Error, Result};

mod connect;
pub mod dns;
mod error;
mod util;
