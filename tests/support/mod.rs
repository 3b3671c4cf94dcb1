#![allow(dead_code)]

pub mod nameserver;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fastdial::dns::{Name, Resolve, Resolved, Resolving};

/// A resolver answering from a fixed table, counting how often it is asked.
#[derive(Default)]
pub struct StaticResolver {
    answers: HashMap<String, Vec<IpAddr>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StaticResolver {
    pub fn new() -> StaticResolver {
        StaticResolver::default()
    }

    pub fn answer(mut self, host: &str, ips: &[&str]) -> StaticResolver {
        let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
        self.answers.insert(host.to_owned(), ips);
        self
    }

    pub fn delay(mut self, delay: Duration) -> StaticResolver {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn ips(&self, host: &str) -> &[IpAddr] {
        self.answers.get(host).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, name: Name, _nameserver: SocketAddr) -> Resolving {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ips = self.answers.get(name.as_str()).cloned();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match ips {
                Some(ips) => Ok(Resolved::new(ips, Duration::from_millis(1))),
                None => Err(format!("no such host: {name}").into()),
            }
        })
    }
}
