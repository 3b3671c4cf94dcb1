//! A nameserver speaking DNS over TCP on localhost, for the integration tests.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct Server {
    addr: SocketAddr,
    queries: Arc<AtomicUsize>,
}

impl Server {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

/// Starts a nameserver; `reply` builds the answer for each query, or
/// returns `None` to leave the client hanging.
pub async fn spawn<F>(reply: F) -> Server
where
    F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let queries = Arc::new(AtomicUsize::new(0));
    let reply = Arc::new(reply);

    let counter = queries.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let counter = counter.clone();
            let reply = reply.clone();
            tokio::spawn(async move {
                let _ = serve(socket, counter, &*reply).await;
            });
        }
    });

    Server { addr, queries }
}

async fn serve<F>(mut socket: TcpStream, counter: Arc<AtomicUsize>, reply: &F) -> std::io::Result<()>
where
    F: Fn(&Message) -> Option<Message>,
{
    let mut len = [0u8; 2];
    socket.read_exact(&mut len).await?;
    let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
    socket.read_exact(&mut buf).await?;
    counter.fetch_add(1, Ordering::SeqCst);

    let query = Message::from_vec(&buf).expect("client sent a valid query");
    match reply(&query) {
        Some(msg) => {
            let bytes = msg.to_vec().unwrap();
            socket.write_all(&(bytes.len() as u16).to_be_bytes()).await?;
            socket.write_all(&bytes).await?;
        }
        None => tokio::time::sleep(Duration::from_secs(60)).await,
    }
    Ok(())
}

/// A `NoError` reply to `query` carrying one record per address.
pub fn answer(query: &Message, ips: &[&str]) -> Message {
    let name = query.queries()[0].name().clone();
    let mut reply = Message::new();
    reply
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_response_code(ResponseCode::NoError)
        .set_recursion_available(true);
    reply.add_queries(query.queries().to_vec());
    for ip in ips {
        let rdata = match ip.parse::<IpAddr>().unwrap() {
            IpAddr::V4(v4) => RData::A(A(v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
        };
        reply.add_answer(Record::from_rdata(name.clone(), 300, rdata));
    }
    reply
}

/// A reply to `query` with `code` and no answers.
pub fn failure(query: &Message, code: ResponseCode) -> Message {
    let mut reply = answer(query, &[]);
    reply.set_response_code(code);
    reply
}
