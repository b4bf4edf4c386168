//! Running discovery on a tokio UDP socket.
//!
//! ```no_run
//! # async fn example() -> Result<(), lifx_lan_core::Error> {
//! use lifx_lan_core::discovery::DiscoveryConfig;
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel(32);
//! tokio::spawn(lifx_lan_core::udp::run(DiscoveryConfig::default(), tx));
//! while let Some(msg) = rx.recv().await {
//!     let (header, body) = msg.decode()?;
//!     println!("{} {} from {:?}", header, body, msg.peer());
//! }
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::discovery::{Discovery, DiscoveryConfig, Scheduler, TimerId, Transport};
use crate::msg::Message;
use crate::Error;

/// Largest datagram we expect to read.
const RECV_BUF_SIZE: usize = 1500;

/// A [Transport] that queues datagrams instead of sending them.
///
/// [run] drains it after every event and awaits each send on the socket, so nothing is lost to a
/// socket that isn't writable yet.  The queue is taken out as an owned `Vec` before any await,
/// which keeps the driver future `Send`.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: RefCell<VecDeque<(Vec<u8>, SocketAddr)>>,
}

impl Outbox {
    /// Takes everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl Transport for Outbox {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.queue.borrow_mut().push_back((buf.to_vec(), addr));
        Ok(buf.len())
    }
}

async fn flush(socket: &UdpSocket, queued: Vec<(Vec<u8>, SocketAddr)>) {
    for (buf, dest) in queued {
        if let Err(e) = socket.send_to(&buf, dest).await {
            warn!("failed to send to {}: {}", dest, e);
        }
    }
}

/// A [Scheduler] backed by tokio's clock.
///
/// It only keeps deadlines; the event loop in [run] sleeps until the earliest one.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    next_id: u64,
    pending: Vec<(TimerId, Instant)>,
}

impl TokioScheduler {
    /// The timer that fires first, if any.
    pub fn next_deadline(&self) -> Option<(TimerId, Instant)> {
        self.pending.iter().copied().min_by_key(|&(_, at)| at)
    }

    /// Forgets a timer that has fired.
    fn fired(&mut self, timer: TimerId) {
        self.pending.retain(|&(id, _)| id != timer);
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push((id, Instant::now() + delay));
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        self.fired(timer);
    }
}

async fn wait_for(deadline: Option<(TimerId, Instant)>) -> TimerId {
    match deadline {
        Some((id, at)) => {
            tokio::time::sleep_until(at).await;
            id
        }
        None => std::future::pending().await,
    }
}

/// Binds `config.bind` and runs discovery on it, forwarding every well-formed message that
/// arrives to `tx`.
///
/// Runs until the receiving half of `tx` is dropped.  Only a failure to set up the socket is
/// returned as an error; send and receive errors are logged and discovery carries on.
pub async fn run(config: DiscoveryConfig, tx: mpsc::Sender<Message>) -> Result<(), Error> {
    let socket = UdpSocket::bind(config.bind).await?;
    socket.set_broadcast(true)?;
    info!("listening on {}", socket.local_addr()?);

    let mut discovery = Discovery::new(config, Outbox::default(), TokioScheduler::default());
    if let Err(e) = discovery.start() {
        warn!("first broadcast failed: {}", e);
    }
    let queued = discovery.transport().drain();
    flush(&socket, queued).await;

    let mut buf = vec![0u8; RECV_BUF_SIZE];
    loop {
        let deadline = discovery.scheduler().next_deadline();
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("receive failed: {}", e);
                        continue;
                    }
                };
                let received = discovery.on_datagram(&buf[..len], from);
                if let Some(e) = received.send_error {
                    warn!("while handling datagram from {}: {}", from, e);
                }
                let queued = discovery.transport().drain();
                flush(&socket, queued).await;
                if let Some(msg) = received.message {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            timer = wait_for(deadline) => {
                discovery.scheduler_mut().fired(timer);
                if let Err(e) = discovery.on_timer(timer) {
                    warn!("broadcast failed: {}", e);
                }
                let queued = discovery.transport().drain();
                flush(&socket, queued).await;
            }
            _ = tx.closed() => break,
        }
    }

    discovery.stop();
    debug!("discovery loop finished");
    Ok(())
}
