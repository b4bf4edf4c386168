//! Finding lights on the local network.
//!
//! [Discovery] broadcasts a [MessageType::GetService] every [BROADCAST_INTERVAL] and, whenever a
//! device answers with a [MessageType::StateService], asks that device for its light state and
//! power level.  It doesn't own a socket or a clock: outbound datagrams go through a
//! [Transport], and the repeat timer goes through a [Scheduler].  Whoever drives it feeds
//! "datagram received" and "timer fired" events in one at a time.  See [crate::udp] for a tokio
//! driver.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::{debug, info, warn};

use crate::body::Body;
use crate::header::{Header, MessageType};
use crate::msg::Message;
use crate::{Error, DEFAULT_PORT};

/// Time between two GetService broadcasts.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

/// Something that can send a datagram.
pub trait Transport {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

/// Handle for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Something that can fire a timer after a delay.
///
/// When a timer fires, the driver calls [Discovery::on_timer] with its id.  A cancelled timer
/// must not fire.
pub trait Scheduler {
    fn schedule_after(&mut self, delay: Duration) -> TimerId;
    fn cancel(&mut self, timer: TimerId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// No timer armed.
    Idle,
    /// The repeat timer is armed and the latest broadcast has gone out.
    Broadcasting { timer: TimerId, broadcasts: u64 },
}

/// The outcome of [Discovery::on_datagram].
#[derive(Debug, Default)]
pub struct Received {
    /// The message, unless the datagram was too short to be one.
    pub message: Option<Message>,
    /// The first error hit while sending follow-up queries.
    pub send_error: Option<Error>,
}

/// Settings for a discovery session.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Where GetService broadcasts are sent.
    pub broadcast: SocketAddr,
    /// Local address to listen on.  Only used by drivers that open their own socket.
    pub bind: SocketAddr,
    /// Source identifier written into every outbound header.
    ///
    /// With a zero source, devices may answer with a broadcast instead of a unicast.
    pub source: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            broadcast: SocketAddr::from((Ipv4Addr::BROADCAST, DEFAULT_PORT)),
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            source: 0,
        }
    }
}

/// The discovery state machine.
pub struct Discovery<T, S> {
    config: DiscoveryConfig,
    transport: T,
    scheduler: S,
    state: DiscoveryState,
    sequence: u8,
}

impl<T: Transport, S: Scheduler> Discovery<T, S> {
    pub fn new(config: DiscoveryConfig, transport: T, scheduler: S) -> Discovery<T, S> {
        Discovery {
            config,
            transport,
            scheduler,
            state: DiscoveryState::Idle,
            sequence: 0,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Sends the first broadcast and arms the repeat timer.  Does nothing if already running.
    ///
    /// The timer is armed before anything is sent, so a send error leaves discovery running.
    pub fn start(&mut self) -> Result<(), Error> {
        if let DiscoveryState::Broadcasting { .. } = self.state {
            return Ok(());
        }
        let timer = self.scheduler.schedule_after(BROADCAST_INTERVAL);
        self.state = DiscoveryState::Broadcasting {
            timer,
            broadcasts: 0,
        };
        self.broadcast()
    }

    /// Cancels the repeat timer.
    pub fn stop(&mut self) {
        if let DiscoveryState::Broadcasting { timer, .. } = self.state {
            self.scheduler.cancel(timer);
            self.state = DiscoveryState::Idle;
            debug!("discovery stopped");
        }
    }

    /// Handles a timer firing.  Timers other than the armed one are ignored.
    pub fn on_timer(&mut self, fired: TimerId) -> Result<(), Error> {
        match self.state {
            DiscoveryState::Broadcasting { timer, broadcasts } if timer == fired => {
                let timer = self.scheduler.schedule_after(BROADCAST_INTERVAL);
                self.state = DiscoveryState::Broadcasting { timer, broadcasts };
                self.broadcast()
            }
            _ => {
                debug!("ignoring stale timer {:?}", fired);
                Ok(())
            }
        }
    }

    /// Handles a datagram received from `from`.
    ///
    /// A datagram too short to be a message is dropped with a warning and gives no message.
    /// Anything else is handed back in [Received::message] for the caller to consume.  A
    /// StateService answer also triggers GetLight and GetPowerLight queries to the device that
    /// sent it; the first failure to send those lands in [Received::send_error], next to the
    /// message.
    pub fn on_datagram(&mut self, data: &[u8], from: SocketAddr) -> Received {
        let msg = Message::from_bytes(data, Some(from));
        let (header, body) = match msg.decode() {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("dropping datagram from {}: {}", from, e);
                return Received::default();
            }
        };
        debug!("{} {} from {}", header, body, from);

        let mut send_error = None;
        if let Body::StateService(service) = &body {
            info!(
                "found device {:016X} at {} (service {}, port {})",
                header.target, from, service.service, service.port
            );
            let light = self.query(MessageType::GetLight, header.target, from);
            let power = self.query(MessageType::GetPowerLight, header.target, from);
            send_error = light.and(power).err();
        }
        Received {
            message: Some(msg),
            send_error,
        }
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    fn broadcast(&mut self) -> Result<(), Error> {
        if let DiscoveryState::Broadcasting { broadcasts, .. } = &mut self.state {
            *broadcasts += 1;
        }
        let mut header = Header::make(MessageType::GetService);
        header.source = self.config.source;
        header.sequence = self.next_seq();
        let dest = self.config.broadcast;
        info!("broadcasting GetService to {}", dest);
        self.send(&header, dest)
    }

    fn query(&mut self, typ: MessageType, target: u64, dest: SocketAddr) -> Result<(), Error> {
        let mut header = Header::make(typ);
        header.source = self.config.source;
        header.sequence = self.next_seq();
        header.target = target;
        header.tagged = target == 0;
        debug!("sending {} to {}", typ, dest);
        self.send(&header, dest)
    }

    fn send(&mut self, header: &Header, dest: SocketAddr) -> Result<(), Error> {
        let msg = Message::encode(header, None, Some(dest))?;
        if let Err(e) = self.transport.send_to(msg.as_bytes(), dest) {
            warn!("failed to send {} to {}: {}", header.typ, dest, e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::StateService;
    use crate::header::BuildOptions;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct ManualScheduler {
        now: Duration,
        next_id: u64,
        pending: Vec<(TimerId, Duration)>,
    }

    impl ManualScheduler {
        /// Moves the clock forward, returning the timers that are now due, in order.
        fn advance(&mut self, by: Duration) -> Vec<TimerId> {
            self.now += by;
            let now = self.now;
            let mut due: Vec<(TimerId, Duration)> =
                self.pending.iter().copied().filter(|&(_, at)| at <= now).collect();
            self.pending.retain(|&(_, at)| at > now);
            due.sort_by_key(|&(_, at)| at);
            due.into_iter().map(|(id, _)| id).collect()
        }
    }

    impl Scheduler for ManualScheduler {
        fn schedule_after(&mut self, delay: Duration) -> TimerId {
            self.next_id += 1;
            let id = TimerId(self.next_id);
            self.pending.push((id, self.now + delay));
            id
        }

        fn cancel(&mut self, timer: TimerId) {
            self.pending.retain(|&(id, _)| id != timer);
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<(Header, SocketAddr)>>,
        fail: Cell<bool>,
    }

    impl RecordingTransport {
        fn take(&self) -> Vec<(Header, SocketAddr)> {
            self.sent.borrow_mut().drain(..).collect()
        }
    }

    impl Transport for RecordingTransport {
        fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
            if self.fail.get() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "network unreachable",
                ));
            }
            let header = Header::unpack(buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            assert_eq!(usize::from(header.size), buf.len());
            self.sent.borrow_mut().push((header, addr));
            Ok(buf.len())
        }
    }

    fn device() -> SocketAddr {
        "192.168.1.40:56700".parse().unwrap()
    }

    fn new_discovery() -> Discovery<RecordingTransport, ManualScheduler> {
        let config = DiscoveryConfig {
            source: 0xabcd,
            ..Default::default()
        };
        Discovery::new(
            config,
            RecordingTransport::default(),
            ManualScheduler::default(),
        )
    }

    fn state_service(target: u64) -> Vec<u8> {
        let header = Header::build(
            &BuildOptions {
                target: Some(target),
                source: 0xabcd,
                ..Default::default()
            },
            MessageType::StateService,
        );
        let body = Body::from(StateService {
            service: 1,
            port: 56700,
        });
        Message::encode(&header, Some(&body), None)
            .unwrap()
            .into_bytes()
    }

    #[test]
    fn test_start_broadcasts() {
        let mut disco = new_discovery();
        assert_eq!(disco.state(), DiscoveryState::Idle);
        disco.start().unwrap();

        let sent = disco.transport().take();
        assert_eq!(sent.len(), 1);
        let (header, dest) = sent[0];
        assert_eq!(header.typ, MessageType::GetService);
        assert!(header.tagged);
        assert_eq!(header.target, 0);
        assert_eq!(header.source, 0xabcd);
        assert_eq!(dest, "255.255.255.255:56700".parse().unwrap());
        assert!(matches!(
            disco.state(),
            DiscoveryState::Broadcasting { broadcasts: 1, .. }
        ));

        // starting twice changes nothing
        disco.start().unwrap();
        assert!(disco.transport().take().is_empty());
    }

    #[test]
    fn test_repeats_every_interval() {
        let mut disco = new_discovery();
        disco.start().unwrap();
        disco.transport().take();

        assert!(disco
            .scheduler_mut()
            .advance(BROADCAST_INTERVAL - Duration::from_millis(1))
            .is_empty());

        for round in 2..5 {
            let due = disco.scheduler_mut().advance(Duration::from_secs(5));
            assert_eq!(due.len(), 1);
            disco.on_timer(due[0]).unwrap();
            let sent = disco.transport().take();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0.typ, MessageType::GetService);
            assert!(matches!(
                disco.state(),
                DiscoveryState::Broadcasting { broadcasts, .. } if broadcasts == round
            ));
        }
    }

    #[test]
    fn test_state_service_triggers_queries() {
        let mut disco = new_discovery();
        disco.start().unwrap();
        disco.transport().take();

        let received = disco.on_datagram(&state_service(0xd073d5121af1), device());
        assert!(received.send_error.is_none());
        let msg = received.message.unwrap();
        assert_eq!(msg.peer(), Some(device()));

        let sent = disco.transport().take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0.typ, MessageType::GetLight);
        assert_eq!(sent[1].0.typ, MessageType::GetPowerLight);
        for (header, dest) in &sent {
            assert_eq!(*dest, device());
            assert_eq!(header.target, 0xd073d5121af1);
            assert!(!header.tagged);
            assert_eq!(header.source, 0xabcd);
        }
        assert_ne!(sent[0].0.sequence, sent[1].0.sequence);

        // the broadcast timer is untouched, and fires 5 seconds after start
        assert!(disco
            .scheduler_mut()
            .advance(Duration::from_millis(4999))
            .is_empty());
        let due = disco.scheduler_mut().advance(Duration::from_millis(1));
        assert_eq!(due.len(), 1);
        disco.on_timer(due[0]).unwrap();
        assert_eq!(disco.transport().take()[0].0.typ, MessageType::GetService);
    }

    #[test]
    fn test_repeated_answers_are_not_deduplicated() {
        let mut disco = new_discovery();
        disco.start().unwrap();
        disco.transport().take();

        let datagram = state_service(1);
        disco.on_datagram(&datagram, device());
        disco.on_datagram(&datagram, device());
        assert_eq!(disco.transport().take().len(), 4);
    }

    #[test]
    fn test_other_messages_are_handed_back() {
        let mut disco = new_discovery();
        let header = Header::make(MessageType::StatePowerLight);
        let body = Body::from(crate::body::StatePower {
            level: 65535,
            port: 0,
        });
        let bytes = Message::encode(&header, Some(&body), None)
            .unwrap()
            .into_bytes();

        let msg = disco.on_datagram(&bytes, device()).message.unwrap();
        assert_eq!(msg.as_bytes(), &bytes[..]);
        assert!(disco.transport().take().is_empty());
    }

    #[test]
    fn test_malformed_datagram_is_dropped() {
        let mut disco = new_discovery();
        disco.start().unwrap();
        disco.transport().take();

        assert!(disco.on_datagram(&[0x24, 0x00, 0x00], device()).message.is_none());
        assert!(disco.on_datagram(&[], device()).message.is_none());
        assert!(disco.transport().take().is_empty());
        assert!(matches!(disco.state(), DiscoveryState::Broadcasting { .. }));
    }

    #[test]
    fn test_send_errors_keep_the_timer() {
        let mut disco = new_discovery();
        disco.transport().fail.set(true);
        assert!(matches!(disco.start(), Err(Error::Io(_))));
        assert!(matches!(disco.state(), DiscoveryState::Broadcasting { .. }));
        let received = disco.on_datagram(&state_service(1), device());
        assert!(matches!(received.send_error, Some(Error::Io(_))));

        let due = disco.scheduler_mut().advance(BROADCAST_INTERVAL);
        assert!(disco.on_timer(due[0]).is_err());

        disco.transport().fail.set(false);
        let due = disco.scheduler_mut().advance(BROADCAST_INTERVAL);
        assert_eq!(due.len(), 1);
        disco.on_timer(due[0]).unwrap();
        assert_eq!(disco.transport().take().len(), 1);
    }

    #[test]
    fn test_state_service_survives_failed_queries() {
        let mut disco = new_discovery();
        disco.transport().fail.set(true);

        let datagram = state_service(0xd073d5121af1);
        let received = disco.on_datagram(&datagram, device());
        assert!(matches!(received.send_error, Some(Error::Io(_))));

        let msg = received.message.unwrap();
        assert_eq!(msg.as_bytes(), &datagram[..]);
        let (_, body) = msg.decode().unwrap();
        assert!(matches!(body, Body::StateService(_)));
    }

    #[test]
    fn test_stop() {
        let mut disco = new_discovery();
        disco.start().unwrap();
        let timer = match disco.state() {
            DiscoveryState::Broadcasting { timer, .. } => timer,
            DiscoveryState::Idle => panic!("not started"),
        };
        disco.stop();
        assert_eq!(disco.state(), DiscoveryState::Idle);
        assert!(disco.scheduler_mut().advance(Duration::from_secs(60)).is_empty());

        // a timer that fires late is ignored
        disco.transport().take();
        disco.on_timer(timer).unwrap();
        assert!(disco.transport().take().is_empty());
        assert_eq!(disco.state(), DiscoveryState::Idle);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut disco = new_discovery();
        for _ in 0..300 {
            disco.next_seq();
        }
        assert_eq!(disco.next_seq(), (300 % 256) as u8);
    }
}
