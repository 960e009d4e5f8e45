mod tests {
    use std::io;
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;

    use embassy_time::Instant;
    use myrtio_light_sync::network::worker::{self, DatagramSocket};
    use myrtio_light_sync::network::{
        DecodeError, DeviceId, FRAME_LEN, Inbox, Network, NetworkLink, NetworkMessage,
        NetworkStatus, SharedNetwork, decode, encode,
    };
    use myrtio_light_sync::pattern::PatternId;

    fn message(precedence: u32) -> NetworkMessage {
        NetworkMessage {
            originator: DeviceId::from_u64(0xA1),
            sender: DeviceId::from_u64(0xB2),
            precedence,
            pattern: PatternId::from_raw(0x1234_5671),
            elapsed_ms: 4_321,
            hops: 2,
        }
    }

    #[test]
    fn test_decode_restores_fields() {
        let original = message(77);
        let frame = encode(&original);
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(decode(&frame), Ok(original));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut padded = encode(&message(1)).to_vec();
        padded.extend_from_slice(&[0xEE; 10]);
        assert_eq!(decode(&padded), Ok(message(1)));
    }

    #[test]
    fn test_decode_errors() {
        let frame = encode(&message(1));
        assert_eq!(decode(&frame[..27]), Err(DecodeError::TooShort(27)));
        assert_eq!(decode(&[]), Err(DecodeError::TooShort(0)));

        let mut bad_magic = frame;
        bad_magic[0] = b'X';
        assert_eq!(decode(&bad_magic), Err(DecodeError::BadMagic));

        let mut bad_version = frame;
        bad_version[2] = 2;
        assert_eq!(decode(&bad_version), Err(DecodeError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_device_id_display_and_order() {
        let id = DeviceId::new([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);
        assert_eq!(id.to_string(), "de:ad:be:ef:00:01");
        assert_eq!(DeviceId::from_u64(id.as_u64()), id);
        assert!(DeviceId::from_u64(0x0100) > DeviceId::from_u64(0x00FF));
    }

    #[test]
    fn test_link_drops_malformed_frames() {
        let link: NetworkLink<4> = NetworkLink::new(DeviceId::from_u64(1), false);
        let mut network = SharedNetwork::new("test", &link);

        link.deliver_frame(&[0u8; 5], Instant::from_millis(1));
        link.deliver_frame(&encode(&message(9)), Instant::from_millis(2));

        let mut inbox = Inbox::new();
        network.poll_received(Instant::from_millis(3), &mut inbox);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, message(9));
        assert_eq!(inbox[0].received_at, Instant::from_millis(2));
    }

    #[test]
    fn test_link_keeps_newest_when_full() {
        let link: NetworkLink<2> = NetworkLink::new(DeviceId::from_u64(1), false);
        let mut network = SharedNetwork::new("test", &link);
        for precedence in 1..=3 {
            link.deliver_frame(&encode(&message(precedence)), Instant::from_millis(0));
        }

        let mut inbox = Inbox::new();
        network.poll_received(Instant::from_millis(1), &mut inbox);
        let kept: Vec<u32> = inbox.iter().map(|r| r.message.precedence).collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[test]
    fn test_link_outbound_slot_holds_latest() {
        let link: NetworkLink<2> = NetworkLink::new(DeviceId::from_u64(1), true);
        let mut network = SharedNetwork::new("test", &link);
        assert!(network.should_echo());

        network.try_send(&message(1));
        network.try_send(&message(2));
        let frame = link.take_outbound().unwrap();
        assert_eq!(decode(&frame), Ok(message(2)));
        assert!(link.take_outbound().is_none());
    }

    #[test]
    fn test_link_status_round_trip() {
        let link: NetworkLink<2> = NetworkLink::new(DeviceId::from_u64(1), false);
        let mut network = SharedNetwork::new("test", &link);

        let status = network.update(NetworkStatus::Connected, Instant::from_millis(0));
        assert_eq!(status, NetworkStatus::Disconnected);
        assert_eq!(link.wanted_status(), NetworkStatus::Connected);

        link.set_status(NetworkStatus::Connected);
        assert!(network.update(NetworkStatus::Connected, Instant::from_millis(1)).is_connected());
    }

    /// Socket backed by channels: frames sent go to `sent`, frames pushed
    /// into `incoming` are received.
    struct ChannelSocket {
        incoming: Receiver<Vec<u8>>,
        sent: Sender<Vec<u8>>,
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl DatagramSocket for ChannelSocket {
        fn connect(&mut self) -> io::Result<()> {
            self.events.lock().unwrap().push("connect");
            Ok(())
        }

        fn send(&mut self, frame: &[u8]) -> io::Result<()> {
            self.sent
                .send(frame.to_vec())
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn recv_timeout(&mut self, buf: &mut [u8], timeout: StdDuration) -> io::Result<Option<usize>> {
            match self.incoming.recv_timeout(timeout) {
                Ok(frame) => {
                    let len = frame.len().min(buf.len());
                    buf[..len].copy_from_slice(&frame[..len]);
                    Ok(Some(len))
                }
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
                }
            }
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push("close");
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            std::thread::sleep(StdDuration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_worker_moves_frames_both_ways() {
        let (incoming_tx, incoming_rx) = mpsc::channel();
        let (sent_tx, sent_rx) = mpsc::channel();
        let events = Arc::new(Mutex::new(Vec::new()));
        let socket = ChannelSocket {
            incoming: incoming_rx,
            sent: sent_tx,
            events: Arc::clone(&events),
        };

        let link: Arc<NetworkLink<8>> = Arc::new(NetworkLink::new(DeviceId::from_u64(0xB2), false));
        let handle =
            worker::spawn("test", socket, Arc::clone(&link), StdDuration::from_millis(5)).unwrap();
        let mut network = SharedNetwork::new("test", &*link);

        assert!(wait_until(|| {
            network.update(NetworkStatus::Connected, Instant::from_millis(0)).is_connected()
        }));

        network.try_send(&message(5));
        let sent = sent_rx.recv_timeout(StdDuration::from_secs(1)).unwrap();
        assert_eq!(decode(&sent), Ok(message(5)));

        incoming_tx.send(encode(&message(6)).to_vec()).unwrap();
        incoming_tx.send(vec![1, 2, 3]).unwrap();
        let mut inbox = Inbox::new();
        assert!(wait_until(|| {
            network.poll_received(Instant::from_millis(1), &mut inbox);
            !inbox.is_empty()
        }));
        assert_eq!(inbox[0].message, message(6));

        handle.shutdown();
        assert!(!handle.is_running());
        assert_eq!(link.status(), NetworkStatus::Disconnected);
        assert_eq!(*events.lock().unwrap(), vec!["connect", "close"]);
    }

    #[test]
    fn test_worker_shutdown_is_idempotent() {
        let (_incoming_tx, incoming_rx) = mpsc::channel();
        let (sent_tx, _sent_rx) = mpsc::channel();
        let socket = ChannelSocket {
            incoming: incoming_rx,
            sent: sent_tx,
            events: Arc::new(Mutex::new(Vec::new())),
        };
        let link: Arc<NetworkLink<2>> = Arc::new(NetworkLink::new(DeviceId::from_u64(1), false));
        let handle = Arc::new(
            worker::spawn("test", socket, Arc::clone(&link), StdDuration::from_millis(5)).unwrap(),
        );

        let other = Arc::clone(&handle);
        std::thread::spawn(move || other.shutdown()).join().unwrap();
        handle.shutdown();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_worker_stays_closed_when_not_wanted() {
        let (_incoming_tx, incoming_rx) = mpsc::channel();
        let (sent_tx, _sent_rx) = mpsc::channel();
        let events = Arc::new(Mutex::new(Vec::new()));
        let socket = ChannelSocket {
            incoming: incoming_rx,
            sent: sent_tx,
            events: Arc::clone(&events),
        };
        let link: Arc<NetworkLink<2>> = Arc::new(NetworkLink::new(DeviceId::from_u64(1), false));
        let handle =
            worker::spawn("idle", socket, Arc::clone(&link), StdDuration::from_millis(5)).unwrap();

        std::thread::sleep(StdDuration::from_millis(30));
        assert_eq!(link.status(), NetworkStatus::Disconnected);
        drop(handle);
        assert!(events.lock().unwrap().is_empty());
    }
}
