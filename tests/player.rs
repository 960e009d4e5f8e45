mod tests {
    use embassy_time::{Duration, Instant};
    use myrtio_light_sync::color::Rgb;
    use myrtio_light_sync::frame::PixelSink;
    use myrtio_light_sync::layout::{LayoutError, LayoutId, MatrixLayout, XYIndexStore};
    use myrtio_light_sync::network::{
        DeviceId, Inbox, LoopbackBus, Network, NetworkMessage, NetworkStatus,
    };
    use myrtio_light_sync::pattern::{EffectFamily, PatternId, PatternSchedule};
    use myrtio_light_sync::player::{DeviceRole, Player, PlayerConfig, PlayerError};
    use myrtio_light_sync::rng::CountingEntropy;
    use myrtio_light_sync::trigger::{ButtonEvent, TriggerChannel, TriggerIntent};

    const A: DeviceId = DeviceId::from_u64(0xA);
    const B: DeviceId = DeviceId::from_u64(0xB);

    type Bus = LoopbackBus<32>;
    type Store = XYIndexStore<2, 64>;

    fn config(base_precedence: u32) -> PlayerConfig {
        PlayerConfig {
            base_precedence,
            precedence_jitter: 0,
            ..PlayerConfig::default()
        }
    }

    fn player<'a>(id: DeviceId, base_precedence: u32, seed: u32) -> Player<'a, CountingEntropy, 2> {
        Player::new(
            id,
            config(base_precedence),
            PatternSchedule::default(),
            CountingEntropy::new(seed),
        )
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn store() -> Store {
        let mut store = Store::default();
        store.ingest_layout(&MatrixLayout::serpentine(8, 4)).unwrap();
        let viewport = store.viewport();
        store.finalize(viewport).unwrap();
        store
    }

    #[derive(Default)]
    struct RecordingSink {
        pixels: Vec<(LayoutId, usize, Rgb)>,
        flushes: usize,
    }

    impl PixelSink for RecordingSink {
        fn set_pixel_color(&mut self, layout: LayoutId, index: usize, color: Rgb) {
            self.pixels.push((layout, index, color));
        }

        fn flush(&mut self) {
            self.flushes += 1;
        }
    }

    fn message(originator: DeviceId, precedence: u32, pattern: u32, elapsed_ms: i32) -> NetworkMessage {
        NetworkMessage {
            originator,
            sender: originator,
            precedence,
            pattern: PatternId::from_raw(pattern),
            elapsed_ms,
            hops: 0,
        }
    }

    #[test]
    fn test_follower_aligns_to_reported_elapsed() {
        let bus = Bus::new();
        let mut network = bus.attach(B);
        let mut device_b = player(B, 3, 2);
        device_b.add_network(&mut network).unwrap();
        device_b.tick(at(1_000));

        bus.broadcast(&message(A, 5, 0xAB, 120));
        device_b.tick(at(1_120));

        assert_eq!(device_b.role(), DeviceRole::Follower);
        assert_eq!(device_b.pattern(), PatternId::from_raw(0xAB));
        assert_eq!(device_b.pattern_start_ms(), 1_000);
        assert_eq!(device_b.elapsed(at(1_120)), Duration::from_millis(120));
        assert_eq!(device_b.elapsed(at(1_131)), Duration::from_millis(131));
    }

    #[test]
    fn test_follower_keeps_leader_heard_through_relay() {
        let bus = Bus::new();
        let mut network = bus.attach(B);
        let mut device_b = player(B, 3, 7);
        device_b.add_network(&mut network).unwrap();
        let relay = DeviceId::from_u64(0xC);

        for ms in (0..=20_000u64).step_by(500) {
            let elapsed = i32::try_from(ms).unwrap();
            let direct = message(A, 5, 0xAB, elapsed);
            if ms <= 12_000 {
                bus.broadcast(&direct);
            } else {
                bus.broadcast(&NetworkMessage {
                    sender: relay,
                    hops: 1,
                    ..direct
                });
            }
            device_b.tick(at(ms));

            assert_eq!(device_b.role(), DeviceRole::Follower, "at {ms} ms");
            assert_eq!(device_b.pattern(), PatternId::from_raw(0xAB), "at {ms} ms");
            assert_eq!(device_b.pattern_start_ms(), 0);
        }
        assert_eq!(device_b.arbiter().followed().unwrap().hops, 1);
    }

    #[test]
    fn test_silence_returns_to_standalone() {
        let bus = Bus::new();
        let mut network = bus.attach(B);
        let mut device_c = player(B, 3, 3);
        device_c.add_network(&mut network).unwrap();

        bus.broadcast(&message(A, 5, 0xAB, 0));
        device_c.tick(at(0));
        assert_eq!(device_c.role(), DeviceRole::Follower);

        device_c.tick(at(2_000));
        assert_eq!(device_c.role(), DeviceRole::Follower);

        device_c.tick(at(3_500));
        assert_eq!(device_c.role(), DeviceRole::Standalone);
        device_c.tick(at(3_600));
        assert_eq!(device_c.role(), DeviceRole::Standalone);

        // Autonomous selection resumes once the adopted pattern ran its course.
        device_c.tick(at(10_000));
        assert_ne!(device_c.pattern(), PatternId::from_raw(0xAB));
    }

    #[test]
    fn test_lower_peer_makes_leader() {
        let bus = Bus::new();
        let mut network = bus.attach(A);
        let mut device = player(A, 50, 4);
        device.add_network(&mut network).unwrap();

        bus.broadcast(&message(B, 5, 0xB1, 0));
        device.tick(at(0));
        assert_eq!(device.role(), DeviceRole::Leader);
        assert_ne!(device.pattern(), PatternId::from_raw(0xB1));
    }

    #[test]
    fn test_two_devices_render_identically() {
        let bus = Bus::new();
        let mut network_a = bus.attach(A);
        let mut network_b = bus.attach(B);
        let mut device_a = player(A, 5_000, 10);
        let mut device_b = player(B, 1_000, 20);
        device_a.add_network(&mut network_a).unwrap();
        device_b.add_network(&mut network_b).unwrap();

        device_a.tick(at(0));
        device_b.tick(at(0));
        assert_eq!(device_b.role(), DeviceRole::Follower);
        assert_eq!(device_b.pattern(), device_a.pattern());

        // Hearing its own state relayed tells A it is leading.
        device_a.tick(at(10));
        assert_eq!(device_a.role(), DeviceRole::Leader);

        let store = store();
        for ms in [100, 733, 2_500] {
            let mut sink_a = RecordingSink::default();
            let mut sink_b = RecordingSink::default();
            let frame_a = device_a.render(at(ms), &store, &mut sink_a).unwrap();
            let frame_b = device_b.render(at(ms), &store, &mut sink_b).unwrap();

            assert_eq!(frame_a, frame_b);
            assert_eq!(sink_a.pixels.len(), 32);
            assert_eq!(sink_a.pixels, sink_b.pixels);
            assert_eq!(sink_a.flushes, 1);
        }
    }

    #[test]
    fn test_follower_relays_leader_state() {
        let bus = Bus::new();
        let mut network = bus.attach(B);
        let mut listener = bus.attach(DeviceId::from_u64(0xC));
        let mut device_b = player(B, 3, 5);
        device_b.add_network(&mut network).unwrap();

        bus.broadcast(&message(A, 5, 0xAB, 100));
        device_b.tick(at(1_000));

        listener.update(NetworkStatus::Connected, at(1_000));
        let mut inbox = Inbox::new();
        listener.poll_received(at(1_000), &mut inbox);

        let relayed = inbox
            .iter()
            .map(|received| received.message)
            .find(|message| message.sender == B)
            .unwrap();
        assert_eq!(relayed.originator, A);
        assert_eq!(relayed.precedence, 5);
        assert_eq!(relayed.hops, 1);
        assert_eq!(relayed.pattern, PatternId::from_raw(0xAB));
        assert_eq!(relayed.elapsed_ms, 100);
    }

    #[test]
    fn test_broadcast_cadence() {
        let bus = Bus::new();
        let mut network = bus.attach(A);
        let mut device = player(A, 5, 6);
        device.add_network(&mut network).unwrap();

        device.tick(at(0));
        assert_eq!(bus.sent_count(), 1);
        device.tick(at(100));
        device.tick(at(499));
        assert_eq!(bus.sent_count(), 1);
        device.tick(at(500));
        assert_eq!(bus.sent_count(), 2);

        // A local change is sent right away.
        device.next(at(600));
        device.tick(at(600));
        assert_eq!(bus.sent_count(), 3);
    }

    #[test]
    fn test_malformed_frames_are_ignored() {
        let bus = Bus::new();
        let mut network = bus.attach(A);
        let mut device = player(A, 5, 7);
        device.add_network(&mut network).unwrap();
        device.tick(at(0));
        let pattern = device.pattern();

        bus.broadcast_raw(&[1, 2, 3]);
        bus.broadcast_raw(&[0u8; 28]);
        let mut wrong_version = myrtio_light_sync::network::encode(&message(B, 99, 0xB1, 0));
        wrong_version[2] = 9;
        bus.broadcast_raw(&wrong_version);
        device.tick(at(50));

        assert_eq!(device.role(), DeviceRole::Standalone);
        assert_eq!(device.pattern(), pattern);
        assert_eq!(device.network_status(0), Some(NetworkStatus::Connected));
    }

    #[test]
    fn test_schedule_advances_and_loops() {
        let mut device = player(A, 5, 8);
        device.tick(at(0));
        let first = device.pattern();

        device.tick(at(9_999));
        assert_eq!(device.pattern(), first);
        device.tick(at(10_000));
        let second = device.pattern();
        assert_ne!(second, first);
        assert_eq!(device.elapsed(at(10_000)), Duration::from_millis(0));

        device.toggle_loop();
        assert!(device.is_looping());
        device.tick(at(30_000));
        assert_eq!(device.pattern(), second);
    }

    #[test]
    fn test_follower_does_not_rotate() {
        let bus = Bus::new();
        let mut network = bus.attach(B);
        let mut device = player(B, 3, 9);
        device.add_network(&mut network).unwrap();

        for ms in (0..=20_000).step_by(500) {
            bus.broadcast(&message(A, 5, 0xAB, ms as i32));
            device.tick(at(ms));
        }
        assert_eq!(device.role(), DeviceRole::Follower);
        assert_eq!(device.pattern(), PatternId::from_raw(0xAB));
    }

    #[test]
    fn test_triggers() {
        let channel: TriggerChannel<4> = TriggerChannel::new();
        let mut device = player(A, 5, 11);
        device.tick(at(0));
        let first = device.pattern();

        channel.try_send(ButtonEvent::ShortPress.into()).unwrap();
        device.process_triggers(&channel, at(100));
        assert_ne!(device.pattern(), first);
        assert!(device.local_precedence(at(100)) > 5);

        channel.try_send(TriggerIntent::Prev).unwrap();
        channel.try_send(ButtonEvent::Held.into()).unwrap();
        device.process_triggers(&channel, at(200));
        assert!(device.is_looping());
        assert!(channel.is_empty());

        let calibration = PatternId::CALIBRATION;
        channel.try_send(TriggerIntent::Play(calibration)).unwrap();
        device.process_triggers(&channel, at(300));
        assert_eq!(device.pattern(), calibration);
        assert_eq!(device.elapsed(at(300)), Duration::from_millis(0));
    }

    #[test]
    fn test_precedence_boost_decays() {
        let mut device = player(A, 100, 12);
        let boost = device.config().precedence_boost_duration.as_millis();
        assert_eq!(device.local_precedence(at(0)), 100);

        device.next(at(1_000));
        assert_eq!(device.local_precedence(at(1_000)), 100 + 1_000_000);
        let halfway = device.local_precedence(at(1_000 + boost / 2));
        assert_eq!(halfway, 100 + 500_000);
        assert_eq!(device.local_precedence(at(1_000 + boost)), 100);
    }

    #[test]
    fn test_trigger_takes_back_control() {
        let bus = Bus::new();
        let mut network_a = bus.attach(A);
        let mut network_b = bus.attach(B);
        let mut device_a = player(A, 5_000, 13);
        let mut device_b = player(B, 1_000, 14);
        device_a.add_network(&mut network_a).unwrap();
        device_b.add_network(&mut network_b).unwrap();

        device_a.tick(at(0));
        device_b.tick(at(0));
        assert_eq!(device_b.role(), DeviceRole::Follower);

        device_b.set_pattern(PatternId::new(EffectFamily::Sweep, 2), at(100));
        assert_eq!(device_b.role(), DeviceRole::Standalone);
        device_b.tick(at(100));
        device_a.tick(at(100));

        assert_eq!(device_a.role(), DeviceRole::Follower);
        assert_eq!(device_a.pattern(), PatternId::new(EffectFamily::Sweep, 2));

        device_b.tick(at(150));
        assert_eq!(device_b.role(), DeviceRole::Leader);
    }

    #[test]
    fn test_render_requires_finalized_store() {
        let mut device = player(A, 5, 15);
        device.tick(at(0));
        let store = Store::default();
        let mut sink = RecordingSink::default();
        assert_eq!(
            device.render(at(10), &store, &mut sink),
            Err(LayoutError::NotFinalized)
        );
        assert!(sink.pixels.is_empty());
    }

    #[test]
    fn test_black_renders_black() {
        let mut device = player(A, 5, 16);
        device.set_pattern(PatternId::BLACK, at(0));
        let store = store();
        let mut sink = RecordingSink::default();
        device.render(at(10), &store, &mut sink).unwrap();
        assert!(sink.pixels.iter().all(|(_, _, color)| *color == Rgb::new(0, 0, 0)));
    }

    #[test]
    fn test_too_many_networks() {
        let bus = Bus::new();
        let mut first = bus.attach(A);
        let mut second = bus.attach(A);
        let mut third = bus.attach(A);
        let mut device = player(A, 5, 17);
        device.add_network(&mut first).unwrap();
        device.add_network(&mut second).unwrap();
        assert_eq!(device.add_network(&mut third), Err(PlayerError::TooManyNetworks));
    }

    #[test]
    fn test_needs_restart_before_overflow() {
        let device = player(A, 5, 18);
        assert!(!device.needs_restart(at(1_000)));
        let overflow = i32::MAX as u64;
        assert!(device.needs_restart(at(overflow - 60_000)));
        assert!(!device.needs_restart(at(overflow - 2 * 3_600_000)));
    }
}
