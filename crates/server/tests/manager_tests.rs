//! Device manager lifecycle tests
//!
//! Drives the manager and the event demultiplexer exactly as the worker
//! thread does, with scripted in-memory transports instead of USB. Covers
//! the hotplug scenarios: attach/scan/detach ordering, rejection of foreign
//! devices, and duplicate arrivals.

use std::sync::Arc;
use std::time::{Duration, Instant};

use snapi::Event;
use snapi_bridge::scanner::{
    command_channel, spawn_event_demux, ScannerCommand, ScannerManager,
};
use snapi_common::event_channel;
use snapi_common::test_utils::{
    other_device_desc, small_scan_report, snapi_device_desc, MockTransport, DEFAULT_TEST_TIMEOUT,
};

fn recv_event(rx: &async_channel::Receiver<Event>, timeout: Duration) -> Event {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.try_recv() {
            Ok(event) => return event,
            Err(async_channel::TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "timed out waiting for event");
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(async_channel::TryRecvError::Closed) => panic!("event channel closed"),
        }
    }
}

fn recv_command(
    rx: &async_channel::Receiver<ScannerCommand>,
    timeout: Duration,
) -> ScannerCommand {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.try_recv() {
            Ok(command) => return command,
            Err(async_channel::TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "timed out waiting for command");
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(async_channel::TryRecvError::Closed) => panic!("command channel closed"),
        }
    }
}

fn assert_quiet(rx: &async_channel::Receiver<Event>, duration: Duration) {
    std::thread::sleep(duration);
    if let Ok(event) = rx.try_recv() {
        panic!("expected no event, got {:?}", event);
    }
}

struct Harness {
    manager: ScannerManager,
    outer_rx: async_channel::Receiver<Event>,
    commands_rx: async_channel::Receiver<ScannerCommand>,
}

fn harness() -> Harness {
    let (core_tx, core_rx) = event_channel();
    let (outer_tx, outer_rx) = event_channel();
    let (commands_tx, commands_rx) = command_channel();
    let _ = spawn_event_demux(core_rx, commands_tx, outer_tx);

    Harness {
        manager: ScannerManager::new(core_tx),
        outer_rx,
        commands_rx,
    }
}

impl Harness {
    /// Pull the engine-closed command the demultiplexer rerouted and feed it
    /// back to the manager, as the worker thread would.
    fn finalize_close(&mut self) {
        match recv_command(&self.commands_rx, DEFAULT_TEST_TIMEOUT) {
            ScannerCommand::EngineClosed { key } => {
                self.manager
                    .handle_command(ScannerCommand::EngineClosed { key });
            }
            _ => panic!("expected engine-closed command"),
        }
    }
}

#[test]
fn hotplug_lifecycle_orders_attach_scan_detach() {
    // S5: arrival, one scan, departure. The outer stream must read
    // attached < scan < detached.
    let mut h = harness();
    let desc = snapi_device_desc(1, 4);
    let transport = MockTransport::scripted(vec![small_scan_report(1, 0, 8, b"012345678901AB")]);

    h.manager.handle_command(ScannerCommand::Arrived {
        desc: desc.clone(),
        transport: transport.clone(),
    });
    assert_eq!(h.manager.device_count(), 1);

    match recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT) {
        Event::DeviceAttached { device } => assert_eq!(device.key(), desc.key()),
        other => panic!("expected attach first, got {:?}", other),
    }
    match recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT) {
        Event::Scan { scan } => {
            assert_eq!(scan.primary_type, "upc-a");
            assert_eq!(scan.primary_data, b"012345678901");
        }
        other => panic!("expected scan second, got {:?}", other),
    }

    h.manager.handle_command(ScannerCommand::Departed { key: desc.key() });
    h.finalize_close();

    match recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT) {
        Event::DeviceDetached { device } => assert_eq!(device.key(), desc.key()),
        other => panic!("expected detach last, got {:?}", other),
    }
    assert_eq!(h.manager.device_count(), 0);
    assert!(transport.is_closed());
}

#[test]
fn foreign_device_is_rejected_and_not_retained() {
    // S6: an arrival for the wrong vendor/product produces no event, no
    // engine, and the transport handle is released.
    let mut h = harness();
    let transport = MockTransport::scripted(vec![]);

    h.manager.handle_command(ScannerCommand::Arrived {
        desc: other_device_desc(1, 9),
        transport: transport.clone(),
    });

    assert_eq!(h.manager.device_count(), 0);
    assert_quiet(&h.outer_rx, Duration::from_millis(100));
    // Only the test still holds the transport.
    assert_eq!(Arc::strong_count(&transport), 1);
}

#[test]
fn duplicate_arrival_is_rejected() {
    let mut h = harness();
    let desc = snapi_device_desc(1, 4);
    let first = MockTransport::scripted(vec![]);
    let second = MockTransport::scripted(vec![]);

    h.manager.handle_command(ScannerCommand::Arrived {
        desc: desc.clone(),
        transport: first,
    });
    h.manager.handle_command(ScannerCommand::Arrived {
        desc: desc.clone(),
        transport: second.clone(),
    });

    assert_eq!(h.manager.device_count(), 1);
    assert!(matches!(
        recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT),
        Event::DeviceAttached { .. }
    ));
    assert_quiet(&h.outer_rx, Duration::from_millis(100));
    assert_eq!(Arc::strong_count(&second), 1);

    h.manager.handle_command(ScannerCommand::Departed { key: desc.key() });
    h.finalize_close();
}

#[test]
fn departure_of_unknown_device_is_ignored() {
    let mut h = harness();
    h.manager.handle_command(ScannerCommand::Departed {
        key: snapi::DeviceKey::new(7, 7),
    });
    assert_quiet(&h.outer_rx, Duration::from_millis(50));
}

#[test]
fn read_failure_detaches_without_departure_event() {
    // Unplugging often surfaces as a read error before the hotplug
    // departure: the engine closes itself and the manager finalizes from
    // the rerouted closed event alone.
    let mut h = harness();
    let desc = snapi_device_desc(2, 11);
    let transport = MockTransport::disconnecting(vec![]);

    h.manager.handle_command(ScannerCommand::Arrived {
        desc: desc.clone(),
        transport: transport.clone(),
    });
    assert!(matches!(
        recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT),
        Event::DeviceAttached { .. }
    ));

    h.finalize_close();

    match recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT) {
        Event::DeviceDetached { device } => assert_eq!(device.key(), desc.key()),
        other => panic!("expected detach, got {:?}", other),
    }
    assert_eq!(h.manager.device_count(), 0);
}

#[test]
fn shutdown_closes_every_engine() {
    let mut h = harness();
    let first = MockTransport::scripted(vec![]);
    let second = MockTransport::scripted(vec![]);

    h.manager.handle_command(ScannerCommand::Arrived {
        desc: snapi_device_desc(1, 4),
        transport: first.clone(),
    });
    h.manager.handle_command(ScannerCommand::Arrived {
        desc: snapi_device_desc(1, 5),
        transport: second.clone(),
    });
    recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT);
    recv_event(&h.outer_rx, DEFAULT_TEST_TIMEOUT);

    h.manager.shutdown();
    h.finalize_close();
    h.finalize_close();

    assert!(first.is_closed());
    assert!(second.is_closed());
    assert_eq!(h.manager.device_count(), 0);
}
