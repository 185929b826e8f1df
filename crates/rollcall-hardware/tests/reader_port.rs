//! Integration tests for reader selection and the port state machine.
//!
//! Run with: cargo test --package rollcall-hardware --test reader_port

use rollcall_core::{Severity, StatusBus, StatusKind, TagUid};
use rollcall_hardware::mock::MockReader;
use rollcall_hardware::{
    BackendKind, PollOutcome, PortState, ReaderConfig, ReaderPort, ReaderSelector, ndef,
};
use std::time::Duration;

fn config() -> ReaderConfig {
    ReaderConfig::mock()
        .with_poll_timeout(Duration::from_millis(100))
        .with_reconnect_interval(Duration::from_secs(2))
}

#[tokio::test(start_paused = true)]
async fn test_station_boots_before_reader_is_plugged_in() {
    let (mock, handle) = MockReader::new();
    handle.disconnect();

    let config = config();
    let selected = ReaderSelector::new(config.clone())
        .with_mock(mock)
        .select()
        .await;
    let bus = StatusBus::new();
    let mut events = bus.subscribe();
    let mut port = ReaderPort::new(selected, &config).with_status(bus);

    assert!(matches!(port.state(), PortState::Disconnected { .. }));
    assert_eq!(port.poll().await, PollOutcome::Disconnected);

    handle.reconnect();
    tokio::time::advance(Duration::from_secs(3)).await;
    handle
        .present_tag(TagUid::new("04A1").unwrap())
        .await
        .unwrap();

    assert_eq!(
        port.poll().await,
        PollOutcome::Tag(TagUid::new("04A1").unwrap())
    );
    assert_eq!(port.backend(), BackendKind::Mock);

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, StatusKind::Reader);
    assert_eq!(event.severity, Severity::Success);
}

#[tokio::test(start_paused = true)]
async fn test_unplug_replug_cycle() {
    let (mock, handle) = MockReader::new();
    let config = config();
    let selected = ReaderSelector::new(config.clone())
        .with_mock(mock)
        .select()
        .await;
    let mut port = ReaderPort::new(selected, &config);
    assert!(port.is_ready());

    handle.disconnect();
    for _ in 0..50 {
        assert_eq!(port.poll().await, PollOutcome::Disconnected);
    }
    // one failing poll, then nothing until the reconnect interval
    assert_eq!(handle.hardware_calls(), 1);

    handle.reconnect();
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(port.poll().await, PollOutcome::NoTag);
    assert!(port.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_write_guest_payload() {
    let (mock, handle) = MockReader::new();
    let config = config();
    let mut port = ReaderPort::open(mock.into(), &config).await;

    handle
        .present_tag(TagUid::new("04A1B2C3").unwrap())
        .await
        .unwrap();
    let payload = ndef::text_message("1001").unwrap();
    let uid = port.write(None, &payload).await.unwrap();

    assert_eq!(uid.as_str(), "04A1B2C3");
    let writes = handle.writes();
    assert_eq!(
        ndef::parse_text_message(&writes[0].payload).as_deref(),
        Some("1001")
    );
}

#[cfg(feature = "hardware-serial")]
#[test]
fn test_serial_reader_futures_are_send() {
    use rollcall_hardware::backends::{Pn532Config, Pn532Reader};
    use rollcall_hardware::{AnyTagReader, SelectedReader, TagReader};

    fn assert_send<T: Send>(_: &T) {}

    let mut reader = AnyTagReader::from(Pn532Reader::new(Pn532Config::default()));
    let poll = reader.poll(Duration::from_millis(10));
    assert_send(&poll);
    drop(poll);

    let mut port = ReaderPort::new(SelectedReader { reader, info: None }, &config());
    let outcome = port.poll();
    assert_send(&outcome);
}
