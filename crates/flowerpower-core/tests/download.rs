//! End-to-end download tests against the mock device.
//!
//! These run the real driver, state machine, reassembly and decoder; only
//! the radio is simulated.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowerpower_core::{
    DownloadOptions, DownloadProgress, Error, MockFlowerPowerBuilder, RawData, State,
    download_history,
};
use flowerpower_types::{RxControl, TxStatus, merge};
use tokio_util::sync::CancellationToken;

const ADDRESS: &str = "A0:14:3D:00:00:2A";
const HOST_TIME: i64 = 1_600_000_000;

fn raw(index: u32) -> RawData {
    RawData {
        air_temperature: 700,
        soil_temperature: 710,
        soil_vwc: 1_400,
        light: 800 + index as u16,
    }
}

/// Records for indices `first..=last`.
fn records(first: u32, last: u32) -> Vec<RawData> {
    (first..=last).map(raw).collect()
}

fn options(host_time: i64) -> DownloadOptions {
    DownloadOptions::default().clock(Arc::new(move || host_time))
}

/// Ten records ending at index 96; 136 bytes in 8 fragments.
fn device() -> MockFlowerPowerBuilder {
    MockFlowerPowerBuilder::new()
        .address(ADDRESS)
        .device_time(86_400)
        .last_entry_index(96)
        .last_entry_time(86_100)
        .measurement_period(900)
        .session_id(4)
        .records(records(87, 96))
}

// --- Success ---

#[tokio::test]
async fn test_download_complete_history() {
    let device = device().ack_interval(3).build();
    assert_eq!(device.fragments().len(), 8);

    let log = download_history(&device, options(HOST_TIME)).await.unwrap();

    assert_eq!(log.address, ADDRESS);
    assert_eq!(log.session_id, 4);
    assert_eq!(log.measurement_period, 900);
    assert_eq!(log.first_entry_index, 87);
    assert_eq!(log.last_entry_index, 96);
    assert_eq!(log.len(), 10);

    for (offset, m) in log.measurements.iter().enumerate() {
        let index = 87 + offset as u32;
        assert_eq!(m.index, index);
        assert_eq!(m.raw, raw(index));
        let age = i64::from(96 - index) * 900;
        assert_eq!(m.timestamp, HOST_TIME - 86_400 + 86_100 - age);
    }

    assert_eq!(device.transfer_start_index().await, Some(87));
    assert_eq!(device.led_writes().await, vec![1, 0]);
    // 8 fragments in blocks of 3: two acknowledgements.
    assert_eq!(
        device.rx_writes().await,
        vec![
            RxControl::Receiving as u8,
            RxControl::Ack as u8,
            RxControl::Ack as u8
        ]
    );
    assert_eq!(device.disconnect_count(), 1);
}

#[tokio::test]
async fn test_download_single_block() {
    let device = device().build();
    let log = download_history(&device, options(HOST_TIME)).await.unwrap();
    assert_eq!(log.len(), 10);
    assert_eq!(device.rx_writes().await, vec![RxControl::Receiving as u8]);
}

#[tokio::test]
async fn test_download_cancels_stale_transfer_first() {
    let device = device()
        .initial_tx_status(TxStatus::AwaitingAck)
        .build();

    let log = download_history(&device, options(HOST_TIME)).await.unwrap();

    assert_eq!(log.len(), 10);
    let writes = device.rx_writes().await;
    assert_eq!(writes[0], RxControl::Cancel as u8);
    assert_eq!(writes[1], RxControl::Receiving as u8);
}

#[tokio::test]
async fn test_download_empty_history() {
    let device = MockFlowerPowerBuilder::new()
        .address(ADDRESS)
        .last_entry_index(96)
        .build();
    assert_eq!(device.fragments().len(), 1);

    let log = download_history(&device, options(HOST_TIME)).await.unwrap();
    assert!(log.is_empty());
    assert_eq!(log.first_entry_index, 97);
    assert_eq!(log.last_entry_index, 96);
}

#[tokio::test]
async fn test_progress_reported_per_fragment() {
    let device = device().ack_interval(4).build();
    let seen: Arc<Mutex<Vec<DownloadProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let options = options(HOST_TIME).with_progress(move |p| sink.lock().unwrap().push(p));
    download_history(&device, options).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 8);
    for (i, progress) in seen.iter().enumerate() {
        assert_eq!(progress.fragments, i as u32 + 1);
        assert_eq!(progress.expected_length, 136);
    }
    assert_eq!(seen[7].bytes_received, 136);
    assert_eq!(seen[7].fraction(), 1.0);
}

#[tokio::test]
async fn test_overlapping_downloads_merge() {
    // The same sensor read twice, one hour apart.
    let first = device().build();
    let second = device()
        .device_time(86_400 + 3_600)
        .last_entry_index(100)
        .last_entry_time(86_100 + 3_600)
        .records(records(91, 100))
        .build();

    let a = download_history(&first, options(HOST_TIME)).await.unwrap();
    let b = download_history(&second, options(HOST_TIME + 3_600))
        .await
        .unwrap();

    let merged = merge(&a, &b).unwrap();
    let indices: Vec<u32> = merged.measurements.iter().map(|m| m.index).collect();
    assert_eq!(indices, (87..=100).collect::<Vec<_>>());
    assert_eq!(merged.first_entry_index, 87);
}

// --- Failures ---

#[tokio::test]
async fn test_dropped_fragment_fails() {
    let device = device().drop_fragment(2).build();

    let err = download_history(&device, options(HOST_TIME))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Error::MissingFragment {
                sequence: 2,
                expected: 8
            }
        ),
        "unexpected error: {err}"
    );
    assert_eq!(device.disconnect_count(), 1);
}

#[tokio::test]
async fn test_disconnect_mid_transfer() {
    let device = device().ack_interval(3).disconnect_after_fragments(4).build();

    let err = download_history(&device, options(HOST_TIME))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Error::Disconnected {
                state: State::ReceivingBuffers
            }
        ),
        "unexpected error: {err}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stalled_device_times_out() {
    let device = device().stall_after_fragments(2).build();
    let options = options(HOST_TIME).stall_timeout(Duration::from_secs(30));

    let err = download_history(&device, options).await.unwrap_err();

    match err {
        Error::Timeout { duration, .. } => assert_eq!(duration, Duration::from_secs(30)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(device.fragments_sent().await, 2);
    assert_eq!(device.disconnect_count(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let device = device().build();
    let token = CancellationToken::new();
    token.cancel();

    let err = download_history(&device, options(HOST_TIME).cancel_token(token))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(device.led_writes().await, Vec::<u8>::new());
    assert_eq!(device.disconnect_count(), 1);
}

#[tokio::test]
async fn test_cancelled_mid_transfer() {
    let device = device().ack_interval(2).build();
    let token = CancellationToken::new();
    let trigger = token.clone();

    let options = options(HOST_TIME)
        .cancel_token(token)
        .with_progress(move |p| {
            if p.fragments >= 3 {
                trigger.cancel();
            }
        });

    let err = download_history(&device, options).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(device.fragments_sent().await < 8);
}

#[tokio::test]
async fn test_zero_light_record_fails_decode() {
    let mut recs = records(87, 96);
    recs[5].light = 0;
    let device = device().records(recs).build();

    let err = download_history(&device, options(HOST_TIME))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "unexpected error: {err}");
}
