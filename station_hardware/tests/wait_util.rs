use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use station_hardware::error::HwError;
use station_hardware::util::{EdgeDetector, wait_until_low_with_timeout};

#[test]
fn wait_until_low_success_path() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    // Flip low after a short delay
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(50),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_until_low_timeout_path() {
    let high = Arc::new(AtomicBool::new(true));

    let err = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn edge_detector_accepts_single_press() {
    let mut det = EdgeDetector::new(Duration::from_millis(50));
    let t0 = Instant::now();
    assert!(!det.update(true, t0));
    assert!(det.update(false, t0 + Duration::from_millis(1)));
    // held down: no repeat
    assert!(!det.update(false, t0 + Duration::from_millis(200)));
}

#[test]
fn edge_detector_drops_bounce() {
    let mut det = EdgeDetector::new(Duration::from_millis(50));
    let t0 = Instant::now();
    assert!(det.update(false, t0));
    assert!(!det.update(true, t0 + Duration::from_millis(2)));
    assert!(!det.update(false, t0 + Duration::from_millis(4)));
    // released and pressed again well after the window
    assert!(!det.update(true, t0 + Duration::from_millis(100)));
    assert!(det.update(false, t0 + Duration::from_millis(120)));
}
