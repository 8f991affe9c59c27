use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use stepgen_hardware::error::HwError;
use stepgen_hardware::util::wait_for_level;
use stepgen_hardware::SimulatedPins;
use stepgen_traits::ActuatorPins;

#[test]
fn wait_for_level_success_path() {
    let level = Arc::new(AtomicBool::new(false));
    let level_bg = level.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        level_bg.store(true, Ordering::Relaxed);
    });

    let res = wait_for_level(
        || Ok(level.load(Ordering::Relaxed)),
        true,
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_for_level_timeout_path() {
    let err = wait_for_level(
        || Ok(false),
        true,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");
    assert!(matches!(err, HwError::FeedbackTimeout), "got {err:?}");
}

#[test]
fn wait_for_level_returns_read_errors() {
    let err = wait_for_level(
        || Err(HwError::Gpio("line 21 busy".into())),
        true,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("read error");
    assert!(matches!(err, HwError::Gpio(_)));
}

#[test]
fn simulated_feedback_follows_enable() {
    let mut pins = SimulatedPins::new();
    pins.set_enabled(true).unwrap();
    let res = wait_for_level(
        || pins.clone().read_feedback().map_err(|e| HwError::Gpio(e.to_string())),
        true,
        Duration::from_millis(5),
        Duration::from_micros(100),
    );
    assert!(res.is_ok());
}
