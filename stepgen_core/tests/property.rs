use proptest::prelude::*;
use stepgen_core::{Phase, ProfileState, QFormat};

const ONE: i64 = 1 << 10;

prop_compose! {
    fn limits()(vel in 256i64..=50 * ONE, accel in 16i64..=50 * ONE) -> (i64, i64) {
        (vel, accel)
    }
}

fn configured(vel: i64, accel: i64, min: i64, max: i64) -> ProfileState {
    let mut s = ProfileState::new(QFormat::default());
    s.set_motion_limits(vel, accel).unwrap();
    s.set_position_limits(min, max).unwrap();
    s.enable();
    s
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn ordinary_moves_land_exactly((vel, accel) in limits(), d in -50_000i64..=50_000) {
        let mut s = configured(vel, accel, i64::MIN / 2, i64::MAX / 2);
        s.accept_move(d).unwrap();
        let mut ticks = 0u32;
        while !s.is_idle() {
            let burst = s.calc_steps();
            prop_assert!(burst >= 0);
            let snap = s.snapshot();
            let carried = snap.move_position - snap.emitted_steps;
            prop_assert!((0..ONE).contains(&carried), "carried {}", carried);
            prop_assert_eq!(snap.emitted_steps % ONE, 0);
            ticks += 1;
            prop_assert!(ticks < 2_000_000);
        }
        let snap = s.snapshot();
        prop_assert_eq!(snap.phase, Phase::Idle);
        prop_assert_eq!(snap.move_position, snap.target_position);
        prop_assert_eq!(s.current_position(), d);
    }

    #[test]
    fn bounded_stops_stay_inside_limits(
        (vel, accel) in limits(),
        d in 1i64..=50_000,
        max in 0i64..=60_000,
        stop_at in 0u32..2_000,
        stop_d in 0u32..=50_000,
    ) {
        let mut s = configured(vel, accel, 0, max);
        s.accept_move(d).unwrap();
        let mut requested_at = None;
        for tick in 0..4_000_000u32 {
            if tick == stop_at && !s.is_idle() {
                let pos = s.current_position();
                if s.begin_bounded_stop(stop_d).is_ok() {
                    requested_at = Some(pos);
                }
            }
            prop_assert!(s.calc_steps() >= 0);
            if s.is_idle() {
                break;
            }
        }
        prop_assert!(s.is_idle());
        let snap = s.snapshot();
        prop_assert_eq!(snap.move_position, snap.target_position);
        if let Some(pos) = requested_at {
            let end = s.current_position();
            prop_assert!(end <= pos + i64::from(stop_d).max(0) + 1);
            if pos <= max {
                prop_assert!(end <= max, "end {} max {}", end, max);
            }
        }
    }
}
