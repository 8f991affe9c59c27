//! Per-tick profile step.
//!
//! `ProfileState::calc_steps` runs once per tick from the tick context. It
//! never allocates or blocks and does a bounded amount of integer work. The
//! caller holds the critical section for the duration of the call.

use crate::fixed_point::{same_sign, stopping_accel};
use crate::state::{Phase, ProfileState};

/// Safety horizon for a bounded stop, in ticks.
pub const DECEL_SAFETY_TICKS: u32 = 550_000;

impl ProfileState {
    /// Advance the profile by one tick and return the number of step pulses
    /// to emit this tick. Returns 0 while disabled.
    pub fn calc_steps(&mut self) -> i32 {
        self.tick_now = self.tick_now.wrapping_add(1);
        if !self.enabled {
            return 0;
        }

        match self.phase {
            Phase::Idle => self.step_idle(),
            Phase::RampUp => self.step_ramp_up(),
            Phase::Cruise => self.step_cruise(),
            Phase::FastMove => self.step_fast_move(),
            Phase::DecelSetup => self.step_decel_setup(),
            Phase::DecelRun => self.step_decel_run(),
        }

        self.emit_burst()
    }

    fn step_idle(&mut self) {
        if self.pending_command == 0 {
            self.reset_motion();
            return;
        }

        self.reset_motion();
        self.target_position = self.q.to_scaled(i64::from(self.pending_command));
        self.half_distance = self.target_position.abs() >> 1;
        self.accel_ref_signed = if self.target_position < 0 {
            -self.accel_limit
        } else {
            self.accel_limit
        };
        self.accel_ref = self.accel_ref_signed;

        if self.half_distance <= self.accel_limit {
            // shorter than one tick of acceleration: commit it whole
            self.finish_at_target();
            return;
        }

        self.move_position += self.velocity_ref;
        self.velocity_ref += self.accel_ref;
        self.phase = Phase::RampUp;
    }

    fn step_ramp_up(&mut self) {
        self.integrate_toward_target();

        if self.move_position.abs() >= self.half_distance {
            if self.half_point_armed {
                let now = self.tick_now;
                let phase2 = *self.tick_phase2_start.get_or_insert(now);
                let ramp_end = *self.tick_ramp_end.get_or_insert(now);
                self.accel_ref = -self.accel_ref;
                self.tick_total = phase2.saturating_mul(2);
                self.tick_ramp_down_start = self.tick_total.saturating_sub(ramp_end);
                self.half_point_armed = false;
                self.phase = Phase::Cruise;
            } else {
                self.half_point_armed = true;
            }
        } else if self.velocity_ref.abs() >= self.velocity_limit && self.tick_ramp_end.is_none() {
            self.accel_ref = 0;
            self.tick_ramp_end = Some(self.tick_now);
            self.velocity_ref = self.velocity_limit * self.velocity_ref.signum();
        }
    }

    fn step_cruise(&mut self) {
        self.integrate_toward_target();

        if self.move_position >= self.target_position {
            self.finish_at_target();
        } else if self.tick_now >= self.tick_ramp_down_start {
            self.accel_ref = -self.accel_ref_signed;
            if self.tick_now > self.tick_total || same_sign(self.velocity_ref, self.accel_ref) {
                self.finish_at_target();
            }
        }
    }

    fn step_fast_move(&mut self) {
        self.target_position = self.q.to_scaled(i64::from(self.pending_command));
        match self.fast_move_step_cap {
            Some(cap) => {
                let step = self.q.to_scaled(i64::from(cap));
                self.move_position = (self.move_position + step).min(self.target_position);
                if self.move_position >= self.target_position {
                    self.finish_at_target();
                }
            }
            None => self.finish_at_target(),
        }
    }

    fn step_decel_setup(&mut self) {
        if !self.half_point_armed {
            self.half_point_armed = true;
            return;
        }
        self.half_point_armed = false;
        self.tick_now = 0;
        self.tick_total = DECEL_SAFETY_TICKS;

        let stop = self.clip_stop_distance();
        let q = self.q.to_scaled(stop);
        self.target_position = self.move_position + q;
        if q == 0 {
            // no room left: halt abruptly at the current velocity
            self.finish_in_place();
            return;
        }
        self.accel_ref = stopping_accel(self.velocity_ref, q);
        self.phase = Phase::DecelRun;
    }

    fn step_decel_run(&mut self) {
        let prev = self.move_position;
        self.integrate();
        // never walk backwards while braking
        self.move_position = self.move_position.max(prev);

        let remaining = self.target_position - self.move_position;
        if self.tick_now > self.tick_total
            || self.move_position.abs() > self.target_position.abs()
            || remaining <= 0
            || same_sign(self.velocity_ref, self.accel_ref)
        {
            self.move_position = self.move_position.min(self.target_position);
            self.finish_in_place();
        } else {
            self.accel_ref = stopping_accel(self.velocity_ref, remaining);
        }
    }

    /// Requested stop distance in counts, clipped to the room left before
    /// the position limit in the direction of travel.
    fn clip_stop_distance(&self) -> i64 {
        let d = i64::from(self.decel_target_distance);
        let abs = self.absolute_position;
        if self.direction {
            if abs + d > self.max_position {
                (self.max_position - abs).max(0)
            } else {
                d
            }
        } else if abs - d < self.min_position {
            (abs - self.min_position).max(0)
        } else {
            d
        }
    }

    #[inline]
    fn integrate(&mut self) {
        self.move_position += self.velocity_ref + (self.accel_ref >> 1);
        self.velocity_ref += self.accel_ref;
    }

    #[inline]
    fn integrate_toward_target(&mut self) {
        self.integrate();
        self.move_position = self.move_position.min(self.target_position);
    }

    fn finish_at_target(&mut self) {
        self.accel_ref = 0;
        self.velocity_ref = 0;
        self.move_position = self.target_position;
        self.pending_command = 0;
        self.phase = Phase::Idle;
    }

    fn finish_in_place(&mut self) {
        self.accel_ref = 0;
        self.velocity_ref = 0;
        self.target_position = self.move_position;
        self.pending_command = 0;
        self.phase = Phase::Idle;
    }

    /// Convert newly accumulated whole units into a burst, carrying the
    /// sub-unit remainder to the next tick.
    fn emit_burst(&mut self) -> i32 {
        let burst = self.q.to_counts(self.move_position - self.emitted_steps);
        self.emitted_steps += self.q.to_scaled(burst);
        if self.direction {
            self.absolute_position += burst;
        } else {
            self.absolute_position -= burst;
        }
        i32::try_from(burst).unwrap_or(if burst < 0 { i32::MIN } else { i32::MAX })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::QFormat;
    use rstest::rstest;

    const F: u32 = 10;

    fn state(min: i64, max: i64) -> ProfileState {
        let mut s = ProfileState::new(QFormat::default());
        s.set_motion_limits(50 << F, 5 << F).unwrap();
        s.set_position_limits(min, max).unwrap();
        s.enabled = true;
        s
    }

    fn start(s: &mut ProfileState, distance: i64) {
        s.direction = distance >= 0;
        s.pending_command = u32::try_from(distance.unsigned_abs()).unwrap();
    }

    /// Tick until the command clears; `stop_at` requests a bounded stop
    /// before the given tick index.
    fn run(s: &mut ProfileState, distance: i64, stop_at: Option<(usize, u32)>) -> Vec<i32> {
        start(s, distance);
        let mut bursts = Vec::new();
        for i in 0..1_000_000 {
            if let Some((at, d)) = stop_at {
                if i == at {
                    s.decel_target_distance = d;
                    s.half_point_armed = false;
                    s.phase = Phase::DecelSetup;
                }
            }
            bursts.push(s.calc_steps());
            if s.pending_command == 0 && s.phase == Phase::Idle {
                return bursts;
            }
        }
        panic!("move never completed");
    }

    #[test]
    fn trapezoid_reaches_cruise_and_lands_on_target() {
        let mut s = state(0, 54_400);
        let bursts = run(&mut s, 2000, None);
        assert_eq!(bursts.len(), 46);
        assert_eq!(bursts.iter().sum::<i32>(), 2000);
        assert_eq!(&bursts[..11], &[0, 7, 13, 17, 23, 27, 33, 37, 43, 47, 50]);
        // ramp-down is cut short by the target clamp
        assert_eq!(&bursts[41..], &[50, 50, 50, 48, 5]);
        assert_eq!(*bursts.iter().max().unwrap(), 50);
        assert_eq!(s.absolute_position, 2000);
        assert_eq!(s.move_position, s.target_position);
    }

    #[test]
    fn milestones_latch_on_the_tick_after_the_half_point() {
        let mut s = state(0, 54_400);
        start(&mut s, 2000);
        while s.phase != Phase::Cruise {
            s.calc_steps();
            if s.phase == Phase::RampUp && s.half_point_armed {
                // crossed but not yet transitioned
                assert_eq!(s.tick_phase2_start, None);
            }
        }
        assert_eq!(s.tick_now, 26);
        assert_eq!(s.tick_phase2_start, Some(26));
        assert_eq!(s.tick_ramp_end, Some(9));
        assert_eq!(s.tick_ramp_down_start, 43);
        assert_eq!(s.tick_total, 52);
    }

    #[test]
    fn triangle_never_reaches_velocity_limit() {
        let mut s = state(0, 54_400);
        let bursts = run(&mut s, 300, None);
        assert_eq!(bursts, vec![0, 7, 13, 17, 23, 27, 33, 37, 43, 42, 38, 20]);
        assert_eq!(s.absolute_position, 300);
        assert_eq!(s.tick_ramp_end, Some(8));
        assert_eq!(s.tick_phase2_start, Some(8));
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(10)]
    fn micro_move_completes_in_one_tick(#[case] distance: i64) {
        let mut s = state(0, 54_400);
        let bursts = run(&mut s, distance, None);
        assert_eq!(bursts, vec![i32::try_from(distance).unwrap()]);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.tick_ramp_end, None);
    }

    #[test]
    fn negative_move_counts_down() {
        let mut s = state(-100_000, 100_000);
        let bursts = run(&mut s, -2000, None);
        assert_eq!(bursts.iter().sum::<i32>(), 2000);
        assert_eq!(s.absolute_position, -2000);
        assert!(!s.direction);
    }

    #[test]
    fn idle_with_nothing_pending_is_idempotent() {
        let mut s = state(0, 54_400);
        run(&mut s, 2000, None);
        for _ in 0..3 {
            assert_eq!(s.calc_steps(), 0);
            assert!(s.snapshot().is_at_rest());
        }
        assert_eq!(s.absolute_position, 2000);
    }

    #[test]
    fn disabled_state_only_advances_the_tick_counter() {
        let mut s = state(0, 54_400);
        s.enabled = false;
        start(&mut s, 2000);
        assert_eq!(s.calc_steps(), 0);
        assert_eq!(s.calc_steps(), 0);
        assert_eq!(s.tick_now, 2);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.pending_command, 2000);
    }

    #[test]
    fn bounded_stop_travels_requested_distance() {
        let mut s = state(0, 100_000);
        let bursts = run(&mut s, 20_000, Some((30, 300)));
        // 1247 counts out when the stop lands, plus the requested 300
        assert_eq!(bursts.iter().sum::<i32>(), 1547);
        assert_eq!(s.absolute_position, 1547);
        assert_eq!(s.target_position, s.move_position);
        assert!(bursts.iter().all(|&b| b >= 0));
    }

    #[test]
    fn bounded_stop_clips_at_max_position() {
        let mut s = state(0, 1000);
        run(&mut s, 2000, Some((20, 5000)));
        assert_eq!(s.absolute_position, 1000);
    }

    #[test]
    fn bounded_stop_clips_at_min_position_in_reverse() {
        let mut s = state(-1500, 100_000);
        run(&mut s, -20_000, Some((30, 3000)));
        assert_eq!(s.absolute_position, -1500);
    }

    #[test]
    fn zero_distance_stop_halts_in_place() {
        let mut s = state(0, 100_000);
        let bursts = run(&mut s, 20_000, Some((30, 0)));
        assert_eq!(bursts.iter().sum::<i32>(), 1247);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.velocity_ref, 0);
    }

    #[test]
    fn uncapped_fast_move_commits_in_one_tick() {
        let mut s = state(0, 54_400);
        start(&mut s, 12_345);
        s.phase = Phase::FastMove;
        assert_eq!(s.calc_steps(), 12_345);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.pending_command, 0);
    }

    #[test]
    fn capped_fast_move_spreads_over_ticks() {
        let mut s = state(0, 54_400);
        s.set_fast_move_cap(Some(40));
        start(&mut s, 100);
        s.phase = Phase::FastMove;
        assert_eq!(s.calc_steps(), 40);
        assert_eq!(s.calc_steps(), 40);
        assert_eq!(s.phase, Phase::FastMove);
        assert_eq!(s.calc_steps(), 20);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.absolute_position, 100);
    }
}
