//! Flight simulation module
//!
//! Owns the single live flight state and advances it toward operator-set
//! targets under bounded rates. Setters only record intent; `integrate` is
//! the one place current values change, so there is no read/mutate race
//! between UI-originated setters and the transmit tick.

use serde::{Deserialize, Serialize};

/// Knots to meters per second
const KT_TO_MS: f64 = 0.514444;

/// Meters per degree of latitude (and of longitude at the equator)
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Rate limits applied during target convergence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimLimits {
    /// Maximum turn rate, degrees per second (3 = standard rate)
    #[serde(default = "default_turn_rate")]
    pub turn_rate_deg_s: f64,
    /// Maximum acceleration, knots per second
    #[serde(default = "default_accel")]
    pub accel_kt_s: f64,
    /// Maximum vertical-speed change, fpm per second
    #[serde(default = "default_vs_change")]
    pub vs_change_fpm_s: f64,
}

fn default_turn_rate() -> f64 {
    3.0
}

fn default_accel() -> f64 {
    2.0
}

fn default_vs_change() -> f64 {
    300.0
}

impl Default for SimLimits {
    fn default() -> Self {
        Self {
            turn_rate_deg_s: default_turn_rate(),
            accel_kt_s: default_accel(),
            vs_change_fpm_s: default_vs_change(),
        }
    }
}

/// Default commanded climb/descent rate when none has been set, fpm
pub const DEFAULT_CLIMB_RATE_FPM: f64 = 500.0;

/// Kinematic state of the simulated aircraft, plus its targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightState {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub altitude_ft: f64,
    pub ground_speed_kt: f64,
    pub track_deg: f64,
    pub vertical_speed_fpm: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    pub heading_deg: f64,

    pub target_heading_deg: f64,
    pub target_altitude_ft: f64,
    pub target_speed_kt: f64,
    pub target_climb_fpm: f64,
}

impl FlightState {
    /// Initial state: level flight, targets equal to current values.
    pub fn new(lat_deg: f64, lon_deg: f64, altitude_ft: f64, speed_kt: f64, track_deg: f64) -> Self {
        let track_deg = wrap_heading(track_deg);
        Self {
            lat_deg,
            lon_deg,
            altitude_ft,
            ground_speed_kt: speed_kt,
            track_deg,
            vertical_speed_fpm: 0.0,
            pitch_deg: 2.0,
            roll_deg: 0.0,
            heading_deg: track_deg,
            target_heading_deg: track_deg,
            target_altitude_ft: altitude_ft,
            target_speed_kt: speed_kt,
            target_climb_fpm: DEFAULT_CLIMB_RATE_FPM,
        }
    }
}

/// The flight state model: one owned state value, setters recording intent,
/// a single integration entry point applying it.
pub struct Simulator {
    state: FlightState,
    limits: SimLimits,
    elapsed_s: f64,
}

impl Simulator {
    pub fn new(state: FlightState, limits: SimLimits) -> Self {
        Self {
            state,
            limits,
            elapsed_s: 0.0,
        }
    }

    /// Read-only snapshot of the current state.
    pub fn state(&self) -> &FlightState {
        &self.state
    }

    /// Teleport: overwrite current position, leaving targets untouched.
    pub fn set_position(&mut self, lat_deg: f64, lon_deg: f64) {
        self.state.lat_deg = lat_deg;
        self.state.lon_deg = lon_deg;
    }

    pub fn set_target_heading(&mut self, heading_deg: f64) {
        self.state.target_heading_deg = wrap_heading(heading_deg);
    }

    pub fn set_target_altitude(&mut self, altitude_ft: f64) {
        self.state.target_altitude_ft = altitude_ft;
    }

    pub fn set_target_speed(&mut self, speed_kt: f64) {
        self.state.target_speed_kt = speed_kt.max(0.0);
    }

    pub fn set_target_climb_rate(&mut self, climb_fpm: f64) {
        self.state.target_climb_fpm = climb_fpm;
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Position moves flat-earth along the current track; heading, speed,
    /// altitude and vertical speed converge toward their targets without
    /// overshoot; attitude is synthesized from the resulting rates.
    pub fn integrate(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.elapsed_s += dt;

        self.advance_position(dt);
        let turn_rate = self.converge_heading(dt);
        self.converge_speed(dt);
        self.converge_altitude(dt);
        self.synthesize_attitude(turn_rate);
    }

    /// Flat-earth position step. Valid only over short horizons; latitude
    /// is clamped at the poles rather than wrapped.
    fn advance_position(&mut self, dt: f64) {
        let s = &mut self.state;
        let distance_m = s.ground_speed_kt * KT_TO_MS * dt;
        let track_rad = s.track_deg.to_radians();

        s.lat_deg += distance_m * track_rad.cos() / METERS_PER_DEGREE;
        s.lat_deg = s.lat_deg.clamp(-90.0, 90.0);

        let meters_per_deg_lon = METERS_PER_DEGREE * s.lat_deg.to_radians().cos();
        if meters_per_deg_lon > f64::EPSILON {
            s.lon_deg += distance_m * track_rad.sin() / meters_per_deg_lon;
            s.lon_deg = wrap_longitude(s.lon_deg);
        }
    }

    /// Turn toward the target heading the short way around, bounded by the
    /// turn-rate limit. Returns the applied turn rate in deg/s for roll
    /// synthesis. Track follows heading; there is no wind model.
    fn converge_heading(&mut self, dt: f64) -> f64 {
        let s = &mut self.state;
        let error = wrap_signed(s.target_heading_deg - s.heading_deg);
        let max_step = self.limits.turn_rate_deg_s * dt;

        let applied = if error.abs() <= max_step {
            s.heading_deg = s.target_heading_deg;
            error
        } else {
            let step = max_step.copysign(error);
            s.heading_deg = wrap_heading(s.heading_deg + step);
            step
        };
        s.track_deg = s.heading_deg;
        applied / dt
    }

    fn converge_speed(&mut self, dt: f64) {
        let s = &mut self.state;
        let error = s.target_speed_kt - s.ground_speed_kt;
        let max_step = self.limits.accel_kt_s * dt;
        if error.abs() <= max_step {
            s.ground_speed_kt = s.target_speed_kt;
        } else {
            s.ground_speed_kt += max_step.copysign(error);
        }
    }

    /// Move altitude toward its target at the commanded climb rate, then
    /// converge the displayed vertical speed toward the achieved rate under
    /// the vertical-acceleration bound so level-offs look continuous.
    fn converge_altitude(&mut self, dt: f64) {
        let s = &mut self.state;
        let error = s.target_altitude_ft - s.altitude_ft;
        let climb_fpm = if s.target_climb_fpm.abs() > f64::EPSILON {
            s.target_climb_fpm.abs()
        } else {
            DEFAULT_CLIMB_RATE_FPM
        };
        let max_step = climb_fpm / 60.0 * dt;

        let achieved_fpm = if error.abs() <= max_step {
            s.altitude_ft = s.target_altitude_ft;
            0.0
        } else {
            s.altitude_ft += max_step.copysign(error);
            climb_fpm.copysign(error)
        };

        let vs_error = achieved_fpm - s.vertical_speed_fpm;
        let max_vs_step = self.limits.vs_change_fpm_s * dt;
        if vs_error.abs() <= max_vs_step {
            s.vertical_speed_fpm = achieved_fpm;
        } else {
            s.vertical_speed_fpm += max_vs_step.copysign(vs_error);
        }
    }

    /// Pitch tracks the rate of climb, roll the coordinated-turn bank for
    /// the current turn rate, each with a small slow oscillation so the
    /// attitude display looks alive in level flight.
    fn synthesize_attitude(&mut self, turn_rate_deg_s: f64) {
        let s = &mut self.state;

        let pitch = 2.0 + s.vertical_speed_fpm * 0.004;
        s.pitch_deg = pitch.clamp(-15.0, 20.0) + (self.elapsed_s * 0.2).sin() * 0.5;

        let speed_ms = s.ground_speed_kt * KT_TO_MS;
        let bank_rad = (speed_ms * turn_rate_deg_s.to_radians() / 9.81).atan();
        let bank = bank_rad.to_degrees().clamp(-30.0, 30.0);
        s.roll_deg = bank + (self.elapsed_s * 0.33).sin() * 1.0;
    }
}

/// Normalize a heading to [0, 360).
pub fn wrap_heading(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Normalize an angular difference to [-180, 180).
pub fn wrap_signed(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Normalize a longitude to [-180, 180).
pub fn wrap_longitude(deg: f64) -> f64 {
    wrap_signed(deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> Simulator {
        Simulator::new(
            FlightState::new(50.9010, 4.4840, 3000.0, 120.0, 90.0),
            SimLimits::default(),
        )
    }

    #[test]
    fn test_eastbound_flight_advances_longitude() {
        let mut sim = simulator();
        let lon_before = sim.state().lon_deg;
        let lat_before = sim.state().lat_deg;

        sim.integrate(1.0);

        assert!(sim.state().lon_deg > lon_before);
        // Eastbound: latitude essentially unchanged.
        assert!((sim.state().lat_deg - lat_before).abs() < 1e-9);

        // 120 kt = 61.7 m/s; at 50.9N a degree of longitude is ~70.2 km.
        let expected_dlon = 120.0 * KT_TO_MS / (METERS_PER_DEGREE * 50.9010f64.to_radians().cos());
        assert!((sim.state().lon_deg - lon_before - expected_dlon).abs() < 1e-6);
    }

    #[test]
    fn test_northbound_flight_advances_latitude() {
        let mut sim = Simulator::new(
            FlightState::new(50.0, 4.0, 3000.0, 120.0, 0.0),
            SimLimits::default(),
        );
        sim.integrate(1.0);
        assert!(sim.state().lat_deg > 50.0);
    }

    #[test]
    fn test_latitude_clamped_at_pole() {
        let mut sim = Simulator::new(
            FlightState::new(89.9999, 0.0, 3000.0, 500.0, 0.0),
            SimLimits::default(),
        );
        for _ in 0..600 {
            sim.integrate(1.0);
        }
        assert!(sim.state().lat_deg <= 90.0);
    }

    #[test]
    fn test_heading_converges_short_way_across_north() {
        let mut sim = Simulator::new(
            FlightState::new(50.0, 4.0, 3000.0, 120.0, 350.0),
            SimLimits::default(),
        );
        sim.set_target_heading(10.0);

        let mut previous_error = wrap_signed(10.0 - sim.state().heading_deg).abs();
        for tick in 1..=10 {
            sim.integrate(1.0);
            let error = wrap_signed(10.0 - sim.state().heading_deg).abs();
            assert!(error <= previous_error, "error grew at tick {}", tick);
            // Bounded by the 3 deg/s limit: 20 degrees of error shrinks by
            // at most 3 per second.
            assert!(error <= (20.0 - 3.0 * f64::from(tick)).max(0.0) + 1e-9);
            previous_error = error;
        }
        assert!((sim.state().heading_deg - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_heading_turns_left_when_shorter() {
        let mut sim = Simulator::new(
            FlightState::new(50.0, 4.0, 3000.0, 120.0, 10.0),
            SimLimits::default(),
        );
        sim.set_target_heading(350.0);
        sim.integrate(1.0);
        // 10 -> 7, not 13.
        assert!((sim.state().heading_deg - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_heading_snaps_without_overshoot() {
        let mut sim = simulator();
        sim.set_target_heading(91.0);
        sim.integrate(1.0);
        assert_eq!(sim.state().heading_deg, 91.0);
        sim.integrate(1.0);
        assert_eq!(sim.state().heading_deg, 91.0);
    }

    #[test]
    fn test_speed_converges_without_overshoot() {
        let mut sim = simulator();
        sim.set_target_speed(130.0);

        sim.integrate(1.0);
        assert!((sim.state().ground_speed_kt - 122.0).abs() < 1e-9);
        for _ in 0..10 {
            sim.integrate(1.0);
            assert!(sim.state().ground_speed_kt <= 130.0);
        }
        assert_eq!(sim.state().ground_speed_kt, 130.0);
    }

    #[test]
    fn test_altitude_climb_is_monotonic_and_snaps() {
        let mut sim = simulator();
        sim.set_target_altitude(3100.0);
        sim.set_target_climb_rate(600.0);

        let mut previous = sim.state().altitude_ft;
        for _ in 0..30 {
            sim.integrate(1.0);
            assert!(sim.state().altitude_ft >= previous);
            assert!(sim.state().altitude_ft <= 3100.0);
            previous = sim.state().altitude_ft;
        }
        assert_eq!(sim.state().altitude_ft, 3100.0);
    }

    #[test]
    fn test_descent_converges() {
        let mut sim = simulator();
        sim.set_target_altitude(2500.0);
        for _ in 0..120 {
            sim.integrate(1.0);
        }
        assert_eq!(sim.state().altitude_ft, 2500.0);
        // Leveled off: vertical speed returns to zero.
        for _ in 0..10 {
            sim.integrate(1.0);
        }
        assert_eq!(sim.state().vertical_speed_fpm, 0.0);
    }

    #[test]
    fn test_vertical_speed_rate_bounded() {
        let mut sim = simulator();
        sim.set_target_altitude(10_000.0);
        sim.set_target_climb_rate(1000.0);

        sim.integrate(1.0);
        // One second in, vertical speed has risen by at most the
        // 300 fpm/s bound.
        assert!(sim.state().vertical_speed_fpm <= 300.0 + 1e-9);
        sim.integrate(1.0);
        assert!(sim.state().vertical_speed_fpm <= 600.0 + 1e-9);
    }

    #[test]
    fn test_set_position_teleports_without_touching_targets() {
        let mut sim = simulator();
        sim.set_target_altitude(5000.0);
        sim.set_position(-33.9461, 151.1772);

        assert_eq!(sim.state().lat_deg, -33.9461);
        assert_eq!(sim.state().lon_deg, 151.1772);
        assert_eq!(sim.state().target_altitude_ft, 5000.0);
        assert_eq!(sim.state().altitude_ft, 3000.0);
    }

    #[test]
    fn test_roll_reflects_turn_direction() {
        let mut sim = simulator();
        sim.set_target_heading(180.0);
        sim.integrate(1.0);
        // Turning right: positive bank, well past the idle oscillation.
        assert!(sim.state().roll_deg > 5.0);

        let mut sim = simulator();
        sim.set_target_heading(0.0);
        sim.integrate(1.0);
        assert!(sim.state().roll_deg < -5.0);
    }

    #[test]
    fn test_pitch_reflects_climb() {
        let mut sim = simulator();
        sim.set_target_altitude(10_000.0);
        for _ in 0..5 {
            sim.integrate(1.0);
        }
        assert!(sim.state().pitch_deg > 2.5);
    }

    #[test]
    fn test_wrap_helpers() {
        assert_eq!(wrap_heading(360.0), 0.0);
        assert_eq!(wrap_heading(-10.0), 350.0);
        assert_eq!(wrap_heading(725.0), 5.0);
        assert_eq!(wrap_signed(190.0), -170.0);
        assert_eq!(wrap_signed(-190.0), 170.0);
        assert_eq!(wrap_signed(180.0), -180.0);
    }
}
