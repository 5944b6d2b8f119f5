//! Trajectory generation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::TrajGenError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of points in one cycle of the trajectory.
///
/// One hour at 250 Hz, the table stays below 50 MB.
pub const MAX_STEPS: usize = 900_000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory generation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Params {

    /// Radius of the horizontal circle.
    ///
    /// Units: meters
    pub radius_m: f64,

    /// Time taken to complete one revolution of the trajectory.
    ///
    /// Units: seconds
    pub cycle_s: f64,

    /// Rate at which setpoints are generated, and later streamed.
    ///
    /// Units: hertz
    pub rate_hz: f64,

    /// Amplitude of the vertical oscillation.
    ///
    /// Units: meters
    pub flight_altitude_m: f64,

    /// Base vertical offset, subtracted from the vertical oscillation.
    ///
    /// Units: meters
    pub z_offset_m: f64,

    /// Limit applied independently to each velocity component.
    ///
    /// Units: meters/second
    #[serde(default = "default_vel_limit_ms")]
    pub vel_limit_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check that the parameters describe a valid trajectory, returning the
    /// number of steps in one cycle.
    pub fn validate(&self) -> Result<usize, TrajGenError> {
        let all = [
            ("radius_m", self.radius_m),
            ("cycle_s", self.cycle_s),
            ("rate_hz", self.rate_hz),
            ("flight_altitude_m", self.flight_altitude_m),
            ("z_offset_m", self.z_offset_m),
            ("vel_limit_ms", self.vel_limit_ms),
        ];

        for &(name, value) in all.iter() {
            if !value.is_finite() {
                return Err(TrajGenError::NonFiniteParam(name))
            }
        }

        let positive = [
            ("radius_m", self.radius_m),
            ("cycle_s", self.cycle_s),
            ("rate_hz", self.rate_hz),
            ("vel_limit_ms", self.vel_limit_ms),
        ];

        for &(name, value) in positive.iter() {
            if value <= 0.0 {
                return Err(TrajGenError::NonPositiveParam(name, value))
            }
        }

        // Bound the product before it is cast, the cast saturates
        let steps_f = self.steps_f64();
        if steps_f < 1.0 {
            return Err(TrajGenError::NoSteps {
                cycle_s: self.cycle_s,
                rate_hz: self.rate_hz
            })
        }
        if steps_f > MAX_STEPS as f64 {
            return Err(TrajGenError::TooManySteps {
                cycle_s: self.cycle_s,
                rate_hz: self.rate_hz,
                max: MAX_STEPS
            })
        }

        Ok(self.num_steps())
    }

    /// Number of steps in one cycle, rounded to the nearest whole step.
    ///
    /// Only meaningful for parameters which pass [`Params::validate`].
    pub fn num_steps(&self) -> usize {
        self.steps_f64() as usize
    }

    /// Duration of one revolution once the cycle is rounded to whole steps.
    ///
    /// Units: seconds
    pub fn revolution_s(&self) -> f64 {
        self.steps_f64() / self.rate_hz
    }

    fn steps_f64(&self) -> f64 {
        (self.cycle_s * self.rate_hz).round()
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            radius_m: 3.0,
            cycle_s: 30.0,
            rate_hz: 20.0,
            flight_altitude_m: -0.5,
            z_offset_m: 5.0,
            vel_limit_ms: default_vel_limit_ms(),
        }
    }
}

fn default_vel_limit_ms() -> f64 {
    5.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_steps() {
        assert_eq!(Params::default().validate(), Ok(600));
    }

    #[test]
    fn test_rejects_non_positive() {
        let p = Params { radius_m: 0.0, ..Default::default() };
        assert_eq!(p.validate(), Err(TrajGenError::NonPositiveParam("radius_m", 0.0)));

        let p = Params { cycle_s: -30.0, ..Default::default() };
        assert_eq!(p.validate(), Err(TrajGenError::NonPositiveParam("cycle_s", -30.0)));

        let p = Params { rate_hz: 0.0, ..Default::default() };
        assert_eq!(p.validate(), Err(TrajGenError::NonPositiveParam("rate_hz", 0.0)));

        let p = Params { vel_limit_ms: -5.0, ..Default::default() };
        assert_eq!(p.validate(), Err(TrajGenError::NonPositiveParam("vel_limit_ms", -5.0)));
    }

    #[test]
    fn test_rejects_non_finite() {
        let p = Params { z_offset_m: std::f64::NAN, ..Default::default() };
        assert_eq!(p.validate(), Err(TrajGenError::NonFiniteParam("z_offset_m")));

        let p = Params { rate_hz: std::f64::INFINITY, ..Default::default() };
        assert_eq!(p.validate(), Err(TrajGenError::NonFiniteParam("rate_hz")));
    }

    #[test]
    fn test_rejects_empty_cycle() {
        let p = Params { cycle_s: 0.01, rate_hz: 10.0, ..Default::default() };
        assert_eq!(
            p.validate(),
            Err(TrajGenError::NoSteps { cycle_s: 0.01, rate_hz: 10.0 })
        );
    }

    #[test]
    fn test_rejects_too_many_steps() {
        let p = Params { cycle_s: 1e12, rate_hz: 1e12, ..Default::default() };
        assert_eq!(
            p.validate(),
            Err(TrajGenError::TooManySteps { cycle_s: 1e12, rate_hz: 1e12, max: MAX_STEPS })
        );

        // Fits in memory as a number but not as a table
        let p = Params { cycle_s: 1e5, rate_hz: 1e4, ..Default::default() };
        assert!(matches!(p.validate(), Err(TrajGenError::TooManySteps { .. })));

        let p = Params { cycle_s: 3600.0, rate_hz: 250.0, ..Default::default() };
        assert_eq!(p.validate(), Ok(MAX_STEPS));
    }

    #[test]
    fn test_revolution_rounded() {
        let p = Params { cycle_s: 1.04, rate_hz: 10.0, ..Default::default() };

        assert_eq!(p.validate(), Ok(10));
        assert!((p.revolution_s() - 1.0).abs() < 1e-12);
        assert!((Params::default().revolution_s() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_vel_limit_default() {
        let p: Params = util::params::from_str(
            "radius_m = 3.0\n\
             cycle_s = 30.0\n\
             rate_hz = 20.0\n\
             flight_altitude_m = -0.5\n\
             z_offset_m = 5.0\n"
        ).unwrap();

        assert_eq!(p, Params::default());
    }
}
