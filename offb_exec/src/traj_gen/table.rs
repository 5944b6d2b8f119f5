//! Trajectory table generation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::fmu::TrajectorySetpoint;
use log::trace;
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

// Internal
use super::{Params, TrajGenError};
use util::maths::{clamp_abs, short_ang_delta};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One full, closed cycle of trajectory setpoints.
///
/// The table is built once and never modified afterwards. Timestamps of the
/// stored setpoints are always zero, they are set on a copy of the setpoint
/// at the time it is published.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrajectoryTable {
    /// The parameters the table was built from.
    params: Params,

    /// Time between two consecutive points.
    ///
    /// Units: seconds
    dt_s: f64,

    points: Box<[TrajectorySetpoint]>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajectoryTable {
    /// Build the trajectory table for the given parameters.
    ///
    /// The table is built in two passes. The first computes the position,
    /// velocity, acceleration and yaw of every point, the second the yaw rate,
    /// which for the last point depends on the yaw of the first.
    pub fn build(params: &Params) -> Result<Self, TrajGenError> {
        let steps = params.validate()?;

        let dt_s = 1.0 / params.rate_hz;

        // First derivative of the sweep angle with respect to time, over the
        // revolution the rounded table actually covers
        let dadt = TAU / params.revolution_s();
        let r = params.radius_m;
        let alt = params.flight_altitude_m;

        let mut points = Vec::with_capacity(steps);
        let mut yaws = Vec::with_capacity(steps);

        for i in 0..steps {
            let a = sweep_angle(i, steps);

            let position = [
                r * a.cos(),
                r * a.sin(),
                alt * (4.0 * a).sin() - params.z_offset_m
            ];

            // Each axis is limited on its own value only
            let velocity = [
                clamp_abs(-dadt * r * a.sin(), params.vel_limit_ms),
                clamp_abs(dadt * r * a.cos(), params.vel_limit_ms),
                clamp_abs(4.0 * dadt * alt * (4.0 * a).cos(), params.vel_limit_ms)
            ];

            let acceleration = [
                -r * dadt * dadt * a.cos(),
                -r * dadt * dadt * a.sin(),
                -16.0 * dadt * dadt * alt * (4.0 * a).sin()
            ];

            // Yaw follows the direction of travel. Zero yaw lies along the x
            // axis, so the heading is rotated by pi to point the body forward
            // axis along the velocity. The result is left in [0, 2pi].
            let yaw = (-velocity[0]).atan2(velocity[1]) + PI;

            trace!(
                "x:{:7.3} y:{:7.3} z:{:7.3} yaw:{:7.1}",
                position[0], position[1], position[2], yaw.to_degrees()
            );

            yaws.push(yaw);
            points.push(TrajectorySetpoint {
                timestamp: 0,
                position: to_f32(position),
                velocity: to_f32(velocity),
                acceleration: to_f32(acceleration),
                yaw: yaw as f32,
                yawspeed: 0.0
            });
        }

        // Yaw rate by differentiating the yaw, the table is closed so the last
        // point differentiates against the first.
        for i in 0..steps {
            let curr = yaws[i];
            let next = yaws[(i + 1) % steps];

            points[i].yawspeed = (short_ang_delta(curr, next) / dt_s) as f32;
        }

        Ok(Self {
            params: params.clone(),
            dt_s,
            points: points.into_boxed_slice()
        })
    }

    /// Number of points in one cycle.
    pub fn steps(&self) -> usize {
        self.points.len()
    }

    /// Time between two consecutive points.
    ///
    /// Units: seconds
    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    /// The parameters this table was built from.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Get the point at the given index, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&TrajectorySetpoint> {
        self.points.get(index)
    }

    /// All points in the table.
    pub fn points(&self) -> &[TrajectorySetpoint] {
        &self.points
    }

    /// Iterate over all points in the table.
    pub fn iter(&self) -> std::slice::Iter<'_, TrajectorySetpoint> {
        self.points.iter()
    }
}

impl std::ops::Index<usize> for TrajectoryTable {
    type Output = TrajectorySetpoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Sweep angle of point `i` of a table with `steps` points.
///
/// Starts at `-pi/2` and advances by `2pi/steps` per point.
pub fn sweep_angle(i: usize, steps: usize) -> f64 {
    -FRAC_PI_2 + (i as f64) * (TAU / steps as f64)
}

fn to_f32(v: [f64; 3]) -> [f32; 3] {
    [v[0] as f32, v[1] as f32, v[2] as f32]
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-4;

    fn assert_close(a: f32, b: f64, what: &str) {
        assert!(
            (a as f64 - b).abs() < EPS as f64,
            "{}: expected {}, got {}", what, b, a
        );
    }

    #[test]
    fn test_reference_scenario() {
        let table = TrajectoryTable::build(&Params::default()).unwrap();

        assert_eq!(table.steps(), 600);
        assert!((table.dt_s() - 0.05).abs() < 1e-12);

        // a = -pi/2 at the start of the table
        let p0 = table[0].position;
        assert_close(p0[0], 0.0, "x0");
        assert_close(p0[1], -3.0, "y0");
        assert_close(p0[2], -5.0, "z0");

        // Heading along +x at the start, so yaw is pi/2
        assert_close(table[0].yaw, FRAC_PI_2, "yaw0");

        // Nothing is timestamped at build time
        assert!(table.iter().all(|p| p.timestamp == 0));
    }

    #[test]
    fn test_velocity_within_limit() {
        let table = TrajectoryTable::build(&Params::default()).unwrap();

        for p in table.iter() {
            for v in p.velocity.iter() {
                assert!(v.abs() <= 5.0);
            }
        }
    }

    #[test]
    fn test_velocity_clamp_per_axis() {
        // 2pi m/s around the circle, beyond the 5 m/s limit
        let params = Params {
            radius_m: 30.0,
            cycle_s: 30.0,
            rate_hz: 20.0,
            ..Default::default()
        };
        let table = TrajectoryTable::build(&params).unwrap();

        // At a = -pi/2 only vx exceeds the limit
        assert_close(table[0].velocity[0], 5.0, "vx at a=-pi/2");
        assert_close(table[0].velocity[1], 0.0, "vy at a=-pi/2");

        // At a = 0 only vy exceeds the limit, vx must not be touched
        let i = table.steps() / 4;
        assert!((sweep_angle(i, table.steps())).abs() < 1e-12);
        assert_close(table[i].velocity[0], 0.0, "vx at a=0");
        assert_close(table[i].velocity[1], 5.0, "vy at a=0");

        // At a = pi/2 vx saturates negatively
        let i = table.steps() / 2;
        assert_close(table[i].velocity[0], -5.0, "vx at a=pi/2");
        assert_close(table[i].velocity[1], 0.0, "vy at a=pi/2");
    }

    #[test]
    fn test_vertical_clamp_leaves_horizontal() {
        // Large vertical amplitude saturates vz
        let params = Params {
            flight_altitude_m: 10.0,
            ..Default::default()
        };
        let table = TrajectoryTable::build(&params).unwrap();
        let dadt = TAU / params.cycle_s;

        // At the start cos(4a) = 1 so vz is saturated
        assert_close(table[0].velocity[2], 5.0, "vz");

        // Horizontal components keep their analytic values
        for (i, p) in table.iter().enumerate() {
            let a = sweep_angle(i, table.steps());
            assert_close(p.velocity[0], -dadt * 3.0 * a.sin(), "vx");
            assert_close(p.velocity[1], dadt * 3.0 * a.cos(), "vy");
        }
    }

    #[test]
    fn test_acceleration_unclamped() {
        let params = Params {
            flight_altitude_m: 10.0,
            cycle_s: 2.0,
            ..Default::default()
        };
        let table = TrajectoryTable::build(&params).unwrap();
        let dadt = TAU / params.cycle_s;

        // Peak vertical acceleration is 16 dadt^2 A, the coarse sampling only
        // gets within sin(72 deg) of it
        let max_az = table
            .iter()
            .map(|p| p.acceleration[2].abs())
            .fold(0f32, f32::max);

        assert!(max_az as f64 > 0.95 * 16.0 * dadt * dadt * 10.0);
    }

    #[test]
    fn test_velocity_matches_rounded_revolution() {
        // 10.4 steps round down to 10, one revolution then takes 1 s
        let params = Params {
            radius_m: 0.5,
            cycle_s: 1.04,
            rate_hz: 10.0,
            ..Default::default()
        };
        let table = TrajectoryTable::build(&params).unwrap();
        let dadt = TAU / (table.steps() as f64 * table.dt_s());

        assert_eq!(table.steps(), 10);

        // At a = -pi/2 the motion is purely along x
        assert_close(table[0].velocity[0], dadt * 0.5, "vx0");
        assert_close(table[0].acceleration[1], dadt * dadt * 0.5, "ay0");

        // Yaw rate from the positions agrees with the analytic rate
        let yawspeed = table[0].yawspeed as f64;
        assert!((yawspeed - dadt).abs() < 1e-3, "{} vs {}", yawspeed, dadt);
    }

    #[test]
    fn test_table_closure() {
        let params = Params::default();
        let table = TrajectoryTable::build(&params).unwrap();
        let n = table.steps();

        // Continuing the curve one step past the last point lands on the first
        let a = sweep_angle(n - 1, n) + TAU / n as f64;
        let cont = [
            params.radius_m * a.cos(),
            params.radius_m * a.sin(),
            params.flight_altitude_m * (4.0 * a).sin() - params.z_offset_m
        ];

        for k in 0..3 {
            assert_close(table[0].position[k], cont[k], "continuation");
        }

        // And the gap across the wrap matches any other step
        let dist = |p: &TrajectorySetpoint, q: &TrajectorySetpoint| {
            (0..3)
                .map(|k| (p.position[k] - q.position[k]).powi(2))
                .sum::<f32>()
                .sqrt()
        };
        let wrap_gap = dist(&table[n - 1], &table[0]);
        let step_gap = dist(&table[0], &table[1]);

        assert!((wrap_gap - step_gap).abs() < EPS);
    }

    #[test]
    fn test_yaw_not_normalised() {
        let table = TrajectoryTable::build(&Params::default()).unwrap();

        // The offset pushes yaw beyond pi over part of the cycle
        assert!(table.iter().any(|p| p.yaw as f64 > PI));
        assert!(table.iter().all(|p| p.yaw >= 0.0 && p.yaw as f64 <= TAU + 1e-6));
    }

    #[test]
    fn test_yawspeed_wraparound() {
        let params = Params::default();
        let table = TrajectoryTable::build(&params).unwrap();

        // The heading turns uniformly once per cycle, including across the
        // 2pi -> 0 jump in yaw and across the end of the table
        let dadt = TAU / params.cycle_s;
        for p in table.iter() {
            assert!(
                (p.yawspeed as f64 - dadt).abs() < 1e-3,
                "yawspeed {} differs from {}", p.yawspeed, dadt
            );
        }
    }

    #[test]
    fn test_idempotent_build() {
        let params = Params {
            radius_m: 2.5,
            cycle_s: 12.0,
            rate_hz: 25.0,
            ..Default::default()
        };

        let a = TrajectoryTable::build(&params).unwrap();
        let b = TrajectoryTable::build(&params).unwrap();

        assert_eq!(a.steps(), b.steps());
        for (p, q) in a.iter().zip(b.iter()) {
            for k in 0..3 {
                assert_eq!(p.position[k].to_bits(), q.position[k].to_bits());
                assert_eq!(p.velocity[k].to_bits(), q.velocity[k].to_bits());
                assert_eq!(p.acceleration[k].to_bits(), q.acceleration[k].to_bits());
            }
            assert_eq!(p.yaw.to_bits(), q.yaw.to_bits());
            assert_eq!(p.yawspeed.to_bits(), q.yawspeed.to_bits());
        }
    }

    #[test]
    fn test_build_rejects_invalid() {
        let params = Params { radius_m: -1.0, ..Default::default() };

        assert_eq!(
            TrajectoryTable::build(&params),
            Err(TrajGenError::NonPositiveParam("radius_m", -1.0))
        );
    }

    proptest! {
        #[test]
        fn prop_table_bounded(
            radius_m in 0.1f64..50.0,
            cycle_s in 1.0f64..60.0,
            rate_hz in 1.0f64..50.0,
            flight_altitude_m in -5.0f64..5.0,
            vel_limit_ms in 0.5f64..10.0,
        ) {
            let params = Params {
                radius_m,
                cycle_s,
                rate_hz,
                flight_altitude_m,
                vel_limit_ms,
                ..Default::default()
            };
            let table = TrajectoryTable::build(&params).unwrap();

            prop_assert_eq!(table.steps(), params.num_steps());

            let limit = vel_limit_ms as f32;
            for p in table.iter() {
                for k in 0..3 {
                    prop_assert!(p.velocity[k].abs() <= limit);
                    prop_assert!(p.position[k].is_finite());
                    prop_assert!(p.acceleration[k].is_finite());
                }
                prop_assert!(p.yaw.is_finite());
                prop_assert!(p.yawspeed.is_finite());
            }
        }
    }
}
