//! Muskingum-Mann travel times and routing coefficients
//!
//! Derives, once per model, the per-segment quantities the routing kernel
//! consumes: the flood-wave travel time K, the integer sub-step stride, and
//! the three coefficients of the Muskingum recurrence.
//!
//! ## Travel time from Manning's equation
//!
//! The velocity at bank-full depth comes from Manning's equation, scaled
//! from ft/s to ft/h:
//!
//! ```text
//! v = (1/n) sqrt(S) d^(2/3) * 3600
//! K = L / v            (hours)
//! ```
//!
//! K is clamped to [0.01, 24.0] and forced to 24.0 for lake segments. A
//! segment whose velocity is not positive (zero, negative, or NaN slope)
//! keeps the 24.0 default rather than dividing by zero.
//!
//! ## Sub-step stride
//!
//! K is rounded down to an even divisor of 24 hours. Segments faster than
//! one hour get stride -1 and bypass the recurrence entirely; the router
//! passes their inflow straight through.
//!
//! ## Slope floor quirk
//!
//! Raw slopes below 1e-7 are replaced with 1e-4 in the *returned*
//! parameter copy, but only after the velocity has been computed from the
//! raw value. A non-positive raw slope therefore still produces the 24.0
//! default travel time on the first pass. The ordering matters:
//! reversing it changes K for every floored segment.

use crate::parameters::SegmentParameters;
use crate::RoutingError;

/// Travel times below this many hours bypass the Muskingum recurrence
pub const MIN_TRAVEL_TIME: f64 = 0.01;

/// Maximum travel time; also the value assigned to lake segments
pub const MAX_TRAVEL_TIME: f64 = 24.0;

/// Raw slopes below this threshold are floored in the stored parameters
pub const SLOPE_FLOOR_THRESHOLD: f64 = 1e-7;

/// Replacement value for floored slopes
pub const SLOPE_FLOOR: f64 = 1e-4;

/// Guard for a vanishing Muskingum denominator
const DENOMINATOR_GUARD: f64 = 1e-6;
const DENOMINATOR_REPLACEMENT: f64 = 1e-4;

/// Preconditioned per-segment routing quantities
///
/// Produced once from a [`SegmentParameters`] table and frozen. The input
/// table is not modified; the floored slopes live in `seg_slope` here.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingCoefficients {
    /// Slopes after the floor replacement (ft/ft)
    pub seg_slope: Vec<f64>,

    /// Flood-wave travel time per segment, in [0.01, 24.0] hours
    pub k_coef: Vec<f64>,

    /// Sub-step length in hours: 1, 2, 3, 4, 6, 8, 12, or 24
    pub ts: Vec<f64>,

    /// Integer sub-step stride; -1 marks sub-hourly pass-through segments
    pub tsi: Vec<i32>,

    /// Weight on the current averaged inflow
    pub c0: Vec<f64>,

    /// Weight on the previous sub-step's averaged inflow
    pub c1: Vec<f64>,

    /// Weight on the previous sub-step's outflow
    pub c2: Vec<f64>,
}

impl RoutingCoefficients {
    /// Derive travel times, strides, and coefficients from the parameter
    /// table
    ///
    /// # Errors
    /// [`RoutingError::InvalidGeometry`] if any segment has a non-positive
    /// `mann_n`, `seg_depth`, or `seg_length`.
    pub fn precondition(params: &SegmentParameters) -> Result<Self, RoutingError> {
        let n = params.nsegment;

        for i in 0..n {
            if params.mann_n[i] <= 0.0 {
                return Err(geometry_error(i, "mann_n", params.mann_n[i]));
            }
            if params.seg_depth[i] <= 0.0 {
                return Err(geometry_error(i, "seg_depth", params.seg_depth[i]));
            }
            if params.seg_length[i] <= 0.0 {
                return Err(geometry_error(i, "seg_length", params.seg_length[i]));
            }
        }

        // Velocity uses the raw slope; sqrt of a negative slope is NaN and
        // falls through the v > 0 test below.
        let velocity: Vec<f64> = (0..n)
            .map(|i| bank_full_velocity(params.mann_n[i], params.seg_slope[i], params.seg_depth[i]))
            .collect();

        let seg_slope: Vec<f64> = params
            .seg_slope
            .iter()
            .map(|&s| if s < SLOPE_FLOOR_THRESHOLD { SLOPE_FLOOR } else { s })
            .collect();

        let mut k_coef = vec![MAX_TRAVEL_TIME; n];
        for i in 0..n {
            if velocity[i] > 0.0 {
                k_coef[i] = params.seg_length[i] / velocity[i];
            }
            if params.segment_type[i].is_lake() {
                k_coef[i] = MAX_TRAVEL_TIME;
            }
            k_coef[i] = k_coef[i].clamp(MIN_TRAVEL_TIME, MAX_TRAVEL_TIME);
        }

        let mut ts = vec![1.0; n];
        let mut tsi = vec![1i32; n];
        for i in 0..n {
            let (t, t_int) = stride_for_travel_time(k_coef[i]);
            ts[i] = t;
            tsi[i] = t_int;
        }

        let mut c0 = vec![0.0; n];
        let mut c1 = vec![0.0; n];
        let mut c2 = vec![0.0; n];
        for i in 0..n {
            let kx = k_coef[i] * params.x_coef[i];
            let half_ts = 0.5 * ts[i];
            let mut d = k_coef[i] - kx + half_ts;
            if d.abs() < DENOMINATOR_GUARD {
                d = DENOMINATOR_REPLACEMENT;
            }
            // The three weights sum to 1 exactly here; the corrections
            // below keep them non-negative but give up the sum.
            c0[i] = (-kx + half_ts) / d;
            c1[i] = (kx + half_ts) / d;
            c2[i] = (k_coef[i] - kx - half_ts) / d;

            // Short travel time
            if c2[i] < 0.0 {
                c1[i] += c2[i];
                c2[i] = 0.0;
            }
            // Long travel time
            if c0[i] < 0.0 {
                c1[i] += c0[i];
                c0[i] = 0.0;
            }
        }

        Ok(Self {
            seg_slope,
            k_coef,
            ts,
            tsi,
            c0,
            c1,
            c2,
        })
    }

    /// Number of segments
    pub fn nsegment(&self) -> usize {
        self.k_coef.len()
    }
}

fn geometry_error(index: usize, name: &str, value: f64) -> RoutingError {
    RoutingError::InvalidGeometry {
        segment: index + 1,
        reason: format!("{} must be positive, got {}", name, value),
    }
}

/// Bank-full velocity from Manning's equation, in feet per hour
///
/// ```text
/// v = (1/n) sqrt(S) d^(2/3) * 3600
/// ```
pub fn bank_full_velocity(mann_n: f64, seg_slope: f64, seg_depth: f64) -> f64 {
    (1.0 / mann_n) * seg_slope.sqrt() * seg_depth.powf(2.0 / 3.0) * 3600.0
}

/// Round a travel time down to an even divisor of 24 hours
///
/// Returns `(ts, tsi)`. Travel times under one hour return `(1.0, -1)`:
/// the segment is routed every hour but bypasses the recurrence.
pub fn stride_for_travel_time(k: f64) -> (f64, i32) {
    if k < 1.0 {
        (1.0, -1)
    } else if k < 2.0 {
        (1.0, 1)
    } else if k < 3.0 {
        (2.0, 2)
    } else if k < 4.0 {
        (3.0, 3)
    } else if k < 6.0 {
        (4.0, 4)
    } else if k < 8.0 {
        (6.0, 6)
    } else if k < 12.0 {
        (8.0, 8)
    } else if k < 24.0 {
        (12.0, 12)
    } else {
        (24.0, 24)
    }
}
