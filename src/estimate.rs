//! Voltage to state-of-charge estimators.

use serde::{Deserialize, Serialize};

// Breakpoints and shape of the piecewise curve. The three segments meet at
// (KNEE_LOW, P_LOW) and (KNEE_HIGH, P_HIGH).
const KNEE_LOW: f64 = 3.7;
const KNEE_HIGH: f64 = 3.775;
const P_LOW: f64 = 25.0;
const P_HIGH: f64 = 50.0;
const K_LOW: f64 = 6.0;
const K_MID: f64 = 20.0;
const K_HIGH: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PercentCurve {
    /// `(v - v_min) / v_range * 100`. Not clamped: a cell above
    /// `v_min + v_range` reads over 100.
    Linear { v_min: f64, v_range: f64 },
    /// Exponential segments around the Li-ion plateau. Saturates towards 0
    /// and 100 outside the usable range.
    Piecewise,
}

impl PercentCurve {
    pub fn percent(&self, volts: f64) -> f64 {
        match *self {
            PercentCurve::Linear { v_min, v_range } => (volts - v_min) / v_range * 100.0,
            PercentCurve::Piecewise => piecewise(volts),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match *self {
            PercentCurve::Linear { v_range, .. } if !(v_range > 0.0) => {
                Err(format!("linear curve needs a positive v_range, got {}", v_range))
            }
            _ => Ok(()),
        }
    }
}

fn piecewise(v: f64) -> f64 {
    if v < KNEE_LOW {
        P_LOW * (K_LOW * (v - KNEE_LOW)).exp()
    } else if v < KNEE_HIGH {
        let span = 1.0 - (-K_MID * (KNEE_HIGH - KNEE_LOW)).exp();
        let t = ((1.0 - (-K_MID * (v - KNEE_LOW)).exp()) / span).clamp(0.0, 1.0);
        P_LOW + (P_HIGH - P_LOW) * t
    } else {
        100.0 - (100.0 - P_HIGH) * (-K_HIGH * (v - KNEE_HIGH)).exp()
    }
}
