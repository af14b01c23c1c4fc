//! Timing plan: fits the fixed event durations into the target TE and TR.
//!
//! Infeasible targets are not errors. The delay is floored at zero and the
//! sequence runs as fast as possible; the relaxation is reported both as a
//! typed warning on the plan (so tests can assert on it) and through the
//! `log` facade (so operators see it).

use log::warn;

use crate::kspace::PrephaseRange;

/// A timing target that had to be relaxed because the events it must contain
/// are longer than the target itself. `achieved` is the echo/repetition time
/// the emitted sequence actually realizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingWarning {
    TeRelaxed { requested: f64, achieved: f64 },
    TrRelaxed { requested: f64, achieved: f64 },
}

/// Scalar durations shared by every repetition of the sweep. Computed once
/// during preparation; all fields are in seconds and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingPlan {
    /// Duration of the slice-select gradient (RF plays on its flat top)
    pub ss_duration: f64,
    /// Shared duration of every prephasing trapezoid in the sweep
    pub prephase_duration: f64,
    /// Gap between prephaser and measurement gradient
    pub te_delay: f64,
    /// Gap after the acquisition window
    pub tr_delay: f64,
    /// Duration of the longest present-axis measurement gradient
    pub measure_duration: f64,
    pub warnings: Vec<TimingWarning>,
}

impl TimingPlan {
    /// Derives the inter-event delays from the fixed event durations and the
    /// TE/TR targets, clamping negative delays to zero.
    pub fn derive(
        ss_duration: f64,
        prephase_duration: f64,
        measure_duration: f64,
        te: f64,
        tr: f64,
    ) -> Self {
        let mut warnings = Vec::new();

        let te_delay = te - 0.5 * ss_duration - prephase_duration;
        let te_delay = if te_delay < 0.0 {
            let achieved = 0.5 * ss_duration + prephase_duration;
            warn!("TE delay would be negative, set to 0; achieved TE = {achieved:.6} s");
            warnings.push(TimingWarning::TeRelaxed {
                requested: te,
                achieved,
            });
            0.0
        } else {
            te_delay
        };

        let tr_delay = tr - ss_duration - prephase_duration - te_delay - measure_duration;
        let tr_delay = if tr_delay < 0.0 {
            let achieved = ss_duration + prephase_duration + te_delay + measure_duration;
            warn!("TR delay would be negative, set to 0; achieved TR = {achieved:.6} s");
            warnings.push(TimingWarning::TrRelaxed {
                requested: tr,
                achieved,
            });
            0.0
        } else {
            tr_delay
        };

        Self {
            ss_duration,
            prephase_duration,
            te_delay,
            tr_delay,
            measure_duration,
            warnings,
        }
    }
}

/// Linearly spaces `steps` prephasing target areas across `range`, each
/// shifted by the rephasing area of the slice-select gradient. With a single
/// step only the lower bound is used.
pub fn area_table(range: PrephaseRange, steps: usize, rephase_area: f64) -> Vec<f64> {
    if steps == 1 {
        return vec![range.lo + rephase_area];
    }
    (0..steps)
        .map(|i| {
            let frac = i as f64 / (steps - 1) as f64;
            range.lo + (range.hi - range.lo) * frac + rephase_area
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn feasible_targets_leave_positive_delays() {
        let plan = TimingPlan::derive(2e-3, 1e-3, 3e-3, 3e-3, 100e-3);

        check!(plan.warnings.is_empty());
        check!((plan.te_delay - (3e-3 - 1e-3 - 1e-3)).abs() < 1e-12);
        let expected_tr_delay = 100e-3 - 2e-3 - 1e-3 - plan.te_delay - 3e-3;
        check!((plan.tr_delay - expected_tr_delay).abs() < 1e-12);
    }

    #[test]
    fn short_te_is_relaxed_not_rejected() {
        let plan = TimingPlan::derive(2e-3, 1.5e-3, 3e-3, 1e-3, 100e-3);

        check!(plan.te_delay == 0.0);
        let achieved = 0.5 * 2e-3 + 1.5e-3;
        check!(
            plan.warnings
                == vec![TimingWarning::TeRelaxed {
                    requested: 1e-3,
                    achieved,
                }]
        );
        check!(plan.tr_delay > 0.0);
    }

    #[test]
    fn short_tr_is_relaxed_not_rejected() {
        let plan = TimingPlan::derive(2e-3, 1e-3, 3e-3, 3e-3, 5e-3);

        check!(plan.tr_delay == 0.0);
        let achieved = 2e-3 + 1e-3 + plan.te_delay + 3e-3;
        check!(
            plan.warnings
                == vec![TimingWarning::TrRelaxed {
                    requested: 5e-3,
                    achieved,
                }]
        );
    }

    #[test]
    fn exactly_feasible_targets_produce_zero_delays_without_warnings() {
        let ss = 2e-3;
        let prephase = 1e-3;
        let measure = 3e-3;
        let te = 0.5 * ss + prephase;
        let tr = ss + prephase + measure;
        let plan = TimingPlan::derive(ss, prephase, measure, te, tr);

        check!(plan.te_delay == 0.0);
        check!(plan.tr_delay == 0.0);
        check!(plan.warnings.is_empty());
    }

    #[test]
    fn area_table_is_monotonic_and_hits_both_bounds() {
        let range = PrephaseRange { lo: -3.0, hi: 5.0 };
        let rephase = -0.25;
        let table = area_table(range, 10, rephase);

        check!(table.len() == 10);
        check!((table[0] - (range.lo + rephase)).abs() < 1e-12);
        check!((table[9] - (range.hi + rephase)).abs() < 1e-12);
        check!(table.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_step_table_uses_the_lower_bound() {
        let range = PrephaseRange { lo: -3.0, hi: 5.0 };
        let table = area_table(range, 1, 0.5);
        check!(table == vec![-2.5]);
    }
}
