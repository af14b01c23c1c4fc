//! k-space bookkeeping: integrates a measured gradient waveform into the
//! trajectory it induces and resolves the interval the prephasing sweep has
//! to cover.

use thiserror::Error;

use crate::types::{GradientChannel, PerAxis};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("axis {} is present but has no samples", .0.name())]
pub struct EmptyAxisError(pub GradientChannel);

/// Measured (or intended) gradient amplitude samples, per axis. An axis that
/// is not driven is absent. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientWaveform {
    axes: PerAxis<Option<Vec<f64>>>,
}

impl GradientWaveform {
    pub fn new(
        x: Option<Vec<f64>>,
        y: Option<Vec<f64>>,
        z: Option<Vec<f64>>,
    ) -> Result<Self, EmptyAxisError> {
        let axes = PerAxis { x, y, z };
        for (channel, samples) in axes.iter() {
            if let Some(samples) = samples {
                if samples.is_empty() {
                    return Err(EmptyAxisError(channel));
                }
            }
        }
        Ok(Self { axes })
    }

    pub fn axis(&self, channel: GradientChannel) -> Option<&[f64]> {
        self.axes.get(channel).as_deref()
    }

    /// Channels that carry a waveform, in x, y, z order.
    pub fn present_axes(&self) -> Vec<GradientChannel> {
        GradientChannel::ALL
            .iter()
            .copied()
            .filter(|&ch| self.axes.get(ch).is_some())
            .collect()
    }
}

/// Cumulative k-space displacement per axis, derived from a waveform. An
/// absent axis contributes the single value 0.
#[derive(Debug, Clone, PartialEq)]
pub struct KSpaceTrajectory {
    axes: PerAxis<Vec<f64>>,
}

impl KSpaceTrajectory {
    /// `trajectory[i] = dwell * sum(waveform[0..=i])`
    pub fn integrate(waveform: &GradientWaveform, dwell: f64) -> Self {
        let cumsum = |samples: Option<&[f64]>| -> Vec<f64> {
            match samples {
                Some(samples) => samples
                    .iter()
                    .scan(0.0, |acc, &g| {
                        *acc += g;
                        Some(*acc * dwell)
                    })
                    .collect(),
                None => vec![0.0],
            }
        };

        Self {
            axes: PerAxis {
                x: cumsum(waveform.axis(GradientChannel::X)),
                y: cumsum(waveform.axis(GradientChannel::Y)),
                z: cumsum(waveform.axis(GradientChannel::Z)),
            },
        }
    }

    pub fn axis(&self, channel: GradientChannel) -> &[f64] {
        self.axes.get(channel)
    }

    /// Smallest interval containing every axis' trajectory. Since absent
    /// axes contribute 0, the extent always contains zero.
    pub fn extent(&self) -> PrephaseRange {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for (_, trajectory) in self.axes.iter() {
            for &k in trajectory {
                lo = lo.min(k);
                hi = hi.max(k);
            }
        }
        PrephaseRange { lo, hi }
    }
}

/// Closed interval of k-space area the prephasing sweep spans.
/// Invariant: `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrephaseRange {
    /// Unit: `1 / m`
    pub lo: f64,
    /// Unit: `1 / m`
    pub hi: f64,
}

impl PrephaseRange {
    /// An explicit range is used verbatim, otherwise the trajectory extent.
    pub fn resolve(trajectory: &KSpaceTrajectory, explicit: Option<PrephaseRange>) -> Self {
        explicit.unwrap_or_else(|| trajectory.extent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rand::Rng;

    #[test]
    fn integration_matches_prefix_sums() {
        let mut rng = rand::thread_rng();
        let samples: Vec<f64> = (0..200).map(|_| rng.gen_range(-1e5..1e5)).collect();
        let dwell = 10e-6;

        let waveform = GradientWaveform::new(Some(samples.clone()), None, None).unwrap();
        let trajectory = KSpaceTrajectory::integrate(&waveform, dwell);

        let x = trajectory.axis(GradientChannel::X);
        check!(x.len() == samples.len());
        for i in 0..samples.len() {
            let expected: f64 = samples[..=i].iter().sum::<f64>() * dwell;
            check!((x[i] - expected).abs() <= 1e-9 * expected.abs().max(1.0));
        }
    }

    #[test]
    fn absent_axis_is_a_single_zero() {
        let waveform = GradientWaveform::new(Some(vec![1.0, 2.0]), None, None).unwrap();
        let trajectory = KSpaceTrajectory::integrate(&waveform, 1e-5);

        check!(trajectory.axis(GradientChannel::Y) == [0.0]);
        check!(trajectory.axis(GradientChannel::Z) == [0.0]);
    }

    #[test]
    fn present_but_empty_axis_is_rejected() {
        let result = GradientWaveform::new(Some(vec![1.0]), Some(vec![]), None);
        check!(result == Err(EmptyAxisError(GradientChannel::Y)));
    }

    #[test]
    fn extent_spans_all_axes_and_contains_zero() {
        // x ramps up to a positive extreme, y dips negative
        let x = vec![1e4; 10];
        let y = vec![-2e4; 5];
        let waveform = GradientWaveform::new(Some(x), Some(y), None).unwrap();
        let trajectory = KSpaceTrajectory::integrate(&waveform, 1e-5);
        let range = trajectory.extent();

        check!((range.hi - 1e4 * 10.0 * 1e-5).abs() < 1e-9);
        check!((range.lo - (-2e4 * 5.0 * 1e-5)).abs() < 1e-9);
        check!(range.lo <= 0.0 && 0.0 <= range.hi);
    }

    #[test]
    fn explicit_range_wins_over_extent() {
        let waveform = GradientWaveform::new(Some(vec![1e5; 8]), None, None).unwrap();
        let trajectory = KSpaceTrajectory::integrate(&waveform, 1e-5);

        let explicit = PrephaseRange { lo: -1.0, hi: 2.0 };
        check!(PrephaseRange::resolve(&trajectory, Some(explicit)) == explicit);

        let resolved = PrephaseRange::resolve(&trajectory, None);
        check!(resolved == trajectory.extent());
    }
}
