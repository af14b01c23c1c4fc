//! Variable-Prephasing measurement: plans and assembles the calibration
//! sequence for a measured gradient waveform.
//!
//! Preparation happens once, eagerly, at construction: the waveform is
//! integrated into its k-space trajectory, the prephasing range and area
//! table are resolved and the timing plan is derived. Assembly then walks
//! the sweep and appends a fixed five-block pattern per combination:
//! excitation, prephaser, TE gap, readout, TR gap.

use thiserror::Error;

use crate::kspace::{EmptyAxisError, GradientWaveform, KSpaceTrajectory, PrephaseRange};
use crate::sequence::Sequence;
use crate::sweep::Sweep;
use crate::synth::{
    make_adc, make_arbitrary_gradient, make_delay, make_sinc_pulse, make_trapezoid, SynthError,
    SystemLimits,
};
use crate::timing::{area_table, TimingPlan};
use crate::types::{Adc, Event, FreeGradient, GradientChannel, PerAxis, RfPulse, TrapGradient};

/// Apodization of the sinc excitation envelope.
const SINC_APODIZATION: f64 = 0.42;
/// Time-bandwidth product of the sinc excitation.
const SINC_TIME_BW_PRODUCT: f64 = 4.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("VP_steps must be at least 1")]
    NoSteps,
    #[error("VP_repeat must be at least 1")]
    NoRepeats,
    #[error("dwell time must be positive")]
    NonPositiveDwell,
    #[error("acquisition needs at least one sample")]
    NoAdcSamples,
    #[error("at least one slice position is required")]
    NoSlicePositions,
    #[error("no axis carries a waveform")]
    NoActiveAxis,
    #[error("prephasing range is inverted (lo > hi)")]
    InvertedRange,
    #[error(transparent)]
    EmptyAxis(#[from] EmptyAxisError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Synth(#[from] SynthError),
}

/// Construction inputs of the measurement, supplied once and never mutated.
#[derive(Debug, Clone)]
pub struct VpConfig {
    pub waveform: GradientWaveform,
    /// ADC sample spacing, also the sample spacing the waveform was measured
    /// on. Unit: `s`
    pub dwell_time: f64,
    pub n_adc_samples: usize,
    pub system: SystemLimits,
    /// Target repetition time. Unit: `s`
    pub tr: f64,
    /// Target echo time. Unit: `s`
    pub te: f64,
    /// Unit: `rad`
    pub rf_flip_angle: f64,
    /// Unit: `s`
    pub rf_duration: f64,
    /// Unit: `m`
    pub rf_slice_thickness: f64,
    /// Unit: `m`
    pub rf_slice_position: Vec<f64>,
    /// Number of prephasing areas in the sweep (>= 1)
    pub vp_steps: usize,
    /// Acquisitions per prephasing area (>= 1)
    pub vp_repeat: usize,
    /// Overrides the range derived from the trajectory when set
    pub vp_range: Option<PrephaseRange>,
}

impl VpConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.vp_steps < 1 {
            return Err(ConfigError::NoSteps);
        }
        if self.vp_repeat < 1 {
            return Err(ConfigError::NoRepeats);
        }
        if !(self.dwell_time > 0.0) {
            return Err(ConfigError::NonPositiveDwell);
        }
        if self.n_adc_samples == 0 {
            return Err(ConfigError::NoAdcSamples);
        }
        if self.rf_slice_position.is_empty() {
            return Err(ConfigError::NoSlicePositions);
        }
        if self.waveform.present_axes().is_empty() {
            return Err(ConfigError::NoActiveAxis);
        }
        if let Some(range) = self.vp_range {
            if range.lo > range.hi {
                return Err(ConfigError::InvertedRange);
            }
        }
        Ok(())
    }
}

/// A fully prepared planning session. All derived state is cached here for
/// the lifetime of the session; [`VpMeasure::build_sequence`] only reads it.
pub struct VpMeasure {
    config: VpConfig,
    trajectory: KSpaceTrajectory,
    range: PrephaseRange,
    rf: RfPulse,
    grad_ss: TrapGradient,
    prephase_areas: Vec<f64>,
    measure_grads: PerAxis<Option<FreeGradient>>,
    adc: Adc,
    plan: TimingPlan,
}

impl VpMeasure {
    pub fn new(config: VpConfig) -> Result<Self, Error> {
        config.validate()?;

        let trajectory = KSpaceTrajectory::integrate(&config.waveform, config.dwell_time);
        let range = PrephaseRange::resolve(&trajectory, config.vp_range);

        let (rf, grad_ss, rephase_area) = make_sinc_pulse(
            config.rf_flip_angle,
            config.rf_duration,
            config.rf_slice_thickness,
            SINC_APODIZATION,
            SINC_TIME_BW_PRODUCT,
            &config.system,
        )?;

        // One maximal prephaser fixes the duration for every sweep step, so
        // block timing stays uniform even though the areas differ.
        let max_area = (range.lo + rephase_area)
            .abs()
            .max((range.hi + rephase_area).abs());
        let prephase_duration =
            make_trapezoid(GradientChannel::Z, max_area, None, &config.system)?.duration();

        let prephase_areas = area_table(range, config.vp_steps, rephase_area);

        let make_measure = |channel: GradientChannel| -> Result<Option<FreeGradient>, SynthError> {
            match config.waveform.axis(channel) {
                Some(samples) => Ok(Some(make_arbitrary_gradient(
                    channel,
                    samples.to_vec(),
                    &config.system,
                )?)),
                None => Ok(None),
            }
        };
        let measure_grads = PerAxis {
            x: make_measure(GradientChannel::X)?,
            y: make_measure(GradientChannel::Y)?,
            z: make_measure(GradientChannel::Z)?,
        };
        // One acquisition window length covers whichever axis is active
        let measure_duration = measure_grads
            .iter()
            .filter_map(|(_, grad)| grad.as_ref())
            .map(|grad| grad.duration())
            .fold(0.0f64, f64::max);

        let adc = make_adc(config.n_adc_samples, config.dwell_time, &config.system);

        let plan = TimingPlan::derive(
            grad_ss.duration(),
            prephase_duration,
            measure_duration,
            config.te,
            config.tr,
        );

        Ok(Self {
            config,
            trajectory,
            range,
            rf,
            grad_ss,
            prephase_areas,
            measure_grads,
            adc,
            plan,
        })
    }

    pub fn trajectory(&self) -> &KSpaceTrajectory {
        &self.trajectory
    }

    pub fn range(&self) -> PrephaseRange {
        self.range
    }

    pub fn plan(&self) -> &TimingPlan {
        &self.plan
    }

    /// Target areas of the prephasing sweep, one per step.
    pub fn prephase_areas(&self) -> &[f64] {
        &self.prephase_areas
    }

    /// The enumeration the assembly walks: every present axis, slice
    /// position, prephasing step and repeat, axis outermost.
    pub fn sweep(&self) -> Sweep {
        Sweep::new(
            self.config.waveform.present_axes(),
            self.config.rf_slice_position.clone(),
            self.config.vp_steps,
            self.config.vp_repeat,
        )
    }

    /// Assembles the full timeline: five blocks per sweep combination, in
    /// sweep order.
    pub fn build_sequence(&self) -> Result<Sequence, Error> {
        let mut seq = Sequence::new();

        for point in self.sweep() {
            let Some(measure_grad) = self.measure_grads.get(point.axis) else {
                continue;
            };

            let mut grad_ss = self.grad_ss.clone();
            grad_ss.channel = point.axis;

            // Slice offset maps to a frequency offset under the fixed
            // slice-select gradient
            let mut rf = self.rf.clone();
            rf.freq_offset = grad_ss.amp * point.slice_pos;

            let prephaser = make_trapezoid(
                point.axis,
                self.prephase_areas[point.step],
                Some(self.plan.prephase_duration),
                &self.config.system,
            )?;

            seq.add_block([Event::from(rf), grad_ss.into()]);
            seq.add_block([prephaser.into()]);
            seq.add_block([make_delay(self.plan.te_delay).into()]);
            seq.add_block([measure_grad.clone().into(), self.adc.clone().into()]);
            seq.add_block([make_delay(self.plan.tr_delay).into()]);
        }

        Ok(seq)
    }
}
