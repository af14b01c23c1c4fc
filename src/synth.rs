//! Waveform synthesis: builds RF, gradient, ADC and delay event descriptors
//! from physical targets, honoring the hardware limits of the scanner.
//!
//! The hardware limits are threaded through every call as an explicit
//! [`SystemLimits`] value instead of living in process-wide state, so the
//! planner on top stays a pure function of its inputs.

use thiserror::Error;

use crate::types::{Adc, Delay, FreeGradient, GradientChannel, RfPulse, TrapGradient};

/// Gyromagnetic ratio of 1H. Unit: `Hz / T`
pub const GAMMA: f64 = 42.576e6;

/// Scanner hardware limits and raster times. Gradient quantities are in
/// gamma-scaled units (`Hz / m`, `Hz / m / s`); use [`GAMMA`] to convert
/// from `T / m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemLimits {
    /// Unit: `Hz / m`
    pub max_grad: f64,
    /// Unit: `Hz / m / s`
    pub max_slew: f64,
    /// Unit: `s`
    pub rf_dead_time: f64,
    /// Unit: `s`
    pub rf_ringdown_time: f64,
    /// Unit: `s`
    pub adc_dead_time: f64,
    /// Unit: `s`
    pub grad_raster_time: f64,
    /// Unit: `s`
    pub rf_raster_time: f64,
}

impl Default for SystemLimits {
    fn default() -> Self {
        Self {
            max_grad: 40e-3 * GAMMA,
            max_slew: 170.0 * GAMMA,
            rf_dead_time: 0.0,
            rf_ringdown_time: 0.0,
            adc_dead_time: 0.0,
            grad_raster_time: 10e-6,
            rf_raster_time: 1e-6,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SynthError {
    #[error("no amplitude samples for arbitrary gradient on {}", .0.name())]
    EmptyWaveform(GradientChannel),
    #[error("gradient amplitude {amp:.3e} Hz/m exceeds the limit of {limit:.3e} Hz/m")]
    AmplitudeExceeded { amp: f64, limit: f64 },
    #[error("trapezoid area {area:.3e} 1/m is not reachable within {duration:.3e} s")]
    AreaUnreachable { area: f64, duration: f64 },
    #[error("duration {duration:.3e} s leaves no room for two gradient ramps")]
    DurationTooShort { duration: f64 },
    #[error("invalid RF parameters: {0}")]
    InvalidRf(&'static str),
}

/// Rounds `t` up to the next multiple of `raster`. A small tolerance keeps
/// values that are already on the raster from jumping a full step.
fn raster_ceil(t: f64, raster: f64) -> f64 {
    (t / raster - 1e-9).ceil().max(0.0) * raster
}

/// Builds a Hamming-apodized sinc excitation pulse together with its
/// slice-select trapezoid.
///
/// Returns the RF pulse, the slice-select gradient and the rephasing area
/// (negative) that undoes the phase the slice gradient accrues between the
/// pulse center and the end of the gradient. The RF delay is aligned to the
/// gradient rise time so the pulse plays on the flat top.
pub fn make_sinc_pulse(
    flip_angle: f64,
    duration: f64,
    slice_thickness: f64,
    apodization: f64,
    time_bw_product: f64,
    system: &SystemLimits,
) -> Result<(RfPulse, TrapGradient, f64), SynthError> {
    if duration <= 0.0 {
        return Err(SynthError::InvalidRf("duration must be positive"));
    }
    if slice_thickness <= 0.0 {
        return Err(SynthError::InvalidRf("slice thickness must be positive"));
    }

    let n = (duration / system.rf_raster_time).round() as usize;
    if n < 2 {
        return Err(SynthError::InvalidRf("duration shorter than two RF raster steps"));
    }

    let sinc = |x: f64| {
        if x.abs() < 1e-12 {
            1.0
        } else {
            (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x)
        }
    };
    let amp_shape: Vec<f64> = (0..n)
        .map(|i| {
            // Sample centers, symmetric around the pulse midpoint
            let t = (i as f64 + 0.5) * system.rf_raster_time - 0.5 * duration;
            let window =
                (1.0 - apodization) + apodization * (std::f64::consts::TAU * t / duration).cos();
            window * sinc(time_bw_product * t / duration)
        })
        .collect();

    // The integral of the envelope fixes the amplitude for the target flip
    let envelope_integral: f64 = amp_shape.iter().sum::<f64>() * system.rf_raster_time;
    let amp = flip_angle / (std::f64::consts::TAU * envelope_integral);

    let bandwidth = time_bw_product / duration;
    let grad_amp = bandwidth / slice_thickness;
    if grad_amp > system.max_grad {
        return Err(SynthError::AmplitudeExceeded {
            amp: grad_amp,
            limit: system.max_grad,
        });
    }

    let rise = raster_ceil(grad_amp / system.max_slew, system.grad_raster_time)
        .max(system.grad_raster_time);
    let flat = raster_ceil(duration, system.grad_raster_time);
    let grad_ss = TrapGradient {
        channel: GradientChannel::Z,
        amp: grad_amp,
        rise,
        flat,
        fall: rise,
        delay: 0.0,
    };

    // Slice gradient area from the pulse center to the end of the gradient
    let rephase_area = -grad_amp * (0.5 * flat + 0.5 * rise);

    let rf = RfPulse {
        amp,
        amp_shape,
        phase: 0.0,
        freq_offset: 0.0,
        delay: rise,
        raster: system.rf_raster_time,
        ringdown_time: system.rf_ringdown_time,
    };

    Ok((rf, grad_ss, rephase_area))
}

/// Builds a trapezoid with the given zeroth moment.
///
/// Without a duration the shortest slew-limited trapezoid is returned (a
/// triangle when the area permits). With a duration, the amplitude is solved
/// so the trapezoid reaches the area in exactly that time; this is how one
/// gradient duration is shared across a whole sweep of different areas.
pub fn make_trapezoid(
    channel: GradientChannel,
    area: f64,
    duration: Option<f64>,
    system: &SystemLimits,
) -> Result<TrapGradient, SynthError> {
    let raster = system.grad_raster_time;
    let abs_area = area.abs();

    let (amp, rise, flat) = match duration {
        None => {
            let amp_triangle = (abs_area * system.max_slew).sqrt();
            if amp_triangle <= system.max_grad {
                let rise = raster_ceil(amp_triangle / system.max_slew, raster).max(raster);
                // Triangle area = amp * rise; rounding the ramp up lowers amp
                (area / rise, rise, 0.0)
            } else {
                let rise = raster_ceil(system.max_grad / system.max_slew, raster).max(raster);
                let flat = raster_ceil(
                    (abs_area - system.max_grad * rise) / system.max_grad,
                    raster,
                );
                (area / (rise + flat), rise, flat)
            }
        }
        Some(duration) => {
            if duration < 2.0 * raster {
                return Err(SynthError::DurationTooShort { duration });
            }
            // With rise = fall = amp / slew: area = amp * (duration - rise),
            // the smaller root of the quadratic is the gentler solution.
            let discriminant = duration * duration - 4.0 * abs_area / system.max_slew;
            if discriminant < 0.0 {
                return Err(SynthError::AreaUnreachable { area, duration });
            }
            let amp_min = 0.5 * (duration - discriminant.sqrt()) * system.max_slew;
            let rise = raster_ceil(amp_min / system.max_slew, raster).max(raster);
            if 2.0 * rise > duration {
                return Err(SynthError::AreaUnreachable { area, duration });
            }
            (area / (duration - rise), rise, duration - 2.0 * rise)
        }
    };

    if amp.abs() > system.max_grad * (1.0 + 1e-9) {
        return Err(SynthError::AmplitudeExceeded {
            amp: amp.abs(),
            limit: system.max_grad,
        });
    }

    Ok(TrapGradient {
        channel,
        amp,
        rise,
        flat,
        fall: rise,
        delay: 0.0,
    })
}

/// Builds a free-form gradient from amplitude samples on the gradient raster.
pub fn make_arbitrary_gradient(
    channel: GradientChannel,
    amplitudes: Vec<f64>,
    system: &SystemLimits,
) -> Result<FreeGradient, SynthError> {
    if amplitudes.is_empty() {
        return Err(SynthError::EmptyWaveform(channel));
    }
    let peak = amplitudes.iter().fold(0.0f64, |acc, a| acc.max(a.abs()));
    if peak > system.max_grad {
        return Err(SynthError::AmplitudeExceeded {
            amp: peak,
            limit: system.max_grad,
        });
    }

    Ok(FreeGradient {
        channel,
        amplitudes,
        raster: system.grad_raster_time,
        delay: 0.0,
    })
}

/// Builds an acquisition window of `num_samples` receiver samples.
pub fn make_adc(num_samples: usize, dwell: f64, system: &SystemLimits) -> Adc {
    Adc {
        num_samples,
        dwell,
        delay: 0.0,
        dead_time: system.adc_dead_time,
    }
}

pub fn make_delay(duration: f64) -> Delay {
    Delay { duration }
}
