//! Plans a VP calibration sequence for a synthetic damped-oscillation
//! gradient on x and y, then writes it as `vp_measure.seq`.
//!
//! Run with `cargo run --example vp_measure`.

use vp_seq::{GradientWaveform, PrephaseRange, SystemLimits, VpConfig, VpMeasure, GAMMA};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let system = SystemLimits {
        max_grad: 40e-3 * GAMMA,
        max_slew: 80.0 * GAMMA,
        rf_dead_time: 100e-6,
        rf_ringdown_time: 20e-6,
        adc_dead_time: 10e-6,
        grad_raster_time: 10e-6,
        rf_raster_time: 1e-6,
    };

    // Damped oscillation, two turns of phase over 128 samples, mirrored so
    // the waveform returns to where it started.
    let n = 128;
    let sample = |i: usize, f: fn(f64) -> f64| {
        let envelope = 2e5 * (1.0 - (-1e-2 * i as f64).exp());
        let phase = 4.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64;
        envelope * f(phase)
    };
    let mut gx: Vec<f64> = (0..n).map(|i| sample(i, f64::cos)).collect();
    let mut gy: Vec<f64> = (0..n).map(|i| sample(i, f64::sin)).collect();
    gx.extend(gx.clone().into_iter().rev());
    gy.extend(gy.clone().into_iter().rev());

    let config = VpConfig {
        waveform: GradientWaveform::new(Some(gx), Some(gy), None)?,
        dwell_time: 10e-6,
        n_adc_samples: 256,
        system,
        tr: 100e-3,
        te: 3e-3,
        rf_flip_angle: 30f64.to_radians(),
        rf_duration: 3e-3,
        rf_slice_thickness: 10e-3,
        rf_slice_position: vec![-30e-3, -15e-3, 0.0, 15e-3, 30e-3],
        vp_steps: 10,
        vp_repeat: 5,
        vp_range: None,
    };

    let vp = VpMeasure::new(config)?;

    let PrephaseRange { lo, hi } = vp.range();
    println!("prephasing range: [{lo:.3}, {hi:.3}] 1/m");
    let plan = vp.plan();
    println!(
        "TE delay: {:.6} s, TR delay: {:.6} s",
        plan.te_delay, plan.tr_delay
    );

    let seq = vp.build_sequence()?;
    println!(
        "assembled {} blocks, total duration {:.3} s",
        seq.blocks().len(),
        seq.duration()
    );

    seq.write("vp_measure.seq")?;
    Ok(())
}
