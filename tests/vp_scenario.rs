//! End-to-end scenario: two driven axes, five slices, a 10-step sweep with
//! 5 repeats, assembled and written to disk.

use assert2::check;
use vp_seq::{
    Gradient, GradientChannel, GradientWaveform, SystemLimits, VpConfig, VpMeasure, GAMMA,
};

fn system() -> SystemLimits {
    SystemLimits {
        max_grad: 40e-3 * GAMMA,
        max_slew: 80.0 * GAMMA,
        rf_dead_time: 100e-6,
        rf_ringdown_time: 20e-6,
        adc_dead_time: 10e-6,
        grad_raster_time: 10e-6,
        rf_raster_time: 1e-6,
    }
}

/// Damped oscillation mirrored onto itself, 256 samples.
fn waveform(f: fn(f64) -> f64) -> Vec<f64> {
    let n = 128;
    let mut samples: Vec<f64> = (0..n)
        .map(|i| {
            let envelope = 2e5 * (1.0 - (-1e-2 * i as f64).exp());
            let phase = 4.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64;
            envelope * f(phase)
        })
        .collect();
    samples.extend(samples.clone().into_iter().rev());
    samples
}

fn config() -> VpConfig {
    VpConfig {
        waveform: GradientWaveform::new(Some(waveform(f64::cos)), Some(waveform(f64::sin)), None)
            .unwrap(),
        dwell_time: 10e-6,
        n_adc_samples: 256,
        system: system(),
        tr: 100e-3,
        te: 3e-3,
        rf_flip_angle: 30f64.to_radians(),
        rf_duration: 3e-3,
        rf_slice_thickness: 10e-3,
        rf_slice_position: vec![-30e-3, -15e-3, 0.0, 15e-3, 30e-3],
        vp_steps: 10,
        vp_repeat: 5,
        vp_range: None,
    }
}

#[test]
fn full_sweep_emits_2500_blocks_in_order() {
    let vp = VpMeasure::new(config()).unwrap();
    let seq = vp.build_sequence().unwrap();

    // 5 blocks x 2 axes x 5 slices x 10 steps x 5 repeats
    check!(seq.blocks().len() == 2500);

    // The z axis is absent and must never appear
    for block in seq.blocks() {
        check!(block.gradient(GradientChannel::Z).is_none());
    }

    // First half of the timeline is the x axis, second half y
    let first = &seq.blocks()[0];
    check!(matches!(first.gx, Some(Gradient::Trap(_))));
    let second_half = &seq.blocks()[1250];
    check!(matches!(second_half.gy, Some(Gradient::Trap(_))));
    check!(second_half.gx.is_none());

    // First block: RF frequency offset = slice gradient amplitude x first
    // slice position
    let rf = first.rf.as_ref().unwrap();
    let Some(Gradient::Trap(grad_ss)) = &first.gx else {
        panic!("expected the slice-select trapezoid on x");
    };
    check!((rf.freq_offset - grad_ss.amp * -30e-3).abs() < 1e-9);

    // Every 5-block group follows the excitation / prephase / TE gap /
    // readout / TR gap pattern
    for group in seq.blocks().chunks(5) {
        check!(group[0].rf.is_some());
        check!(group[2].rf.is_none() && group[2].adc.is_none());
        check!((group[2].duration - vp.plan().te_delay).abs() < 1e-12);
        check!(group[3].adc.is_some());
        check!((group[4].duration - vp.plan().tr_delay).abs() < 1e-12);
    }
}

#[test]
fn timing_plan_is_clamped_and_non_negative() {
    let vp = VpMeasure::new(config()).unwrap();
    let plan = vp.plan();

    check!(plan.te_delay >= 0.0);
    check!(plan.tr_delay >= 0.0);
    // Clamps and warnings come in pairs
    for warning in &plan.warnings {
        match warning {
            vp_seq::TimingWarning::TeRelaxed { .. } => {
                check!(plan.te_delay == 0.0);
            }
            vp_seq::TimingWarning::TrRelaxed { .. } => {
                check!(plan.tr_delay == 0.0);
            }
        }
    }
}

#[test]
fn area_table_spans_the_trajectory_extent() {
    let vp = VpMeasure::new(config()).unwrap();
    let range = vp.range();
    let table = vp.prephase_areas();

    check!(table.len() == 10);
    check!(range.lo <= 0.0 && 0.0 <= range.hi);
    check!((table[9] - table[0] - (range.hi - range.lo)).abs() < 1e-9);
    check!(table.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn written_file_is_non_empty_and_sectioned() {
    let vp = VpMeasure::new(config()).unwrap();
    let seq = vp.build_sequence().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vp_measure.seq");
    seq.write(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    check!(contents.contains("[VERSION]"));
    check!(contents.contains("[BLOCKS]"));
    check!(contents.contains("[RF]"));
    check!(contents.contains("[TRAP]"));
    check!(contents.contains("[GRADIENTS]"));
    check!(contents.contains("[ADC]"));
    check!(contents.contains("[SHAPES]"));
    // One line per block
    let blocks_section = contents.split("[BLOCKS]").nth(1).unwrap();
    let block_lines = blocks_section
        .split("\n\n")
        .next()
        .unwrap()
        .lines()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
        .count();
    check!(block_lines == 2500);
}
