//! Sequence container: collects event blocks in emission order and persists
//! them to a pulseq-flavored text file.
//!
//! The temporal position of a block is implied purely by its position in the
//! block list; the writer deduplicates events and shapes into the id tables
//! of the file format.

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use crate::types::{Adc, Event, FreeGradient, Gradient, GradientChannel, RfPulse, TrapGradient};

const BLOCK_DURATION_RASTER: f64 = 10e-6;
const GRADIENT_RASTER: f64 = 10e-6;
const RF_RASTER: f64 = 1e-6;
const ADC_RASTER: f64 = 100e-9;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("refusing to write an empty sequence")]
    EmptySequence,
    #[error("failed to write sequence file: {0}")]
    Io(#[from] std::io::Error),
}

/// Events that play concurrently as one scheduling unit. The block duration
/// is the duration of its longest event (or of a pure delay).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub rf: Option<RfPulse>,
    pub gx: Option<Gradient>,
    pub gy: Option<Gradient>,
    pub gz: Option<Gradient>,
    pub adc: Option<Adc>,
    /// Unit: `s`
    pub duration: f64,
}

impl Block {
    pub fn gradient(&self, channel: GradientChannel) -> Option<&Gradient> {
        match channel {
            GradientChannel::X => self.gx.as_ref(),
            GradientChannel::Y => self.gy.as_ref(),
            GradientChannel::Z => self.gz.as_ref(),
        }
    }
}

/// Ordered timeline of event blocks.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    blocks: Vec<Block>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one block made of the given concurrent events.
    ///
    /// # Panics
    /// If two events claim the same slot (two RF pulses, two gradients on
    /// the same channel, or two ADC windows).
    pub fn add_block<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        let mut block = Block::default();
        for event in events {
            block.duration = block.duration.max(event.duration());
            match event {
                Event::Rf(rf) => {
                    assert!(block.rf.is_none(), "two RF events in one block");
                    block.rf = Some(rf);
                }
                Event::Gradient(grad) => {
                    let slot = match grad.channel() {
                        GradientChannel::X => &mut block.gx,
                        GradientChannel::Y => &mut block.gy,
                        GradientChannel::Z => &mut block.gz,
                    };
                    assert!(
                        slot.is_none(),
                        "two gradient events on channel {} in one block",
                        grad.channel().name()
                    );
                    *slot = Some(grad);
                }
                Event::Adc(adc) => {
                    assert!(block.adc.is_none(), "two ADC events in one block");
                    block.adc = Some(adc);
                }
                Event::Delay(_) => {
                    // Already folded into the block duration
                }
            }
        }
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Total duration of the timeline. Unit: `s`
    pub fn duration(&self) -> f64 {
        self.blocks.iter().map(|b| b.duration).sum()
    }

    /// Writes the sequence as a pulseq-flavored text file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        if self.blocks.is_empty() {
            return Err(WriteError::EmptySequence);
        }
        std::fs::write(path, self.render())?;
        Ok(())
    }

    fn render(&self) -> String {
        let mut tables = EventTables::default();
        let block_ids: Vec<BlockIds> = self
            .blocks
            .iter()
            .map(|block| tables.intern_block(block))
            .collect();

        // Trap and free-gradient ids share the gradient columns; free
        // gradients are numbered past the end of the trap table.
        let trap_count = tables.traps.len();
        let grad_column = |id: GradId| match id {
            GradId::None => 0,
            GradId::Trap(id) => id,
            GradId::Free(id) => trap_count + id,
        };

        let mut out = String::new();
        out.push_str("# Pulseq sequence file\n# Created by vp-seq\n\n");
        out.push_str("[VERSION]\nmajor 1\nminor 4\nrevision 0\n\n");

        out.push_str("[DEFINITIONS]\n");
        let _ = writeln!(out, "AdcRasterTime {ADC_RASTER}");
        let _ = writeln!(out, "BlockDurationRaster {BLOCK_DURATION_RASTER}");
        let _ = writeln!(out, "GradientRasterTime {GRADIENT_RASTER}");
        let _ = writeln!(out, "RadiofrequencyRasterTime {RF_RASTER}");
        let _ = writeln!(out, "TotalDuration {}", self.duration());
        out.push('\n');

        out.push_str("[BLOCKS]\n# id dur rf gx gy gz adc ext\n");
        for (idx, (block, ids)) in self.blocks.iter().zip(&block_ids).enumerate() {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} 0",
                idx + 1,
                (block.duration / BLOCK_DURATION_RASTER).round() as u64,
                ids.rf,
                grad_column(ids.gx),
                grad_column(ids.gy),
                grad_column(ids.gz),
                ids.adc,
            );
        }
        out.push('\n');

        if !tables.rfs.is_empty() {
            out.push_str("[RF]\n# id amp mag_id phase_id time_id delay freq phase\n");
            for (i, row) in tables.rfs.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{} {} {} {} 0 {} {} {}",
                    i + 1,
                    row.amp,
                    row.mag_id,
                    row.phase_id,
                    row.delay_us,
                    row.freq,
                    row.phase,
                );
            }
            out.push('\n');
        }

        if !tables.traps.is_empty() {
            out.push_str("[TRAP]\n# id amp rise flat fall delay\n");
            for (i, row) in tables.traps.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{} {} {} {} {} {}",
                    i + 1,
                    row.amp,
                    row.rise_us,
                    row.flat_us,
                    row.fall_us,
                    row.delay_us,
                );
            }
            out.push('\n');
        }

        if !tables.grads.is_empty() {
            out.push_str("[GRADIENTS]\n# id amp shape_id time_id delay\n");
            for (i, row) in tables.grads.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{} {} {} 0 {}",
                    trap_count + i + 1,
                    row.amp,
                    row.shape_id,
                    row.delay_us,
                );
            }
            out.push('\n');
        }

        if !tables.adcs.is_empty() {
            out.push_str("[ADC]\n# id num dwell delay freq phase\n");
            for (i, row) in tables.adcs.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{} {} {} {} 0 0",
                    i + 1,
                    row.num,
                    row.dwell_ns,
                    row.delay_us,
                );
            }
            out.push('\n');
        }

        out.push_str("[SHAPES]\n");
        for (i, shape) in tables.shapes.iter().enumerate() {
            let _ = writeln!(out, "\nshape_id {}", i + 1);
            let _ = writeln!(out, "num_samples {}", shape.len());
            for sample in shape {
                let _ = writeln!(out, "{sample}");
            }
        }

        out
    }
}

#[derive(Clone, Copy)]
enum GradId {
    None,
    Trap(usize),
    Free(usize),
}

struct BlockIds {
    rf: usize,
    gx: GradId,
    gy: GradId,
    gz: GradId,
    adc: usize,
}

#[derive(Default)]
struct EventTables {
    rfs: Vec<RfRow>,
    traps: Vec<TrapRow>,
    grads: Vec<GradRow>,
    adcs: Vec<AdcRow>,
    shapes: Vec<Vec<f64>>,
}

impl EventTables {
    fn intern_block(&mut self, block: &Block) -> BlockIds {
        let rf = match &block.rf {
            Some(rf) => {
                let row = RfRow::new(rf, &mut self.shapes);
                intern(&mut self.rfs, row)
            }
            None => 0,
        };
        let mut grad = |grad: Option<&Gradient>| match grad {
            None => GradId::None,
            Some(Gradient::Trap(trap)) => {
                GradId::Trap(intern(&mut self.traps, TrapRow::new(trap)))
            }
            Some(Gradient::Free(free)) => {
                let row = GradRow::new(free, &mut self.shapes);
                GradId::Free(intern(&mut self.grads, row))
            }
        };
        let gx = grad(block.gx.as_ref());
        let gy = grad(block.gy.as_ref());
        let gz = grad(block.gz.as_ref());
        let adc = match &block.adc {
            Some(adc) => intern(&mut self.adcs, AdcRow::new(adc)),
            None => 0,
        };

        BlockIds { rf, gx, gy, gz, adc }
    }
}

/// Returns the 1-based id of `row`, appending it if it is new.
fn intern<T: PartialEq>(rows: &mut Vec<T>, row: T) -> usize {
    match rows.iter().position(|r| *r == row) {
        Some(idx) => idx + 1,
        None => {
            rows.push(row);
            rows.len()
        }
    }
}

fn intern_shape(shapes: &mut Vec<Vec<f64>>, shape: Vec<f64>) -> usize {
    let same = |a: &[f64], b: &[f64]| {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
    };
    match shapes.iter().position(|s| same(s, &shape)) {
        Some(idx) => idx + 1,
        None => {
            shapes.push(shape);
            shapes.len()
        }
    }
}

#[derive(PartialEq)]
struct RfRow {
    amp: f64,
    mag_id: usize,
    phase_id: usize,
    delay_us: u64,
    freq: f64,
    phase: f64,
}

impl RfRow {
    fn new(rf: &RfPulse, shapes: &mut Vec<Vec<f64>>) -> Self {
        let mag_id = intern_shape(shapes, rf.amp_shape.clone());
        let phase_id = intern_shape(shapes, vec![0.0; rf.amp_shape.len()]);
        Self {
            amp: rf.amp,
            mag_id,
            phase_id,
            delay_us: us(rf.delay),
            freq: rf.freq_offset,
            phase: rf.phase,
        }
    }
}

#[derive(PartialEq)]
struct TrapRow {
    amp: f64,
    rise_us: u64,
    flat_us: u64,
    fall_us: u64,
    delay_us: u64,
}

impl TrapRow {
    fn new(trap: &TrapGradient) -> Self {
        Self {
            amp: trap.amp,
            rise_us: us(trap.rise),
            flat_us: us(trap.flat),
            fall_us: us(trap.fall),
            delay_us: us(trap.delay),
        }
    }
}

#[derive(PartialEq)]
struct GradRow {
    amp: f64,
    shape_id: usize,
    delay_us: u64,
}

impl GradRow {
    fn new(grad: &FreeGradient, shapes: &mut Vec<Vec<f64>>) -> Self {
        let peak = grad
            .amplitudes
            .iter()
            .fold(0.0f64, |acc, a| acc.max(a.abs()));
        let shape: Vec<f64> = if peak > 0.0 {
            grad.amplitudes.iter().map(|a| a / peak).collect()
        } else {
            vec![0.0; grad.amplitudes.len()]
        };
        Self {
            amp: peak,
            shape_id: intern_shape(shapes, shape),
            delay_us: us(grad.delay),
        }
    }
}

#[derive(PartialEq)]
struct AdcRow {
    num: usize,
    dwell_ns: u64,
    delay_us: u64,
}

impl AdcRow {
    fn new(adc: &Adc) -> Self {
        Self {
            num: adc.num_samples,
            dwell_ns: (adc.dwell * 1e9).round() as u64,
            delay_us: us(adc.delay),
        }
    }
}

fn us(t: f64) -> u64 {
    (t * 1e6).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{make_adc, make_delay, make_trapezoid, SystemLimits};
    use assert2::check;

    #[test]
    fn block_duration_is_longest_event() {
        let system = SystemLimits::default();
        let trap = make_trapezoid(GradientChannel::X, 100.0, None, &system).unwrap();
        let adc = make_adc(64, 10e-6, &system);
        let expected = trap.duration().max(adc.duration());

        let mut seq = Sequence::new();
        seq.add_block([trap.into(), adc.into()]);

        check!(seq.blocks().len() == 1);
        check!((seq.blocks()[0].duration - expected).abs() < 1e-12);
    }

    #[test]
    fn delay_block_has_no_events_but_a_duration() {
        let mut seq = Sequence::new();
        seq.add_block([make_delay(1.5e-3).into()]);

        let block = &seq.blocks()[0];
        check!(block.rf.is_none());
        check!(block.gx.is_none() && block.gy.is_none() && block.gz.is_none());
        check!(block.adc.is_none());
        check!((block.duration - 1.5e-3).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "two gradient events")]
    fn conflicting_gradients_panic() {
        let system = SystemLimits::default();
        let a = make_trapezoid(GradientChannel::Y, 10.0, None, &system).unwrap();
        let b = make_trapezoid(GradientChannel::Y, 20.0, None, &system).unwrap();

        let mut seq = Sequence::new();
        seq.add_block([a.into(), b.into()]);
    }

    #[test]
    fn writer_refuses_empty_sequence() {
        let seq = Sequence::new();
        let dir = tempfile::tempdir().unwrap();
        let result = seq.write(dir.path().join("empty.seq"));
        check!(matches!(result, Err(WriteError::EmptySequence)));
    }

    #[test]
    fn writer_emits_all_sections_and_dedups_events() {
        let system = SystemLimits::default();
        let trap = make_trapezoid(GradientChannel::X, 100.0, None, &system).unwrap();
        let adc = make_adc(64, 10e-6, &system);

        let mut seq = Sequence::new();
        // The same trapezoid twice must intern to a single [TRAP] row
        seq.add_block([Event::from(trap.clone())]);
        seq.add_block([trap.into(), adc.into()]);

        let rendered = seq.render();
        check!(rendered.contains("[VERSION]"));
        check!(rendered.contains("[BLOCKS]"));
        check!(rendered.contains("[TRAP]"));
        check!(rendered.contains("[ADC]"));
        let trap_rows = rendered
            .split("[TRAP]")
            .nth(1)
            .unwrap()
            .split("\n\n")
            .next()
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .count();
        check!(trap_rows == 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.seq");
        seq.write(&path).unwrap();
        check!(std::fs::read_to_string(&path).unwrap() == rendered);
    }
}
