//! Planner and assembler for a Variable-Prephasing (VP) gradient calibration
//! sequence.
//!
//! Given a measured gradient waveform on up to three axes, the crate
//! integrates it into the k-space trajectory it induces, derives a sweep of
//! prephasing areas spanning that trajectory, fits the event durations into
//! the TE/TR targets and emits the ordered event blocks for every
//! combination of axis, slice position, prephasing step and repeat. The
//! resulting timeline can be written to a pulseq-flavored sequence file.
//!
//! The entry point is [`VpMeasure`]: construct it from a [`VpConfig`] (all
//! planning happens eagerly there) and call
//! [`build_sequence`](VpMeasure::build_sequence).

mod kspace;
mod measure;
mod sequence;
mod sweep;
mod synth;
mod timing;
mod types;

pub use kspace::{EmptyAxisError, GradientWaveform, KSpaceTrajectory, PrephaseRange};
pub use measure::{ConfigError, Error, VpConfig, VpMeasure};
pub use sequence::{Block, Sequence, WriteError};
pub use sweep::{Sweep, SweepPoint};
pub use synth::{
    make_adc, make_arbitrary_gradient, make_delay, make_sinc_pulse, make_trapezoid, SynthError,
    SystemLimits, GAMMA,
};
pub use timing::{TimingPlan, TimingWarning};
pub use types::{
    Adc, Delay, Event, FreeGradient, Gradient, GradientChannel, PerAxis, RfPulse, TrapGradient,
};
