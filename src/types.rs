//! Event descriptors shared by the synthesis functions, the timing planner
//! and the sequence container. All times are in seconds, gradient amplitudes
//! in `Hz / m` and areas in `1 / m`.

/// Physical axis on which a gradient event is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientChannel {
    X,
    Y,
    Z,
}

impl GradientChannel {
    pub const ALL: [GradientChannel; 3] = [
        GradientChannel::X,
        GradientChannel::Y,
        GradientChannel::Z,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GradientChannel::X => "x",
            GradientChannel::Y => "y",
            GradientChannel::Z => "z",
        }
    }
}

/// One value per gradient channel. Used for waveforms, trajectories and the
/// per-axis measurement gradients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerAxis<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> PerAxis<T> {
    pub fn get(&self, channel: GradientChannel) -> &T {
        match channel {
            GradientChannel::X => &self.x,
            GradientChannel::Y => &self.y,
            GradientChannel::Z => &self.z,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (GradientChannel, &T)> {
        GradientChannel::ALL.iter().map(move |&ch| (ch, self.get(ch)))
    }
}

/// RF pulse with a sampled amplitude envelope. The envelope is normalized to
/// a unit peak, `amp` carries the physical scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RfPulse {
    /// Unit: `Hz`
    pub amp: f64,
    /// Envelope samples, unit peak
    pub amp_shape: Vec<f64>,
    /// Unit: `rad`
    pub phase: f64,
    /// Unit: `Hz`
    pub freq_offset: f64,
    /// Unit: `s`
    pub delay: f64,
    /// Sample spacing of the envelope. Unit: `s`
    pub raster: f64,
    /// Coil ringdown appended after the last sample. Unit: `s`
    pub ringdown_time: f64,
}

impl RfPulse {
    pub fn duration(&self) -> f64 {
        self.delay + self.amp_shape.len() as f64 * self.raster + self.ringdown_time
    }
}

/// Trapezoidal gradient: linear rise, flat top, linear fall.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapGradient {
    pub channel: GradientChannel,
    /// Flat-top amplitude. Unit: `Hz / m`
    pub amp: f64,
    /// Unit: `s`
    pub rise: f64,
    /// Unit: `s`
    pub flat: f64,
    /// Unit: `s`
    pub fall: f64,
    /// Unit: `s`
    pub delay: f64,
}

impl TrapGradient {
    pub fn duration(&self) -> f64 {
        self.delay + self.rise + self.flat + self.fall
    }

    /// Zeroth moment of the trapezoid. Unit: `1 / m`
    pub fn area(&self) -> f64 {
        self.amp * (0.5 * self.rise + self.flat + 0.5 * self.fall)
    }
}

/// Free-form gradient defined by amplitude samples on a fixed raster.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeGradient {
    pub channel: GradientChannel,
    /// Unit: `Hz / m`
    pub amplitudes: Vec<f64>,
    /// Sample spacing. Unit: `s`
    pub raster: f64,
    /// Unit: `s`
    pub delay: f64,
}

impl FreeGradient {
    pub fn duration(&self) -> f64 {
        self.delay + self.amplitudes.len() as f64 * self.raster
    }
}

/// Either kind of gradient event, as stored in a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Gradient {
    Trap(TrapGradient),
    Free(FreeGradient),
}

impl Gradient {
    pub fn channel(&self) -> GradientChannel {
        match self {
            Gradient::Trap(g) => g.channel,
            Gradient::Free(g) => g.channel,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Gradient::Trap(g) => g.duration(),
            Gradient::Free(g) => g.duration(),
        }
    }
}

/// Sampling window of the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Adc {
    pub num_samples: usize,
    /// Sample spacing. Unit: `s`
    pub dwell: f64,
    /// Unit: `s`
    pub delay: f64,
    /// Receiver dead time appended after the last sample. Unit: `s`
    pub dead_time: f64,
}

impl Adc {
    pub fn duration(&self) -> f64 {
        self.delay + self.num_samples as f64 * self.dwell + self.dead_time
    }
}

/// Pure delay, stretches the block it is part of without playing anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delay {
    /// Unit: `s`
    pub duration: f64,
}

/// Any event that can be placed into a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Rf(RfPulse),
    Gradient(Gradient),
    Adc(Adc),
    Delay(Delay),
}

impl Event {
    pub fn duration(&self) -> f64 {
        match self {
            Event::Rf(rf) => rf.duration(),
            Event::Gradient(grad) => grad.duration(),
            Event::Adc(adc) => adc.duration(),
            Event::Delay(delay) => delay.duration,
        }
    }
}

impl From<RfPulse> for Event {
    fn from(rf: RfPulse) -> Self {
        Event::Rf(rf)
    }
}

impl From<TrapGradient> for Event {
    fn from(grad: TrapGradient) -> Self {
        Event::Gradient(Gradient::Trap(grad))
    }
}

impl From<FreeGradient> for Event {
    fn from(grad: FreeGradient) -> Self {
        Event::Gradient(Gradient::Free(grad))
    }
}

impl From<Adc> for Event {
    fn from(adc: Adc) -> Self {
        Event::Adc(adc)
    }
}

impl From<Delay> for Event {
    fn from(delay: Delay) -> Self {
        Event::Delay(delay)
    }
}
