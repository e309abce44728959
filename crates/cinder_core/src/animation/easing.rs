//! Easing curves.
//!
//! Every family is defined by its ease-in form; the other modes are derived:
//!
//! - out: `1 - in(1 - t)`
//! - in-out: `in` on the first half, mirrored `in` on the second
//! - out-in: `out` on the first half, `in` on the second

use std::f32::consts::PI;
use std::sync::Arc;

/// Curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EaseFamily {
    /// `t^2`
    Quad,
    /// `t^3`
    Cubic,
    /// `t^4`
    Quart,
    /// `t^5`
    Quint,
    /// Quarter sine wave.
    Sine,
    /// `2^(10(t-1))`
    Expo,
    /// Quarter circle.
    Circ,
    /// Decaying sine oscillation.
    Elastic,
    /// Overshoots before moving forward.
    Back,
    /// Bouncing ball.
    Bounce,
}

/// Which end of the curve is eased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EaseMode {
    /// Slow start.
    In,
    /// Slow end.
    Out,
    /// Slow start and end.
    InOut,
    /// Slow middle.
    OutIn,
}

/// Maps normalized time to normalized progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Easing {
    /// Constant speed.
    #[default]
    Linear,
    /// A built-in curve.
    Ease(EaseFamily, EaseMode),
    /// Evenly spaced samples over `0..=1`, linearly interpolated.
    Curve(Arc<[f32]>),
}

impl Easing {
    /// Shorthand for [`Easing::Ease`].
    #[must_use]
    pub const fn ease(family: EaseFamily, mode: EaseMode) -> Self {
        Self::Ease(family, mode)
    }

    /// Sampled curve. An empty sample set behaves like [`Easing::Linear`].
    #[must_use]
    pub fn curve(samples: &[f32]) -> Self {
        Self::Curve(Arc::from(samples))
    }

    /// Evaluates the curve at `t`, clamped to `0..=1`.
    #[must_use]
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Ease(family, mode) => {
                let ease_in = |t: f32| ease_in(*family, t);
                let ease_out = |t: f32| 1.0 - ease_in(1.0 - t);
                match mode {
                    EaseMode::In => ease_in(t),
                    EaseMode::Out => ease_out(t),
                    EaseMode::InOut => {
                        if t < 0.5 {
                            ease_in(t * 2.0) * 0.5
                        } else {
                            1.0 - ease_in(2.0 - t * 2.0) * 0.5
                        }
                    }
                    EaseMode::OutIn => {
                        if t < 0.5 {
                            ease_out(t * 2.0) * 0.5
                        } else {
                            0.5 + ease_in(t * 2.0 - 1.0) * 0.5
                        }
                    }
                }
            }
            Self::Curve(samples) => sample(samples, t),
        }
    }
}

fn ease_in(family: EaseFamily, t: f32) -> f32 {
    match family {
        EaseFamily::Quad => t * t,
        EaseFamily::Cubic => t * t * t,
        EaseFamily::Quart => t * t * t * t,
        EaseFamily::Quint => t * t * t * t * t,
        EaseFamily::Sine => 1.0 - (t * PI * 0.5).cos(),
        EaseFamily::Expo => {
            if t <= 0.0 {
                0.0
            } else {
                2.0_f32.powf(10.0 * (t - 1.0))
            }
        }
        EaseFamily::Circ => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        EaseFamily::Elastic => {
            if t <= 0.0 || t >= 1.0 {
                return t;
            }
            let period = 0.3;
            let shift = period / 4.0;
            let t = t - 1.0;
            -(2.0_f32.powf(10.0 * t) * ((t - shift) * 2.0 * PI / period).sin())
        }
        EaseFamily::Back => {
            let s = 1.701_58;
            t * t * ((s + 1.0) * t - s)
        }
        EaseFamily::Bounce => 1.0 - bounce_out(1.0 - t),
    }
}

fn bounce_out(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984_375
    }
}

fn sample(samples: &[f32], t: f32) -> f32 {
    match samples.len() {
        0 => t,
        1 => samples[0],
        n => {
            let pos = t * (n - 1) as f32;
            let i = (pos as usize).min(n - 2);
            let frac = pos - i as f32;
            samples[i] + (samples[i + 1] - samples[i]) * frac
        }
    }
}
