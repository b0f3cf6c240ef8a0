//! Height remapping curve.
//!
//! A keyframed curve evaluated on normalized noise values before they are
//! scaled to world height. Generation code always evaluates a private clone
//! of the caller's curve, so a curve edited on the owning thread is never read
//! concurrently from a worker.
use serde::{Deserialize, Serialize};

/// How values between two keys are blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    /// Smoothstep between keys: flat at every key, still monotone when the
    /// key values are.
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightCurve {
    keys: Vec<CurveKey>,
    #[serde(default)]
    interpolation: Interpolation,
}

impl HeightCurve {
    /// Build a curve from `(time, value)` pairs. Keys are sorted by time;
    /// an empty key list evaluates to the identity.
    pub fn new(keys: impl IntoIterator<Item = (f32, f32)>, interpolation: Interpolation) -> Self {
        let mut keys: Vec<CurveKey> = keys
            .into_iter()
            .map(|(time, value)| CurveKey { time, value })
            .collect();
        keys.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        Self { keys, interpolation }
    }

    /// Identity on `[0, 1]`.
    pub fn linear() -> Self {
        Self::new([(0.0, 0.0), (1.0, 1.0)], Interpolation::Linear)
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// True when every key's value is at least the previous key's value.
    pub fn is_monotonic(&self) -> bool {
        self.keys.windows(2).all(|w| w[1].value >= w[0].value)
    }

    /// Evaluate at `t`, clamping to the first/last key outside the key range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return t,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; exists because t < last.time.
        let hi = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[hi - 1];
        let b = self.keys[hi];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.value;
        }
        let mut f = (t - a.time) / span;
        if self.interpolation == Interpolation::Smooth {
            f = f * f * (3.0 - 2.0 * f);
        }
        a.value + (b.value - a.value) * f
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}
