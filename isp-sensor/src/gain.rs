// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Gain encodings.
//!
//! Chips implement gain in one of two ways:
//!
//! * A continuous fixed-point multiplier ([`LinearGain`]). The requested gain is rounded to
//!   `round(gain × 2^fractional_bits)` and split across one or more registers.
//! * A discrete ladder of analog gain steps combined with a fine fixed-point "residual"
//!   multiplier ([`GainLadder`]). The ladder step is the largest one not above the requested
//!   gain, and the residual makes up the difference.
//!
//! In both cases the gain that was actually programmed is returned alongside the raw register
//! values, as the quantized value is what the auto-exposure loop needs to see.
use crate::error::ErrorKind;
use crate::register::{field_capacity, RegisterField};
use crate::util::{ceil_u32, clamp, fixed_point_scale, floor_u32, round_u32};

/// Lower bound, upper bound and quantization step of a controllable value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Limits {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Limits {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A continuous fixed-point gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearGain {
    pub min: f32,

    pub max: f32,

    pub fractional_bits: u8,

    /// The registers for each exposure channel, indexed by channel.
    pub channels: &'static [&'static [RegisterField]],
}

/// A gain value ready to be written.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodedGain {
    pub raw: u32,

    /// The gain the raw value represents.
    pub gain: f32,

    /// Set when the request was outside the encodable range and had to be clamped.
    pub clamped: bool,
}

impl LinearGain {
    pub fn step(&self) -> f32 {
        fixed_point_scale(self.fractional_bits).recip()
    }

    pub fn limits(&self) -> Limits {
        Limits::new(self.min, self.max, self.step())
    }

    pub fn channel(&self, channel: usize) -> Option<&'static [RegisterField]> {
        self.channels.get(channel).copied()
    }

    /// Encode `gain`, clamping it to the supported range.
    ///
    /// Non-finite gains are rejected with [`ErrorKind::InvalidParameter`].
    pub fn encode(&self, gain: f32) -> Result<EncodedGain, ErrorKind> {
        if !gain.is_finite() {
            return Err(ErrorKind::InvalidParameter);
        }
        let scale = fixed_point_scale(self.fractional_bits);
        // Bound the raw value rather than the float so the programmed gain never rounds out of
        // [min, max].
        let raw_min = ceil_u32(self.min * scale);
        let raw_max = floor_u32(self.max * scale);
        let (raw, clamped) = clamp(round_u32(gain * scale), raw_min, raw_max);
        Ok(EncodedGain {
            raw,
            gain: raw as f32 / scale,
            clamped: clamped || !(self.min..=self.max).contains(&gain),
        })
    }
}

/// One step of a discrete analog gain ladder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainStep {
    /// The analog gain this step provides, and the lowest total gain it is selected for.
    pub gain: f32,

    /// The values written to [`LadderRegisters::step_registers`], in order.
    pub registers: &'static [u8],
}

/// The registers one exposure channel's ladder gain is written to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LadderRegisters {
    pub step_registers: &'static [u16],

    pub residual: &'static [RegisterField],
}

/// A discrete gain ladder with a fixed-point residual multiplier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainLadder {
    /// Ordered by ascending gain.
    pub steps: &'static [GainStep],

    pub residual_fractional_bits: u8,

    /// The registers for each exposure channel, indexed by channel.
    pub channels: &'static [LadderRegisters],
}

/// A ladder gain ready to be written.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LadderGain {
    /// Index into [`GainLadder::steps`].
    pub step: usize,

    pub residual_raw: u32,

    /// The total gain (step × residual) that will be programmed.
    pub gain: f32,

    /// Set when the request was above the top of the ladder and had to be clamped.
    pub clamped: bool,
}

impl GainLadder {
    pub fn min(&self) -> f32 {
        self.steps.first().map_or(1.0, |step| step.gain)
    }

    pub fn max(&self) -> f32 {
        self.steps.last().map_or(1.0, |step| step.gain)
    }

    /// The gain range, and the coarsest quantization step anywhere in it.
    ///
    /// The residual resolution scales with the selected ladder step, so the step reported is the
    /// residual resolution at the top of the ladder.
    pub fn limits(&self) -> Limits {
        Limits::new(
            self.min(),
            self.max(),
            self.max() / fixed_point_scale(self.residual_fractional_bits),
        )
    }

    pub fn channel(&self, channel: usize) -> Option<&'static LadderRegisters> {
        self.channels.get(channel)
    }

    /// Find the ladder step for `gain`.
    ///
    /// Requests below the first step fail, requests above the last step select the last step. The
    /// second value is set when the request was clamped.
    pub fn search(&self, gain: f32) -> Result<(usize, bool), ErrorKind> {
        if self.steps.is_empty() {
            return Err(ErrorKind::NotSupported);
        }
        // Written so that NaN also fails.
        if !(gain >= self.min()) {
            return Err(ErrorKind::InvalidParameter);
        }
        let last = self.steps.len() - 1;
        if gain > self.max() {
            return Ok((last, true));
        }
        let index = self
            .steps
            .iter()
            .rposition(|step| step.gain <= gain)
            .unwrap_or(0);
        Ok((index, false))
    }

    /// Decompose `gain` into a ladder step and a residual multiplier.
    pub fn encode(&self, gain: f32) -> Result<LadderGain, ErrorKind> {
        let (step, clamped) = self.search(gain)?;
        let step_gain = self.steps[step].gain;
        let target = if clamped { self.max() } else { gain };
        let scale = fixed_point_scale(self.residual_fractional_bits);
        // The residual never drops below 1x, and never pushes the total past the top of the
        // ladder or past what the residual registers can hold.
        let residual_capacity = self
            .channels
            .iter()
            .map(|channel| field_capacity(channel.residual))
            .min()
            .unwrap_or(0);
        let raw_max = floor_u32(self.max() / step_gain * scale).min(residual_capacity);
        let (residual_raw, _) = clamp(
            round_u32(target / step_gain * scale),
            round_u32(scale),
            raw_max,
        );
        Ok(LadderGain {
            step,
            residual_raw,
            gain: step_gain * residual_raw as f32 / scale,
            clamped,
        })
    }
}

/// How a chip encodes its analog gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnalogGain {
    Linear(LinearGain),
    Ladder(GainLadder),
}

impl AnalogGain {
    pub fn limits(&self) -> Limits {
        match self {
            AnalogGain::Linear(linear) => linear.limits(),
            AnalogGain::Ladder(ladder) => ladder.limits(),
        }
    }

    /// The number of exposure channels this encoding has registers for.
    pub fn channels(&self) -> usize {
        match self {
            AnalogGain::Linear(linear) => linear.channels.len(),
            AnalogGain::Ladder(ladder) => ladder.channels.len(),
        }
    }
}
