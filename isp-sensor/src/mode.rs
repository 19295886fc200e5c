// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Sensor operating modes.
use arrayvec::ArrayVec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::register::RegisterWrite;

/// The most modes a single chip can describe.
pub const MAX_MODES: usize = 16;

/// The most exposure channels any HDR mode uses.
pub const MAX_CHANNELS: usize = 4;

/// A rectangle on the pixel array, in pixels.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Rect {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(left: u16, top: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub const fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }
}

/// The color filter array order of the first 2×2 block of pixels.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BayerPattern {
    Rggb = 0,
    Grbg = 1,
    Gbrg = 2,
    Bggr = 3,
}

/// How many exposures are captured per frame, and how they relate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum HdrMode {
    /// A single exposure.
    Linear = 0,

    /// Long and short exposures, stitched downstream.
    Stitch2 = 1,

    /// High and low conversion gain readouts of the same exposure.
    NativeDcg = 2,

    /// High and low conversion gain, plus the split-pixel (spotlight) and very short exposures.
    NativeDcgSpdVs = 3,
}

impl HdrMode {
    /// The number of independently gained exposure channels in this mode.
    pub const fn channels(self) -> usize {
        match self {
            HdrMode::Linear => 1,
            HdrMode::Stitch2 | HdrMode::NativeDcg => 2,
            HdrMode::NativeDcgSpdVs => 4,
        }
    }
}

/// Whether a mode can drive a focus actuator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AfCapability {
    None = 0,
    Vcm = 1,
}

/// The externally visible description of a mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeDescriptor {
    pub index: u8,

    /// The active output window on the pixel array.
    pub bounds: Rect,

    pub bit_width: u8,

    pub bayer: BayerPattern,

    pub hdr: HdrMode,

    /// The maximum (and nominal) frame rate.
    pub fps: f32,

    /// Frames between programming a new gain or exposure and seeing it in the output.
    pub ae_delay: u8,

    pub af: AfCapability,
}

impl ModeDescriptor {
    pub const fn channels(&self) -> usize {
        self.hdr.channels()
    }
}

/// The frame timing a mode is calibrated for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeTiming {
    /// Frame length in lines (VTS) at the nominal frame rate.
    pub frame_length_lines: u32,

    /// The slowest frame rate the frame length register can reach.
    pub min_fps: f32,

    /// Lines that must remain between the longest integration and the end of the frame.
    pub integration_margin: u32,

    /// The shortest integration the chip supports, in lines.
    pub min_integration_lines: u32,
}

impl ModeTiming {
    /// The time one line takes at the nominal frame rate, in seconds.
    pub fn one_line_exp_time(&self, nominal_fps: f32) -> f32 {
        1.0 / (nominal_fps * self.frame_length_lines as f32)
    }

    /// The longest integration that fits in a frame of `frame_length_lines`.
    pub fn max_integration_lines(&self, frame_length_lines: u32) -> u32 {
        frame_length_lines
            .saturating_sub(self.integration_margin)
            .max(self.min_integration_lines)
    }
}

/// A mode as stored in a chip's mode table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeEntry {
    pub descriptor: ModeDescriptor,

    pub timing: ModeTiming,

    /// The register sequence programming the chip into this mode.
    pub init: &'static [RegisterWrite],
}

/// A summary of what a chip can do across all of its modes.
#[derive(Clone, Debug, PartialEq)]
pub struct Caps {
    pub mode_count: usize,

    /// Every HDR mode at least one mode uses, in order of first appearance.
    pub hdr_modes: ArrayVec<HdrMode, 4>,

    /// The largest output window of any mode.
    pub max_bounds: Rect,

    /// The widest pixel bit width of any mode.
    pub max_bit_width: u8,

    pub bayer: BayerPattern,

    pub af: AfCapability,
}

impl Caps {
    pub(crate) fn from_modes(modes: &[ModeEntry]) -> Option<Self> {
        let first = modes.first()?;
        let mut caps = Caps {
            mode_count: modes.len(),
            hdr_modes: ArrayVec::new(),
            max_bounds: first.descriptor.bounds,
            max_bit_width: first.descriptor.bit_width,
            bayer: first.descriptor.bayer,
            af: AfCapability::None,
        };
        for descriptor in modes.iter().map(|entry| &entry.descriptor) {
            if !caps.hdr_modes.contains(&descriptor.hdr) {
                // Only four HDR modes exist, so this can't overflow.
                caps.hdr_modes.push(descriptor.hdr);
            }
            if descriptor.bounds.area() > caps.max_bounds.area() {
                caps.max_bounds = descriptor.bounds;
            }
            caps.max_bit_width = caps.max_bit_width.max(descriptor.bit_width);
            if descriptor.af == AfCapability::Vcm {
                caps.af = AfCapability::Vcm;
            }
        }
        Some(caps)
    }

    pub fn supports(&self, hdr: HdrMode) -> bool {
        self.hdr_modes.contains(&hdr)
    }
}
