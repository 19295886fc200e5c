// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Per-chip register models.
//!
//! A [`RegisterModel`] is everything that distinguishes one sensor chip from another: its mode
//! table, its gain and exposure encodings, its streaming sequences, and how to identify it. The
//! state machine in [`SensorDriver`][crate::SensorDriver] is shared by every chip, and only ever
//! consults the model. Models are plain `static` data; see the [`chips`][crate::chips] module.
use crate::error::ErrorKind;
use crate::exposure::ExposureEncoding;
use crate::gain::{AnalogGain, LinearGain};
use crate::mode::{Caps, ModeDescriptor, ModeEntry, MAX_MODES};
use crate::register::{RegisterField, RegisterWrite};
use crate::transport::BusConfig;

/// Where a chip keeps its identifier, and the value it should read back as.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChipId {
    /// Identifier registers, most significant first.
    pub registers: &'static [u16],

    pub expected: u32,
}

impl ChipId {
    /// Combine register values (most significant first) into one identifier.
    pub fn compose<I>(values: I, data_bits: u32) -> u32
    where
        I: IntoIterator<Item = u16>,
    {
        values.into_iter().fold(0u32, |id, value| {
            id.checked_shl(data_bits).unwrap_or(0) | u32::from(value)
        })
    }
}

/// The register writes that start and stop the output stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamingSequence {
    pub on: &'static [RegisterWrite],
    pub off: &'static [RegisterWrite],
}

/// The single register controlling the test pattern generator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TestPatternRegister {
    pub address: u16,
    pub enable: u16,
    pub disable: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegisterModel {
    /// The lowercase name the chip is registered under.
    pub name: &'static str,

    pub chip_id: ChipId,

    pub default_bus: BusConfig,

    /// Written before every mode's init sequence, followed by `reset_delay_ms`.
    pub reset: &'static [RegisterWrite],

    pub reset_delay_ms: u32,

    /// Written after the reset delay, before the mode's own init sequence.
    pub common_init: &'static [RegisterWrite],

    pub modes: &'static [ModeEntry],

    pub analog_gain: AnalogGain,

    /// `None` for chips without a separately controllable digital gain.
    pub digital_gain: Option<LinearGain>,

    pub exposure: ExposureEncoding,

    /// The frame length (VTS) registers.
    pub frame_length: &'static [RegisterField],

    pub streaming: StreamingSequence,

    pub test_pattern: TestPatternRegister,

    /// Whether a frame rate change also moves the integration time limit reported to the
    /// auto-exposure loop. The line limit used for clamping always follows the frame length.
    pub fps_refreshes_ae_limits: bool,
}

impl RegisterModel {
    /// Look up a mode by its index.
    pub fn mode(&self, index: u8) -> Option<&'static ModeEntry> {
        self.modes
            .iter()
            .find(|entry| entry.descriptor.index == index)
    }

    /// The mode at position `index` of the mode table.
    ///
    /// Indices past [`MAX_MODES`] are out of range for every chip, while indices past the end of
    /// this chip's table are unsupported.
    pub fn enum_mode(&self, index: usize) -> Result<ModeDescriptor, ErrorKind> {
        if index >= MAX_MODES {
            return Err(ErrorKind::OutOfRange);
        }
        self.modes
            .get(index)
            .map(|entry| entry.descriptor)
            .ok_or(ErrorKind::NotSupported)
    }

    pub fn modes(&self) -> impl Iterator<Item = &'static ModeDescriptor> {
        self.modes.iter().map(|entry| &entry.descriptor)
    }

    pub fn caps(&self) -> Option<Caps> {
        Caps::from_modes(self.modes)
    }
}
