// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! GalaxyCore GC5603, a 5MP sensor with a stepped analog gain.
//!
//! Analog gain is chosen from a fixed table of steps, each needing three register values. The
//! remaining gain is made up with a 6-bit fractional "pre-gain" multiplier, so there is no
//! separately controllable digital gain.
use crate::exposure::{ChannelPolicy, ExposureChannel, ExposureEncoding};
use crate::gain::{AnalogGain, GainLadder, GainStep, LadderRegisters};
use crate::mode::{
    AfCapability, BayerPattern, HdrMode, ModeDescriptor, ModeEntry, ModeTiming, Rect,
};
use crate::model::{ChipId, RegisterModel, StreamingSequence, TestPatternRegister};
use crate::register::{RegisterField, RegisterWrite};
use crate::register_table;
use crate::transport::{AddressWidth, BusConfig, DataWidth};

const RESET: &[RegisterWrite] = &register_table![(0x03FE, 0xF0), (0x03FE, 0xF0), (0x03FE, 0x00)];

const MODE_0_INIT: &[RegisterWrite] = &register_table![
    (0x0315, 0xD4),
    (0x0D06, 0x01),
    (0x0A70, 0x80),
    (0x031A, 0x00),
    (0x0314, 0x00),
    (0x0130, 0x08),
    (0x0132, 0x01),
    (0x0136, 0x38),
    (0x0137, 0x03),
    (0x0134, 0x5B),
    (0x031C, 0xE0),
    (0x0D82, 0x14),
    (0x0DD1, 0x56),
    (0x0AF4, 0x01),
    (0x0002, 0x10),
    (0x00C3, 0x34),
    (0x0084, 0x21),
    (0x0D05, 0xCC),
    (0x0218, 0x00),
    (0x005E, 0x48),
    (0x0D08, 0xA6),
    (0x0D0A, 0x04),
    (0x0D0B, 0x5E),
    (0x0D41, 0x06),
    (0x0D42, 0xD6),
    (0x0340, 0x06),
    (0x0341, 0xD6),
    (0x0346, 0x00),
    (0x0347, 0x04),
    (0x0348, 0x0B),
    (0x0349, 0x98),
    (0x034A, 0x06),
    (0x034B, 0x8A),
    (0x0094, 0x0B),
    (0x0095, 0x90),
    (0x0096, 0x06),
    (0x0097, 0x82),
];

const MODES: &[ModeEntry] = &[ModeEntry {
    descriptor: ModeDescriptor {
        index: 0,
        bounds: Rect::new(0, 0, 2960, 1666),
        bit_width: 10,
        bayer: BayerPattern::Rggb,
        hdr: HdrMode::Linear,
        fps: 30.0,
        ae_delay: 2,
        af: AfCapability::None,
    },
    timing: ModeTiming {
        frame_length_lines: 1750,
        min_fps: 5.0,
        integration_margin: 16,
        min_integration_lines: 4,
    },
    init: MODE_0_INIT,
}];

macro_rules! step {
    ($gain:literal, [$($value:literal),+]) => {
        GainStep {
            gain: $gain,
            registers: &[$($value),+],
        }
    };
}

// Registers 0x0614, 0x0615 and 0x0218.
const GAIN_STEPS: &[GainStep] = &[
    step!(1.0, [0x00, 0x00, 0x00]),
    step!(1.1875, [0x90, 0x02, 0x00]),
    step!(1.40625, [0x00, 0x00, 0x01]),
    step!(1.6875, [0x90, 0x02, 0x01]),
    step!(2.0, [0x01, 0x00, 0x00]),
    step!(2.375, [0x91, 0x02, 0x00]),
    step!(2.8125, [0x01, 0x00, 0x01]),
    step!(3.375, [0x91, 0x02, 0x01]),
    step!(4.0, [0x02, 0x00, 0x00]),
    step!(4.75, [0x92, 0x02, 0x00]),
    step!(5.625, [0x02, 0x00, 0x01]),
    step!(6.75, [0x92, 0x02, 0x01]),
    step!(8.0, [0x03, 0x00, 0x00]),
    step!(9.5, [0x93, 0x02, 0x00]),
    step!(11.25, [0x03, 0x00, 0x01]),
    step!(13.5, [0x93, 0x02, 0x01]),
    step!(16.0, [0x04, 0x00, 0x00]),
];

/// The GC5603 register model.
pub static GC5603: RegisterModel = RegisterModel {
    name: "gc5603",
    chip_id: ChipId {
        registers: &[0x03F0, 0x03F1],
        expected: 0x5603,
    },
    default_bus: BusConfig::new(0, 0x31, AddressWidth::Sixteen, DataWidth::Eight),
    reset: RESET,
    reset_delay_ms: 100,
    common_init: &[],
    modes: MODES,
    analog_gain: AnalogGain::Ladder(GainLadder {
        steps: GAIN_STEPS,
        residual_fractional_bits: 6,
        channels: &[LadderRegisters {
            step_registers: &[0x0614, 0x0615, 0x0218],
            residual: &[
                RegisterField::new(0x020E, 6, 4),
                RegisterField::shifted(0x020F, 0, 6, 2),
            ],
        }],
    }),
    digital_gain: None,
    exposure: ExposureEncoding {
        channels: &[ExposureChannel {
            registers: &[
                RegisterField::new(0x0202, 8, 6),
                RegisterField::new(0x0203, 0, 8),
            ],
            max_lines: None,
        }],
        policy: ChannelPolicy::Independent,
    },
    frame_length: &[
        RegisterField::new(0x0340, 8, 6),
        RegisterField::new(0x0341, 0, 8),
    ],
    streaming: StreamingSequence {
        on: &register_table![(0x0100, 0x09)],
        off: &register_table![(0x0100, 0x00)],
    },
    test_pattern: TestPatternRegister {
        address: 0x008C,
        enable: 0x11,
        disable: 0x10,
    },
    fps_refreshes_ae_limits: false,
};
