// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Sony IMX258, a 13MP sensor usually paired with a VCM focus actuator.
//!
//! The analog gain code `c` gives a gain of `512 / (512 - c)`, and only a handful of codes are
//! used. The rest of the requested gain goes to the global digital gain. Stopping the stream also
//! drops the CSI-2 lane count to one.
use crate::exposure::{ChannelPolicy, ExposureChannel, ExposureEncoding};
use crate::gain::{AnalogGain, GainLadder, GainStep, LadderRegisters};
use crate::mode::{
    AfCapability, BayerPattern, HdrMode, ModeDescriptor, ModeEntry, ModeTiming, Rect,
};
use crate::model::{ChipId, RegisterModel, StreamingSequence, TestPatternRegister};
use crate::register::{RegisterField, RegisterWrite};
use crate::register_table;
use crate::transport::{AddressWidth, BusConfig, DataWidth};

const COMMON_INIT: &[RegisterWrite] = &register_table![
    (0x0136, 0x18),
    (0x0137, 0x00),
    (0x3051, 0x00),
    (0x3052, 0x00),
    (0x4E21, 0x14),
    (0x6B11, 0xCF),
    (0x7FF0, 0x08),
    (0x7FF1, 0x0F),
    (0x7FF2, 0x08),
    (0x7FF3, 0x1B),
    (0x7FF4, 0x23),
    (0x7FF5, 0x60),
    (0x7FF6, 0x00),
    (0x7FF7, 0x01),
    (0x7FF8, 0x00),
    (0x7FF9, 0x78),
    (0x0114, 0x03),
];

const MODE_FULL_INIT: &[RegisterWrite] = &register_table![
    (0x0301, 0x05),
    (0x0303, 0x02),
    (0x0305, 0x04),
    (0x0306, 0x00),
    (0x0307, 0x6C),
    (0x0340, 0x0C),
    (0x0341, 0x98),
    (0x0342, 0x14),
    (0x0343, 0xE8),
    (0x0344, 0x00),
    (0x0345, 0x00),
    (0x0346, 0x00),
    (0x0347, 0x00),
    (0x0348, 0x10),
    (0x0349, 0x6F),
    (0x034A, 0x0C),
    (0x034B, 0x2F),
    (0x0900, 0x00),
    (0x0901, 0x11),
    (0x034C, 0x10),
    (0x034D, 0x70),
    (0x034E, 0x0C),
    (0x034F, 0x30),
];

const MODE_BINNED_INIT: &[RegisterWrite] = &register_table![
    (0x0301, 0x05),
    (0x0303, 0x02),
    (0x0305, 0x04),
    (0x0306, 0x00),
    (0x0307, 0x6C),
    (0x0340, 0x06),
    (0x0341, 0x4C),
    (0x0342, 0x14),
    (0x0343, 0xE8),
    (0x0344, 0x00),
    (0x0345, 0x00),
    (0x0346, 0x00),
    (0x0347, 0x00),
    (0x0348, 0x10),
    (0x0349, 0x6F),
    (0x034A, 0x0C),
    (0x034B, 0x2F),
    (0x0900, 0x01),
    (0x0901, 0x12),
    (0x034C, 0x08),
    (0x034D, 0x38),
    (0x034E, 0x06),
    (0x034F, 0x18),
];

const MODES: &[ModeEntry] = &[
    ModeEntry {
        descriptor: ModeDescriptor {
            index: 0,
            bounds: Rect::new(0, 0, 4208, 3120),
            bit_width: 10,
            bayer: BayerPattern::Rggb,
            hdr: HdrMode::Linear,
            fps: 30.0,
            ae_delay: 2,
            af: AfCapability::Vcm,
        },
        timing: ModeTiming {
            frame_length_lines: 3224,
            min_fps: 5.0,
            integration_margin: 10,
            min_integration_lines: 1,
        },
        init: MODE_FULL_INIT,
    },
    ModeEntry {
        descriptor: ModeDescriptor {
            index: 1,
            bounds: Rect::new(0, 0, 2104, 1560),
            bit_width: 10,
            bayer: BayerPattern::Rggb,
            hdr: HdrMode::Linear,
            fps: 60.0,
            ae_delay: 2,
            af: AfCapability::Vcm,
        },
        timing: ModeTiming {
            frame_length_lines: 1612,
            min_fps: 5.0,
            integration_margin: 10,
            min_integration_lines: 1,
        },
        init: MODE_BINNED_INIT,
    },
];

// High and low bytes of the analog gain code.
const GAIN_STEPS: &[GainStep] = &[
    GainStep {
        gain: 1.0,
        registers: &[0x00, 0x00],
    },
    GainStep {
        gain: 1.333_333_4,
        registers: &[0x00, 0x80],
    },
    GainStep {
        gain: 2.0,
        registers: &[0x01, 0x00],
    },
    GainStep {
        gain: 2.666_666_7,
        registers: &[0x01, 0x40],
    },
    GainStep {
        gain: 4.0,
        registers: &[0x01, 0x80],
    },
    GainStep {
        gain: 5.333_333_5,
        registers: &[0x01, 0xA0],
    },
    GainStep {
        gain: 8.0,
        registers: &[0x01, 0xC0],
    },
    GainStep {
        gain: 10.666_667,
        registers: &[0x01, 0xD0],
    },
    GainStep {
        gain: 16.0,
        registers: &[0x01, 0xE0],
    },
];

/// The IMX258 register model.
pub static IMX258: RegisterModel = RegisterModel {
    name: "imx258",
    chip_id: ChipId {
        registers: &[0x0016, 0x0017],
        expected: 0x0258,
    },
    default_bus: BusConfig::new(0, 0x1A, AddressWidth::Sixteen, DataWidth::Eight),
    reset: &register_table![(0x0103, 0x01)],
    reset_delay_ms: 20,
    common_init: COMMON_INIT,
    modes: MODES,
    analog_gain: AnalogGain::Ladder(GainLadder {
        steps: GAIN_STEPS,
        residual_fractional_bits: 8,
        channels: &[LadderRegisters {
            step_registers: &[0x0204, 0x0205],
            residual: &[
                RegisterField::new(0x020E, 8, 4),
                RegisterField::new(0x020F, 0, 8),
            ],
        }],
    }),
    digital_gain: None,
    exposure: ExposureEncoding {
        channels: &[ExposureChannel {
            registers: &[
                RegisterField::new(0x0202, 8, 8),
                RegisterField::new(0x0203, 0, 8),
            ],
            max_lines: None,
        }],
        policy: ChannelPolicy::Independent,
    },
    frame_length: &[
        RegisterField::new(0x0340, 8, 8),
        RegisterField::new(0x0341, 0, 8),
    ],
    streaming: StreamingSequence {
        on: &register_table![(0x0114, 0x03), (0x0100, 0x01)],
        off: &register_table![(0x0100, 0x00), (0x0114, 0x01)],
    },
    test_pattern: TestPatternRegister {
        address: 0x0601,
        enable: 0x02,
        disable: 0x00,
    },
    fps_refreshes_ae_limits: true,
};
