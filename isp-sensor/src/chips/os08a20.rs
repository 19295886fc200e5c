// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! OmniVision OS08A20, an 8MP sensor with two-exposure staggered HDR.
use crate::exposure::{ChannelPolicy, ExposureChannel, ExposureEncoding};
use crate::gain::{AnalogGain, LinearGain};
use crate::mode::{
    AfCapability, BayerPattern, HdrMode, ModeDescriptor, ModeEntry, ModeTiming, Rect,
};
use crate::model::{ChipId, RegisterModel, StreamingSequence, TestPatternRegister};
use crate::register::{RegisterField, RegisterWrite};
use crate::register_table;
use crate::transport::{AddressWidth, BusConfig, DataWidth};

const RESET: &[RegisterWrite] = &register_table![(0x0103, 0x01)];

const COMMON_INIT: &[RegisterWrite] = &register_table![
    (0x0303, 0x01),
    (0x0305, 0x5A),
    (0x0306, 0x00),
    (0x0308, 0x03),
    (0x0309, 0x04),
    (0x032A, 0x00),
    (0x300F, 0x11),
    (0x3010, 0x01),
    (0x3012, 0x41),
    (0x3016, 0xF0),
    (0x301E, 0x98),
    (0x3031, 0xA9),
    (0x3103, 0x92),
    (0x3104, 0x01),
    (0x3106, 0x10),
    (0x3400, 0x04),
    (0x3025, 0x03),
    (0x3425, 0x01),
    (0x3428, 0x01),
    (0x3406, 0x08),
    (0x3408, 0x03),
    (0x3501, 0x08),
    (0x3502, 0x6F),
    (0x3505, 0x83),
    (0x3508, 0x00),
    (0x3509, 0x80),
    (0x350A, 0x04),
    (0x350B, 0x00),
    (0x350C, 0x00),
];

const MODE_LINEAR_INIT: &[RegisterWrite] = &register_table![
    (0x3661, 0x07),
    (0x3662, 0x00),
    (0x3800, 0x00),
    (0x3801, 0x00),
    (0x3802, 0x00),
    (0x3803, 0x0C),
    (0x3804, 0x0F),
    (0x3805, 0x0F),
    (0x3806, 0x08),
    (0x3807, 0x7B),
    (0x3808, 0x0F),
    (0x3809, 0x00),
    (0x380A, 0x08),
    (0x380B, 0x70),
    (0x380C, 0x04),
    (0x380D, 0x0C),
    (0x380E, 0x09),
    (0x380F, 0x0C),
    (0x3821, 0x04),
    (0x4837, 0x0A),
];

const MODE_STITCH_INIT: &[RegisterWrite] = &register_table![
    (0x3661, 0x07),
    (0x3662, 0x00),
    (0x3800, 0x00),
    (0x3801, 0x00),
    (0x3802, 0x00),
    (0x3803, 0x0C),
    (0x3804, 0x0F),
    (0x3805, 0x0F),
    (0x3806, 0x08),
    (0x3807, 0x7B),
    (0x3808, 0x0F),
    (0x3809, 0x00),
    (0x380A, 0x08),
    (0x380B, 0x70),
    (0x380C, 0x02),
    (0x380D, 0x06),
    (0x380E, 0x09),
    (0x380F, 0x0C),
    (0x3821, 0x24),
    (0x3511, 0x00),
    (0x3512, 0x20),
    (0x4837, 0x0A),
];

const TIMING: ModeTiming = ModeTiming {
    frame_length_lines: 2316,
    min_fps: 5.0,
    integration_margin: 8,
    min_integration_lines: 2,
};

const MODES: &[ModeEntry] = &[
    ModeEntry {
        descriptor: ModeDescriptor {
            index: 0,
            bounds: Rect::new(0, 0, 3840, 2160),
            bit_width: 10,
            bayer: BayerPattern::Bggr,
            hdr: HdrMode::Linear,
            fps: 30.0,
            ae_delay: 2,
            af: AfCapability::None,
        },
        timing: TIMING,
        init: MODE_LINEAR_INIT,
    },
    ModeEntry {
        descriptor: ModeDescriptor {
            index: 1,
            bounds: Rect::new(0, 0, 3840, 2160),
            bit_width: 10,
            bayer: BayerPattern::Bggr,
            hdr: HdrMode::Stitch2,
            fps: 30.0,
            ae_delay: 2,
            af: AfCapability::None,
        },
        timing: TIMING,
        init: MODE_STITCH_INIT,
    },
];

/// The OS08A20 register model.
pub static OS08A20: RegisterModel = RegisterModel {
    name: "os08a20",
    chip_id: ChipId {
        registers: &[0x300A, 0x300B, 0x300C],
        expected: 0x530841,
    },
    default_bus: BusConfig::new(0, 0x36, AddressWidth::Sixteen, DataWidth::Eight),
    reset: RESET,
    reset_delay_ms: 100,
    common_init: COMMON_INIT,
    modes: MODES,
    // Long exposure, then short.
    analog_gain: AnalogGain::Linear(LinearGain {
        min: 1.0,
        max: 15.5,
        fractional_bits: 7,
        channels: &[
            &[
                RegisterField::new(0x3508, 8, 6),
                RegisterField::new(0x3509, 0, 8),
            ],
            &[
                RegisterField::new(0x3548, 8, 6),
                RegisterField::new(0x3549, 0, 8),
            ],
        ],
    }),
    digital_gain: Some(LinearGain {
        min: 1.0,
        max: 15.99,
        fractional_bits: 10,
        channels: &[
            &[
                RegisterField::new(0x350A, 10, 4),
                RegisterField::new(0x350B, 2, 8),
                RegisterField::shifted(0x350C, 0, 2, 6),
            ],
            &[
                RegisterField::new(0x354A, 10, 4),
                RegisterField::new(0x354B, 2, 8),
                RegisterField::shifted(0x354C, 0, 2, 6),
            ],
        ],
    }),
    exposure: ExposureEncoding {
        channels: &[
            ExposureChannel {
                registers: &[
                    RegisterField::new(0x3501, 8, 8),
                    RegisterField::new(0x3502, 0, 8),
                ],
                max_lines: None,
            },
            ExposureChannel {
                registers: &[
                    RegisterField::new(0x3511, 8, 8),
                    RegisterField::new(0x3512, 0, 8),
                ],
                max_lines: None,
            },
        ],
        policy: ChannelPolicy::Independent,
    },
    frame_length: &[
        RegisterField::new(0x380E, 8, 8),
        RegisterField::new(0x380F, 0, 8),
    ],
    streaming: StreamingSequence {
        on: &register_table![(0x0100, 0x01)],
        off: &register_table![(0x0100, 0x00)],
    },
    test_pattern: TestPatternRegister {
        address: 0x5081,
        enable: 0x80,
        disable: 0x00,
    },
    fps_refreshes_ae_limits: true,
};

