// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! OmniVision OX08A4Y, an automotive 8MP sensor with split-pixel native HDR.
//!
//! In the native HDR mode the chip reads out four channels per frame: high and low conversion
//! gain (HCG and LCG) of the same large-pixel exposure, the small split pixel (SPD), and a very
//! short exposure (VS). LCG shares HCG's integration, and the SPD and VS integrations are derived
//! from it, so only the first integration time requested is used.
use crate::exposure::{ChannelPolicy, ExposureChannel, ExposureEncoding};
use crate::gain::{AnalogGain, LinearGain};
use crate::mode::{
    AfCapability, BayerPattern, HdrMode, ModeDescriptor, ModeEntry, ModeTiming, Rect,
};
use crate::model::{ChipId, RegisterModel, StreamingSequence, TestPatternRegister};
use crate::register::{RegisterField, RegisterWrite};
use crate::register_table;
use crate::transport::{AddressWidth, BusConfig, DataWidth};

const COMMON_INIT: &[RegisterWrite] = &register_table![
    (0x0103, 0x00),
    (0x0304, 0x00),
    (0x0305, 0x2F),
    (0x0307, 0x00),
    (0x0316, 0x00),
    (0x0317, 0x1C),
    (0x0323, 0x05),
    (0x0325, 0x6A),
    (0x0400, 0xE0),
    (0x0600, 0x00),
    (0x3002, 0x03),
    (0x3012, 0x41),
    (0x3019, 0xD2),
    (0x3208, 0x04),
    (0x3600, 0x00),
    (0x3640, 0x14),
    (0x4837, 0x0A),
];

const MODE_LINEAR_INIT: &[RegisterWrite] = &register_table![
    (0x3700, 0x28),
    (0x3808, 0x0F),
    (0x3809, 0x00),
    (0x380A, 0x08),
    (0x380B, 0x70),
    (0x380C, 0x04),
    (0x380D, 0xE2),
    (0x380E, 0x09),
    (0x380F, 0x60),
    (0x3822, 0x00),
    (0x4320, 0x80),
];

const MODE_HDR_INIT: &[RegisterWrite] = &register_table![
    (0x3700, 0x28),
    (0x3808, 0x0F),
    (0x3809, 0x00),
    (0x380A, 0x08),
    (0x380B, 0x70),
    (0x380C, 0x04),
    (0x380D, 0xE2),
    (0x380E, 0x09),
    (0x380F, 0x60),
    (0x3822, 0x0F),
    (0x4320, 0x8F),
    (0x3541, 0x00),
    (0x3542, 0x40),
    (0x35C1, 0x00),
    (0x35C2, 0x10),
];

const TIMING: ModeTiming = ModeTiming {
    frame_length_lines: 2400,
    min_fps: 5.0,
    integration_margin: 12,
    min_integration_lines: 2,
};

const MODES: &[ModeEntry] = &[
    ModeEntry {
        descriptor: ModeDescriptor {
            index: 0,
            bounds: Rect::new(0, 0, 3840, 2160),
            bit_width: 12,
            bayer: BayerPattern::Grbg,
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
            bit_width: 12,
            bayer: BayerPattern::Grbg,
            hdr: HdrMode::NativeDcgSpdVs,
            fps: 30.0,
            ae_delay: 2,
            af: AfCapability::None,
        },
        timing: TIMING,
        init: MODE_HDR_INIT,
    },
];

macro_rules! analog_gain_fields {
    ($base:literal) => {
        &[
            RegisterField::new($base, 4, 4),
            RegisterField::shifted($base + 1, 0, 4, 4),
        ]
    };
}

macro_rules! digital_gain_fields {
    ($base:literal) => {
        &[
            RegisterField::new($base, 10, 4),
            RegisterField::new($base + 1, 2, 8),
            RegisterField::shifted($base + 2, 0, 2, 6),
        ]
    };
}

/// The OX08A4Y register model. Channels are ordered HCG, LCG, SPD, VS.
pub static OX08A4Y: RegisterModel = RegisterModel {
    name: "ox08a4y",
    chip_id: ChipId {
        registers: &[0x300A, 0x300B, 0x300C],
        expected: 0x580841,
    },
    default_bus: BusConfig::new(0, 0x36, AddressWidth::Sixteen, DataWidth::Eight),
    reset: &register_table![(0x0103, 0x01)],
    reset_delay_ms: 100,
    common_init: COMMON_INIT,
    modes: MODES,
    analog_gain: AnalogGain::Linear(LinearGain {
        min: 1.0,
        max: 15.5,
        fractional_bits: 4,
        channels: &[
            analog_gain_fields!(0x3508),
            analog_gain_fields!(0x3588),
            analog_gain_fields!(0x35C8),
            analog_gain_fields!(0x3548),
        ],
    }),
    digital_gain: Some(LinearGain {
        min: 1.0,
        max: 15.99,
        fractional_bits: 10,
        channels: &[
            digital_gain_fields!(0x350A),
            digital_gain_fields!(0x358A),
            digital_gain_fields!(0x35CA),
            digital_gain_fields!(0x354A),
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
                registers: &[],
                max_lines: None,
            },
            ExposureChannel {
                registers: &[
                    RegisterField::new(0x35C1, 8, 8),
                    RegisterField::new(0x35C2, 0, 8),
                ],
                max_lines: None,
            },
            ExposureChannel {
                registers: &[
                    RegisterField::new(0x3541, 8, 8),
                    RegisterField::new(0x3542, 0, 8),
                ],
                max_lines: Some(64),
            },
        ],
        policy: ChannelPolicy::Derived(&[1, 1, 4, 4]),
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
        address: 0x5240,
        enable: 0x01,
        disable: 0x00,
    },
    fps_refreshes_ae_limits: false,
};
