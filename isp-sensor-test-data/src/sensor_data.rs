// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Chip identification registers as the real parts report them after power-up.
use crate::i2c_mock::MockSensorBus;

pub const OS08A20_ID: &[(u16, u8)] = &[(0x300A, 0x53), (0x300B, 0x08), (0x300C, 0x41)];

pub const OX08A4Y_ID: &[(u16, u8)] = &[(0x300A, 0x58), (0x300B, 0x08), (0x300C, 0x41)];

pub const GC5603_ID: &[(u16, u8)] = &[(0x03F0, 0x56), (0x03F1, 0x03)];

pub const IMX258_ID: &[(u16, u8)] = &[(0x0016, 0x02), (0x0017, 0x58)];

pub fn os08a20_at_address(i2c_address: u8) -> MockSensorBus {
    MockSensorBus::with_registers(i2c_address, OS08A20_ID)
}

pub fn ox08a4y_at_address(i2c_address: u8) -> MockSensorBus {
    MockSensorBus::with_registers(i2c_address, OX08A4Y_ID)
}

pub fn gc5603_at_address(i2c_address: u8) -> MockSensorBus {
    MockSensorBus::with_registers(i2c_address, GC5603_ID)
}

pub fn imx258_at_address(i2c_address: u8) -> MockSensorBus {
    MockSensorBus::with_registers(i2c_address, IMX258_ID)
}
