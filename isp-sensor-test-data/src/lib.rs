// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
mod i2c_mock;
mod sensor_data;

pub use i2c_mock::{I2cOperation, MockDelay, MockError, MockSensorBus};
pub use sensor_data::{
    gc5603_at_address, imx258_at_address, os08a20_at_address, ox08a4y_at_address, GC5603_ID,
    IMX258_ID, OS08A20_ID, OX08A4Y_ID,
};
