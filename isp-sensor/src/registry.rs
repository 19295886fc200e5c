// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Finding a driver by sensor name.
//!
//! Camera bring-up code usually only knows the name of the sensor it was configured with (from a
//! device tree or a configuration file). [`lookup`] turns that name into a [`CameraDriverConfig`],
//! which can then create drivers for that chip.
use crate::chips::{GC5603, IMX258, OS08A20, OX08A4Y};
use crate::driver::SensorDriver;
use crate::error::ErrorKind;
use crate::model::RegisterModel;
use crate::transport::{BusConfig, RegisterTransport};

/// Where one sensor instance is attached.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstanceConfig {
    pub bus: BusConfig,
}

impl InstanceConfig {
    pub const fn new(bus: BusConfig) -> Self {
        Self { bus }
    }

    /// The same instance on a different bus and sensor address.
    pub const fn at(self, bus_id: u8, address: u8) -> Self {
        Self {
            bus: self.bus.at(bus_id, address),
        }
    }
}

/// A registered chip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraDriverConfig {
    model: &'static RegisterModel,
}

impl CameraDriverConfig {
    pub const fn new(model: &'static RegisterModel) -> Self {
        Self { model }
    }

    /// The lowercase name this chip is registered under.
    pub fn name(&self) -> &'static str {
        self.model.name
    }

    /// The chip's canonical identifier, as read by
    /// [`check_connection`][SensorDriver::check_connection].
    pub fn chip_id(&self) -> u32 {
        self.model.chip_id.expected
    }

    pub fn model(&self) -> &'static RegisterModel {
        self.model
    }

    /// The usual bus configuration for this chip, for callers to adjust.
    pub fn instance_config(&self) -> InstanceConfig {
        InstanceConfig::new(self.model.default_bus)
    }

    /// Create a driver for this chip on an already opened transport.
    pub fn driver<T>(&self, bus: T) -> SensorDriver<T>
    where
        T: RegisterTransport,
    {
        SensorDriver::new(self.model, bus)
    }
}

static DRIVERS: [CameraDriverConfig; 4] = [
    CameraDriverConfig::new(&GC5603),
    CameraDriverConfig::new(&IMX258),
    CameraDriverConfig::new(&OS08A20),
    CameraDriverConfig::new(&OX08A4Y),
];

/// Find the driver registered under `name`.
///
/// Names are matched exactly, including case. An empty name is treated as missing and fails with
/// [`NullPointer`][ErrorKind::NullPointer]; an unknown name fails with
/// [`NotSupported`][ErrorKind::NotSupported].
pub fn lookup(name: &str) -> Result<&'static CameraDriverConfig, ErrorKind> {
    if name.is_empty() {
        return Err(ErrorKind::NullPointer);
    }
    DRIVERS
        .iter()
        .find(|config| config.name() == name)
        .ok_or(ErrorKind::NotSupported)
}

/// Every registered driver.
pub fn drivers() -> impl Iterator<Item = &'static CameraDriverConfig> {
    DRIVERS.iter()
}
