// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register access over the sensor control bus.
//!
//! Sensors are configured over I²C (or the I²C-compatible SCCB/CCI buses). Every access is a
//! register address of one or two bytes followed by one or two bytes of data, big-endian.
//! [`RegisterTransport`] is the only bus interface the drivers depend on. [`SharedI2c`] is an
//! implementation for any `embedded-hal` I²C bus, shared between as many sensors as are attached
//! to it.
use core::cell::{Cell, RefCell};

use embedded_hal::blocking::i2c;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Synchronous access to a single sensor's registers.
///
/// Implementations should not retry failed accesses on their own behalf; the drivers report the
/// failure as-is.
pub trait RegisterTransport {
    type Error;

    /// Read the register at `address`.
    fn read_register(&mut self, address: u16) -> Result<u16, Self::Error>;

    /// Write `value` to the register at `address`.
    fn write_register(&mut self, address: u16, value: u16) -> Result<(), Self::Error>;

    /// The width of the values this transport moves.
    fn data_width(&self) -> DataWidth;
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for &mut T {
    type Error = T::Error;

    fn read_register(&mut self, address: u16) -> Result<u16, Self::Error> {
        (**self).read_register(address)
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<(), Self::Error> {
        (**self).write_register(address, value)
    }

    fn data_width(&self) -> DataWidth {
        (**self).data_width()
    }
}

/// The width of a register address on the wire, in bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AddressWidth {
    Eight = 1,
    Sixteen = 2,
}

/// The width of a register value on the wire, in bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DataWidth {
    Eight = 1,
    Sixteen = 2,
}

impl DataWidth {
    /// The number of bits in one register value.
    pub const fn bits(self) -> u32 {
        (self as u32) * u8::BITS
    }
}

/// Where a sensor lives, and how its registers are addressed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BusConfig {
    /// The bus controller number the sensor is attached to.
    pub bus_id: u8,

    /// The 7-bit I²C address of the sensor.
    pub address: u8,

    pub address_width: AddressWidth,

    pub data_width: DataWidth,
}

impl BusConfig {
    pub const fn new(
        bus_id: u8,
        address: u8,
        address_width: AddressWidth,
        data_width: DataWidth,
    ) -> Self {
        Self {
            bus_id,
            address,
            address_width,
            data_width,
        }
    }

    /// Move this configuration to a different bus and sensor address.
    pub const fn at(self, bus_id: u8, address: u8) -> Self {
        Self {
            bus_id,
            address,
            ..self
        }
    }
}

/// Opens register transports on a shared bus controller and tracks who is using it.
pub trait BusController {
    type Transport: RegisterTransport;

    /// Open a transport to the sensor described by `config`.
    ///
    /// Returns `None` when no transport can be opened at that configuration.
    fn open(&mut self, config: &BusConfig) -> Option<Self::Transport>;

    /// Take a reference on the underlying bus for this transport.
    fn add_ref(
        &mut self,
        transport: &mut Self::Transport,
    ) -> Result<(), <Self::Transport as RegisterTransport>::Error>;

    /// Drop a reference taken with [`add_ref`][BusController::add_ref].
    fn del_ref(
        &mut self,
        transport: &mut Self::Transport,
    ) -> Result<(), <Self::Transport as RegisterTransport>::Error>;

    /// Close a transport. The transport is consumed, so it cannot be closed twice.
    fn close(
        &mut self,
        transport: Self::Transport,
    ) -> Result<(), <Self::Transport as RegisterTransport>::Error>;
}

/// An `embedded-hal` I²C bus that can be shared between several sensors.
///
/// The bus itself is the [`BusController`] (by shared reference), handing out an
/// [`I2cTransport`] per sensor.
#[derive(Debug)]
pub struct SharedI2c<I2C> {
    bus_id: u8,
    bus: RefCell<I2C>,
    references: Cell<usize>,
}

impl<I2C> SharedI2c<I2C> {
    pub fn new(bus_id: u8, bus: I2C) -> Self {
        Self {
            bus_id,
            bus: RefCell::new(bus),
            references: Cell::new(0),
        }
    }

    pub fn bus_id(&self) -> u8 {
        self.bus_id
    }

    /// The number of transports currently holding a reference on this bus.
    pub fn references(&self) -> usize {
        self.references.get()
    }

    pub fn into_inner(self) -> I2C {
        self.bus.into_inner()
    }
}

/// Register access to one sensor on a [`SharedI2c`] bus.
#[derive(Debug)]
pub struct I2cTransport<'a, I2C> {
    bus: &'a RefCell<I2C>,
    address: u8,
    address_width: AddressWidth,
    data_width: DataWidth,
}

impl<'a, I2C> I2cTransport<'a, I2C> {
    fn address_bytes(&self, address: u16) -> ([u8; 2], usize) {
        match self.address_width {
            AddressWidth::Eight => ([address as u8, 0], 1),
            AddressWidth::Sixteen => (address.to_be_bytes(), 2),
        }
    }
}

impl<'a, I2C, E> RegisterTransport for I2cTransport<'a, I2C>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
{
    type Error = E;

    fn read_register(&mut self, address: u16) -> Result<u16, Self::Error> {
        let (address_bytes, address_len) = self.address_bytes(address);
        let mut value_bytes = [0u8; 2];
        let value_len = u8::from(self.data_width) as usize;
        self.bus.borrow_mut().write_read(
            self.address,
            &address_bytes[..address_len],
            &mut value_bytes[..value_len],
        )?;
        Ok(match self.data_width {
            DataWidth::Eight => u16::from(value_bytes[0]),
            DataWidth::Sixteen => u16::from_be_bytes(value_bytes),
        })
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<(), Self::Error> {
        let (address_bytes, address_len) = self.address_bytes(address);
        let mut combined = [0u8; 4];
        combined[..address_len].copy_from_slice(&address_bytes[..address_len]);
        let total_len = match self.data_width {
            DataWidth::Eight => {
                combined[address_len] = value as u8;
                address_len + 1
            }
            DataWidth::Sixteen => {
                combined[address_len..(address_len + 2)].copy_from_slice(&value.to_be_bytes());
                address_len + 2
            }
        };
        self.bus
            .borrow_mut()
            .write(self.address, &combined[..total_len])
    }

    fn data_width(&self) -> DataWidth {
        self.data_width
    }
}

impl<'a, I2C, E> BusController for &'a SharedI2c<I2C>
where
    I2C: i2c::Write<Error = E> + i2c::WriteRead<Error = E>,
{
    type Transport = I2cTransport<'a, I2C>;

    fn open(&mut self, config: &BusConfig) -> Option<Self::Transport> {
        let shared: &'a SharedI2c<I2C> = *self;
        // 0x00 is the general call address, and anything above 0x7F isn't a 7-bit address.
        if config.bus_id != shared.bus_id || config.address == 0 || config.address > 0x7F {
            return None;
        }
        Some(I2cTransport {
            bus: &shared.bus,
            address: config.address,
            address_width: config.address_width,
            data_width: config.data_width,
        })
    }

    fn add_ref(&mut self, _transport: &mut Self::Transport) -> Result<(), E> {
        self.references.set(self.references.get() + 1);
        Ok(())
    }

    fn del_ref(&mut self, _transport: &mut Self::Transport) -> Result<(), E> {
        self.references.set(self.references.get().saturating_sub(1));
        Ok(())
    }

    fn close(&mut self, transport: Self::Transport) -> Result<(), E> {
        log::trace!("closing transport to {:#04X}", transport.address);
        Ok(())
    }
}
