// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register writes and bit-field layouts.
//!
//! Values wider than a register (exposure line counts, fixed-point gains, frame lengths) are split
//! across several registers. A [`RegisterField`] describes where one slice of such a value lands.
use bitvec::prelude::*;

use crate::transport::RegisterTransport;

/// A single (address, value) register write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterWrite {
    pub address: u16,
    pub value: u16,
}

impl RegisterWrite {
    pub const fn new(address: u16, value: u16) -> Self {
        Self { address, value }
    }
}

/// Build a `[RegisterWrite; N]` from `(address, value)` pairs.
#[doc(hidden)]
#[macro_export]
macro_rules! register_table {
    ($(($address:expr, $value:expr)),* $(,)?) => {
        [$($crate::register::RegisterWrite::new($address, $value)),*]
    };
}

/// One slice of a multi-register value.
///
/// Bits `lsb..(lsb + width)` of the value are written to the register at `address`, shifted up by
/// `shift` bits within that register. Bits of the register outside the field are written as 0.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterField {
    pub address: u16,

    /// The least significant bit of the value held by this register.
    pub lsb: u8,

    /// How many bits of the value this register holds.
    pub width: u8,

    /// Where the field starts within the register.
    pub shift: u8,
}

impl RegisterField {
    pub const fn new(address: u16, lsb: u8, width: u8) -> Self {
        Self::shifted(address, lsb, width, 0)
    }

    pub const fn shifted(address: u16, lsb: u8, width: u8, shift: u8) -> Self {
        Self {
            address,
            lsb,
            width,
            shift,
        }
    }

    /// The register value holding this field's slice of `value`.
    pub fn extract(&self, value: u32) -> u16 {
        let start = self.lsb as usize;
        let end = start + self.width as usize;
        let part: u16 = value.view_bits::<Lsb0>()[start..end].load_le();
        part << self.shift
    }
}

/// The largest value that can be represented by a set of fields.
pub fn field_capacity(fields: &[RegisterField]) -> u32 {
    let top_bit = fields
        .iter()
        .map(|field| u32::from(field.lsb) + u32::from(field.width))
        .max()
        .unwrap_or(0);
    match top_bit {
        0 => 0,
        32.. => u32::MAX,
        n => (1u32 << n) - 1,
    }
}

/// Write a sequence of registers in order, stopping at the first failure.
///
/// Registers written before the failure are not rolled back.
pub(crate) fn write_sequence<T>(bus: &mut T, writes: &[RegisterWrite]) -> Result<(), T::Error>
where
    T: RegisterTransport,
{
    for write in writes {
        log::trace!("{:#06X} <- {:#04X}", write.address, write.value);
        bus.write_register(write.address, write.value)?;
    }
    Ok(())
}

/// Split `value` across `fields` and write them in order, stopping at the first failure.
pub(crate) fn write_fields<T>(bus: &mut T, fields: &[RegisterField], value: u32) -> Result<(), T::Error>
where
    T: RegisterTransport,
{
    for field in fields {
        let register_value = field.extract(value);
        log::trace!("{:#06X} <- {:#04X}", field.address, register_value);
        bus.write_register(field.address, register_value)?;
    }
    Ok(())
}
