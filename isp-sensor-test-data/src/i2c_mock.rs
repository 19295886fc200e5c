// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::{Cell, Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use embedded_hal::blocking::{delay, i2c};

const RECENT_OPERATIONS_QUEUE_LENGTH: usize = 512;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The requested operation is not allowed.
    ///
    /// This covers writes without a full register address and write-read transactions that write
    /// more than an address or read nothing at all.
    IllegalOperation,

    /// A failure was injected for this register address.
    InjectedFailure(u16),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cOperation {
    Write { address: u16, value: u8 },
    Read { address: u16, length: usize },
}

#[derive(Clone, Debug, Default)]
struct FailurePlan {
    addresses: BTreeSet<u16>,
    writes_remaining: Option<usize>,
}

/// A sensor register file reachable over a mocked I²C bus.
///
/// Register addresses are 16 bits wide and every register holds one byte, which is how the SCCB
/// and CCI buses on these sensors behave. Multi-byte writes and reads auto-increment the
/// register address. Unwritten registers read back as zero.
///
/// All state is shared between clones, so a test can hand one clone to a driver and inspect the
/// traffic through another.
#[derive(Clone, Debug)]
pub struct MockSensorBus {
    i2c_address: u8,
    registers: Rc<RefCell<BTreeMap<u16, u8>>>,
    recent_operations: Rc<RefCell<VecDeque<I2cOperation>>>,
    failures: Rc<RefCell<FailurePlan>>,
}

impl MockSensorBus {
    pub fn new(i2c_address: u8) -> Self {
        Self {
            i2c_address,
            registers: Rc::new(RefCell::new(BTreeMap::new())),
            recent_operations: Rc::new(RefCell::new(VecDeque::new())),
            failures: Rc::new(RefCell::new(FailurePlan::default())),
        }
    }

    /// Create a bus with some registers already populated.
    pub fn with_registers(i2c_address: u8, registers: &[(u16, u8)]) -> Self {
        let bus = Self::new(i2c_address);
        bus.registers.borrow_mut().extend(registers.iter().copied());
        bus
    }

    pub fn i2c_address(&self) -> u8 {
        self.i2c_address
    }

    /// The current value of a register, if it has ever been set.
    pub fn register(&self, address: u16) -> Option<u8> {
        self.registers.borrow().get(&address).copied()
    }

    /// Set a register without recording an operation.
    pub fn set_register(&self, address: u16, value: u8) {
        self.registers.borrow_mut().insert(address, value);
    }

    /// Make every access to the given register address fail.
    pub fn fail_address(&self, address: u16) {
        self.failures.borrow_mut().addresses.insert(address);
    }

    /// Allow `count` more register writes to succeed, then fail every write after that.
    pub fn fail_after_writes(&self, count: usize) {
        self.failures.borrow_mut().writes_remaining = Some(count);
    }

    pub fn clear_failures(&self) {
        *self.failures.borrow_mut() = FailurePlan::default();
    }

    /// Recent operations, most recent first.
    pub fn recent_operations(&self) -> Ref<VecDeque<I2cOperation>> {
        self.recent_operations.borrow()
    }

    pub fn clear_recent_operations(&self) {
        self.recent_operations.borrow_mut().clear()
    }

    /// The values written to a register among the recent operations, oldest first.
    pub fn writes_to(&self, address: u16) -> Vec<u8> {
        self.recent_operations
            .borrow()
            .iter()
            .rev()
            .filter_map(|op| match op {
                I2cOperation::Write {
                    address: written,
                    value,
                } if *written == address => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// The number of writes among the recent operations.
    pub fn write_count(&self) -> usize {
        self.recent_operations
            .borrow()
            .iter()
            .filter(|op| matches!(op, I2cOperation::Write { .. }))
            .count()
    }

    fn add_operation(&self, operation: I2cOperation) {
        let mut recent_ops = self.recent_operations.borrow_mut();
        recent_ops.push_front(operation);
        recent_ops.truncate(RECENT_OPERATIONS_QUEUE_LENGTH);
    }

    fn check_address(&self, address: u16) -> Result<(), MockError> {
        if self.failures.borrow().addresses.contains(&address) {
            Err(MockError::InjectedFailure(address))
        } else {
            Ok(())
        }
    }

    fn check_write(&self, address: u16) -> Result<(), MockError> {
        self.check_address(address)?;
        let mut failures = self.failures.borrow_mut();
        match failures.writes_remaining.as_mut() {
            Some(0) => Err(MockError::InjectedFailure(address)),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn extract_address(bytes: &[u8]) -> Result<u16, MockError> {
        match bytes {
            [high, low, ..] => Ok(u16::from_be_bytes([*high, *low])),
            _ => Err(MockError::IllegalOperation),
        }
    }
}

impl i2c::Write for MockSensorBus {
    type Error = MockError;

    fn write(&mut self, i2c_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        let start_address = Self::extract_address(bytes)?;
        let payload = &bytes[2..];
        if payload.is_empty() {
            return Err(MockError::IllegalOperation);
        }
        for (offset, value) in payload.iter().copied().enumerate() {
            let address = start_address.wrapping_add(offset as u16);
            self.check_write(address)?;
            self.registers.borrow_mut().insert(address, value);
            self.add_operation(I2cOperation::Write { address, value });
        }
        Ok(())
    }
}

impl i2c::WriteRead for MockSensorBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        i2c_address: u8,
        write_buffer: &[u8],
        out_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Write-reads should only be writing the address
        if write_buffer.len() != 2 || out_buffer.is_empty() {
            return Err(MockError::IllegalOperation);
        }
        let start_address = Self::extract_address(write_buffer)?;
        self.add_operation(I2cOperation::Read {
            address: start_address,
            length: out_buffer.len(),
        });
        let registers = self.registers.borrow();
        for (offset, byte) in out_buffer.iter_mut().enumerate() {
            let address = start_address.wrapping_add(offset as u16);
            self.check_address(address)?;
            *byte = registers.get(&address).copied().unwrap_or(0);
        }
        Ok(())
    }
}

/// A delay provider that only records how long it was asked to wait.
#[derive(Clone, Debug, Default)]
pub struct MockDelay {
    total_ms: Rc<Cell<u32>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u32 {
        self.total_ms.get()
    }
}

impl delay::DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms.set(self.total_ms.get() + ms);
    }
}
