// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Fixed-capacity storage for sensor instances, addressed by opaque handles.
//!
//! Systems with several cameras keep their drivers in a [`SensorArena`]. Each instance is created
//! from a [`CameraDriverConfig`] and reached through the [`Handle`] returned at creation. Handles
//! carry a generation, so a handle to a released instance stays invalid even after its slot has
//! been reused.
use arrayvec::ArrayVec;

use crate::driver::SensorDriver;
use crate::error::{Error, ErrorKind};
use crate::registry::{CameraDriverConfig, InstanceConfig};
use crate::transport::{BusController, RegisterTransport};

/// The error type of a controller's transports.
pub type BusError<B> = <<B as BusController>::Transport as RegisterTransport>::Error;

/// An opaque reference to a sensor instance in a [`SensorArena`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Handle {
    slot: u16,
    generation: u16,
}

#[derive(Debug)]
struct Slot<D> {
    generation: u16,
    driver: Option<D>,
}

/// Up to `N` sensor instances sharing one bus controller.
pub struct SensorArena<B, const N: usize>
where
    B: BusController,
{
    controller: B,
    slots: ArrayVec<Slot<SensorDriver<B::Transport>>, N>,
}

impl<B, const N: usize> SensorArena<B, N>
where
    B: BusController,
{
    pub fn new(controller: B) -> Self {
        Self {
            controller,
            slots: ArrayVec::new(),
        }
    }

    pub fn controller(&self) -> &B {
        &self.controller
    }

    /// The number of live instances.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.driver.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find an empty slot, growing the arena if it isn't full yet.
    fn free_slot(&mut self) -> Option<usize> {
        if let Some(index) = self.slots.iter().position(|slot| slot.driver.is_none()) {
            return Some(index);
        }
        self.slots
            .try_push(Slot {
                generation: 0,
                driver: None,
            })
            .ok()?;
        Some(self.slots.len() - 1)
    }

    /// Open a transport for a new sensor instance and take a reference on it.
    ///
    /// Fails with [`OutOfMemory`][ErrorKind::OutOfMemory] when every slot is in use, and with
    /// [`NullPointer`][ErrorKind::NullPointer] when the controller can't open a transport at the
    /// instance's bus configuration. If the reference can't be taken, the transport is closed
    /// again before the error is returned.
    pub fn create(
        &mut self,
        config: &CameraDriverConfig,
        instance: &InstanceConfig,
    ) -> Result<Handle, Error<BusError<B>>> {
        let index = self.free_slot().ok_or(ErrorKind::OutOfMemory)?;
        let slot = u16::try_from(index).map_err(|_| ErrorKind::OutOfMemory)?;
        let mut transport = self
            .controller
            .open(&instance.bus)
            .ok_or(ErrorKind::NullPointer)?;
        if let Err(err) = self.controller.add_ref(&mut transport) {
            if self.controller.close(transport).is_err() {
                log::warn!("{}: failed to close an unreferenced transport", config.name());
            }
            return Err(Error::Transport(err));
        }
        let entry = &mut self.slots[index];
        entry.driver = Some(config.driver(transport));
        log::debug!(
            "{}: bus {} address {:#04X} in slot {}",
            config.name(),
            instance.bus.bus_id,
            instance.bus.address,
            slot
        );
        Ok(Handle {
            slot,
            generation: entry.generation,
        })
    }

    fn slot(&self, handle: Handle) -> Result<&Slot<SensorDriver<B::Transport>>, ErrorKind> {
        self.slots
            .get(usize::from(handle.slot))
            .filter(|slot| slot.generation == handle.generation && slot.driver.is_some())
            .ok_or(ErrorKind::WrongHandle)
    }

    fn slot_mut(
        &mut self,
        handle: Handle,
    ) -> Result<&mut Slot<SensorDriver<B::Transport>>, ErrorKind> {
        self.slots
            .get_mut(usize::from(handle.slot))
            .filter(|slot| slot.generation == handle.generation && slot.driver.is_some())
            .ok_or(ErrorKind::WrongHandle)
    }

    pub fn get(&self, handle: Handle) -> Result<&SensorDriver<B::Transport>, ErrorKind> {
        self.slot(handle)?
            .driver
            .as_ref()
            .ok_or(ErrorKind::WrongHandle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut SensorDriver<B::Transport>, ErrorKind> {
        self.slot_mut(handle)?
            .driver
            .as_mut()
            .ok_or(ErrorKind::WrongHandle)
    }

    /// Close the instance behind `handle`. See [`SensorDriver::close`].
    pub fn close(&mut self, handle: Handle) -> Result<(), ErrorKind> {
        self.get_mut(handle)?.close();
        Ok(())
    }

    /// Drop the instance's reference on its transport, close the transport and free the slot.
    ///
    /// The handle (and any copies of it) is invalid afterwards, so releasing it again fails with
    /// [`WrongHandle`][ErrorKind::WrongHandle]. The slot is freed even when dropping the reference
    /// or closing the transport fails; the first such failure is returned.
    pub fn release(&mut self, handle: Handle) -> Result<(), Error<BusError<B>>> {
        let slot = self.slot_mut(handle)?;
        let driver = slot.driver.take().ok_or(ErrorKind::WrongHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        let mut transport = driver.release();
        let unreferenced = self.controller.del_ref(&mut transport);
        let closed = self.controller.close(transport);
        unreferenced.and(closed).map_err(Error::Transport)
    }
}
