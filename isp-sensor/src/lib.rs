// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register-level drivers for the image sensors feeding an image signal processor (ISP).
//!
//! Every sensor chip in this crate is driven by the same [`SensorDriver`], which implements the
//! lifecycle and controls an ISP's auto-exposure loop needs: opening a sensor in one of its modes,
//! starting and stopping the stream, and setting analog gain, digital gain, integration time and
//! frame rate. What differs between chips (register addresses, gain encodings, mode tables,
//! streaming sequences) is captured as data in a [`RegisterModel`], one per chip, found in the
//! [`chips`] module.
//!
//! Registers are accessed through the [`RegisterTransport`] trait. [`SharedI2c`] implements it for
//! any [`embedded-hal`][embedded-hal] I²C bus, so the drivers run anywhere there's an
//! `embedded-hal` implementation. This crate is also `no_std` compatible.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/*/embedded_hal/blocking/i2c/index.html
//!
//! # Example
//! ```no_run
//! use isp_sensor::transport::BusController;
//! use isp_sensor::{registry, SharedI2c};
//! use linux_embedded_hal::{Delay, I2cdev};
//!
//! let i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! let shared = SharedI2c::new(1, i2c_bus);
//! let config = registry::lookup("imx258")?;
//! // The IMX258 is usually at 0x1A
//! let instance = config.instance_config().at(1, 0x1A);
//! let mut controller = &shared;
//! let transport = controller.open(&instance.bus).expect("bus 1 is available");
//! let mut sensor = config.driver(transport);
//! sensor.check_connection()?;
//! sensor.open(0, &mut Delay)?;
//! sensor.set_fps(24.0)?;
//! sensor.set_a_gain(&[2.0])?;
//! sensor.set_int_time(&[10e-3])?;
//! sensor.set_streaming(true)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//! The sensor is identified before anything is written, then programmed into its first mode.
//! Gain and integration time are rounded to what the chip can represent; read them back with
//! [`a_gain`][SensorDriver::a_gain] and [`int_time`][SensorDriver::int_time] to see what was
//! actually programmed.
//!
//! For systems with several sensors, a [`SensorArena`] hands out [`Handle`]s instead of owning
//! drivers directly.

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

pub mod arena;
pub mod chips;
mod context;
#[doc(hidden)]
pub mod driver;
#[doc(hidden)]
pub mod error;
pub mod exposure;
pub mod gain;
pub mod mode;
pub mod model;
pub mod register;
pub mod registry;
pub mod transport;
mod util;

#[doc(inline)]
pub use arena::{Handle, SensorArena};
pub use context::{AeBaseInfo, ChannelValues};
#[doc(inline)]
pub use driver::SensorDriver;
#[doc(inline)]
pub use error::{Error, ErrorKind};
pub use mode::{Caps, HdrMode, ModeDescriptor};
pub use model::RegisterModel;
pub use registry::{CameraDriverConfig, InstanceConfig};
pub use transport::{BusConfig, RegisterTransport, SharedI2c};
