// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Register models for the supported sensor chips.
mod gc5603;
mod imx258;
mod os08a20;
mod ox08a4y;

pub use gc5603::GC5603;
pub use imx258::IMX258;
pub use os08a20::OS08A20;
pub use ox08a4y::OX08A4Y;
