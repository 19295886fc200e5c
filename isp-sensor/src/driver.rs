// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use arrayvec::ArrayVec;
use embedded_hal::blocking::delay::DelayMs;
use paste::paste;

use crate::context::{AeBaseInfo, ChannelValues, SensorContext};
use crate::error::{Error, ErrorKind};
use crate::exposure::{lines_for, ChannelPolicy};
use crate::gain::{AnalogGain, GainLadder, Limits, LinearGain};
use crate::mode::{Caps, ModeDescriptor, ModeEntry, MAX_CHANNELS};
use crate::model::{ChipId, RegisterModel};
use crate::register::{write_fields, write_sequence};
use crate::transport::RegisterTransport;
use crate::util::{clamp, round_u32};

/// The most registers a chip identifier is spread across.
const MAX_ID_REGISTERS: usize = 4;

/// DRY macro for the per-channel getters in `SensorDriver`, and their limits.
macro_rules! channel_values {
    { $field:ident, $doc:literal } => {
    paste! {
        #[doc = $doc]
        ///
        /// There is one value per exposure channel of the current mode, as programmed (after
        /// quantization and clamping).
        pub fn $field(&self) -> Result<&[f32], ErrorKind> {
            self.current_mode()?;
            Ok(&self.context.$field)
        }

        #[doc = "The per-channel limits of [`" $field "`][SensorDriver::" $field "]."]
        pub fn [< $field _limits >](&self) -> Result<&[Limits], ErrorKind> {
            self.current_mode()?;
            Ok(&self.context.[< $field _limits >])
        }
    }};
}

/// A driver for one sensor chip, built from that chip's [`RegisterModel`].
///
/// The driver moves through a simple lifecycle. Freshly created it is idle, and can only be
/// identified or have its raw registers poked. [`open`][SensorDriver::open] programs a mode,
/// after which gain, exposure, frame rate and the test pattern can be controlled and streaming can
/// be started and stopped. [`close`][SensorDriver::close] stops streaming and forgets the mode, so
/// the driver has to be opened again before it can stream. Finally
/// [`release`][SensorDriver::release] hands the register transport back.
#[derive(Debug)]
pub struct SensorDriver<T> {
    /// The register transport this sensor is reachable through.
    bus: T,

    model: &'static RegisterModel,

    context: SensorContext,
}

impl<T> SensorDriver<T>
where
    T: RegisterTransport,
{
    pub fn new(model: &'static RegisterModel, bus: T) -> Self {
        log::debug!("{}: created", model.name);
        Self {
            bus,
            model,
            context: SensorContext::default(),
        }
    }

    /// Give back the register transport.
    ///
    /// No register traffic is generated, so a streaming sensor keeps streaming. Call
    /// [`close`][SensorDriver::close] first to stop it.
    pub fn release(self) -> T {
        log::debug!("{}: released", self.model.name);
        self.bus
    }

    pub fn model(&self) -> &'static RegisterModel {
        self.model
    }

    /// Whether a mode has been programmed since the last close.
    pub fn is_configured(&self) -> bool {
        self.context.configured
    }

    pub fn is_streaming(&self) -> bool {
        self.context.streaming
    }

    /// The test pattern state last written with
    /// [`set_test_pattern`][SensorDriver::set_test_pattern].
    pub fn is_test_pattern_enabled(&self) -> bool {
        self.context.test_pattern
    }

    fn current_mode(&self) -> Result<&'static ModeEntry, ErrorKind> {
        match self.context.mode {
            Some(entry) if self.context.configured => Ok(entry),
            _ => Err(ErrorKind::WrongState),
        }
    }

    /// Check that `count` values cover every channel of the current mode, returning the number
    /// of channels.
    fn channels_for(&self, count: usize) -> Result<usize, ErrorKind> {
        let channels = self.current_mode()?.descriptor.channels();
        if count < channels {
            Err(ErrorKind::InvalidParameter)
        } else {
            Ok(channels)
        }
    }

    /// Reset the chip and program it into the mode with the given index.
    ///
    /// The chip's reset sequence is written first, then `delay` is used to wait for the reset to
    /// finish before the init sequences are written. Any failure leaves the driver unconfigured,
    /// with the chip partially programmed.
    pub fn open<D>(&mut self, mode_index: u8, delay: &mut D) -> Result<(), Error<T::Error>>
    where
        D: DelayMs<u32>,
    {
        if self.context.streaming {
            return Err(ErrorKind::WrongState.into());
        }
        let model = self.model;
        let entry = model.mode(mode_index).ok_or(ErrorKind::NotSupported)?;
        self.context.reset();
        log::debug!("{}: opening mode {}", model.name, mode_index);
        write_sequence(&mut self.bus, model.reset).map_err(Error::Transport)?;
        if model.reset_delay_ms > 0 {
            delay.delay_ms(model.reset_delay_ms);
        }
        write_sequence(&mut self.bus, model.common_init).map_err(Error::Transport)?;
        write_sequence(&mut self.bus, entry.init).map_err(Error::Transport)?;
        self.context = SensorContext::for_mode(model, entry);
        Ok(())
    }

    /// Stop streaming and forget the current mode.
    ///
    /// Stopping the stream is best effort; a failure is logged and otherwise ignored.
    pub fn close(&mut self) {
        if self.context.streaming
            && write_sequence(&mut self.bus, self.model.streaming.off).is_err()
        {
            log::warn!("{}: failed to stop streaming while closing", self.model.name);
        }
        self.context.reset();
        log::debug!("{}: closed", self.model.name);
    }

    pub fn caps(&self) -> Result<Caps, ErrorKind> {
        self.model.caps().ok_or(ErrorKind::NotSupported)
    }

    /// The currently programmed mode.
    pub fn mode(&self) -> Result<ModeDescriptor, ErrorKind> {
        Ok(self.current_mode()?.descriptor)
    }

    /// Describe the mode at `index` of the chip's mode table.
    pub fn enum_mode(&self, index: usize) -> Result<ModeDescriptor, ErrorKind> {
        self.model.enum_mode(index)
    }

    /// Read the chip identifier.
    pub fn sensor_id(&mut self) -> Result<u32, Error<T::Error>> {
        let mut values: ArrayVec<u16, MAX_ID_REGISTERS> = ArrayVec::new();
        for &address in self.model.chip_id.registers.iter().take(MAX_ID_REGISTERS) {
            values.push(self.bus.read_register(address).map_err(Error::Transport)?);
        }
        Ok(ChipId::compose(values, self.bus.data_width().bits()))
    }

    /// Check that the chip on the bus is the one this driver is for.
    ///
    /// A mismatched identifier and a failed read are both reported with a
    /// [`Failure`][ErrorKind::Failure] kind.
    pub fn check_connection(&mut self) -> Result<(), Error<T::Error>> {
        let id = self.sensor_id()?;
        let expected = self.model.chip_id.expected;
        if id == expected {
            log::info!("{}: found chip ID {:#X}", self.model.name, id);
            Ok(())
        } else {
            log::warn!(
                "{}: expected chip ID {:#X}, read {:#X}",
                self.model.name,
                expected,
                id
            );
            Err(ErrorKind::Failure.into())
        }
    }

    /// Start or stop streaming.
    ///
    /// Requesting the state the sensor is already in succeeds without touching the bus.
    pub fn set_streaming(&mut self, on: bool) -> Result<(), Error<T::Error>> {
        if !self.context.configured {
            return Err(ErrorKind::WrongState.into());
        }
        if self.context.streaming == on {
            return Ok(());
        }
        let sequence = if on {
            self.model.streaming.on
        } else {
            self.model.streaming.off
        };
        write_sequence(&mut self.bus, sequence).map_err(Error::Transport)?;
        self.context.streaming = on;
        log::debug!(
            "{}: streaming {}",
            self.model.name,
            if on { "started" } else { "stopped" }
        );
        Ok(())
    }

    /// Set the analog gain of each exposure channel.
    ///
    /// Continuous gains are clamped to the supported range. For chips with a stepped analog gain,
    /// gains below the first step are rejected with
    /// [`InvalidParameter`][ErrorKind::InvalidParameter], while gains above the last step are
    /// clamped.
    pub fn set_a_gain(&mut self, gains: &[f32]) -> Result<(), Error<T::Error>> {
        let model = self.model;
        let requested = &gains[..self.channels_for(gains.len())?];
        let programmed = match &model.analog_gain {
            AnalogGain::Linear(linear) => {
                write_linear_gain(&mut self.bus, model.name, linear, requested)?
            }
            AnalogGain::Ladder(ladder) => {
                write_ladder_gain(&mut self.bus, model.name, ladder, requested)?
            }
        };
        self.context.a_gain = programmed;
        Ok(())
    }

    /// Set the digital gain of each exposure channel.
    ///
    /// Fails with [`NotSupported`][ErrorKind::NotSupported] on chips without a separate digital
    /// gain.
    pub fn set_d_gain(&mut self, gains: &[f32]) -> Result<(), Error<T::Error>> {
        let model = self.model;
        let requested = &gains[..self.channels_for(gains.len())?];
        let digital = model.digital_gain.as_ref().ok_or(ErrorKind::NotSupported)?;
        self.context.d_gain = write_linear_gain(&mut self.bus, model.name, digital, requested)?;
        Ok(())
    }

    /// Set the integration time of each exposure channel, in seconds.
    ///
    /// Times are rounded to whole lines and clamped to each channel's line limits. Chips that
    /// derive their shorter exposures from the primary one only read the first value.
    pub fn set_int_time(&mut self, int_times: &[f32]) -> Result<(), Error<T::Error>> {
        let model = self.model;
        let channels = self.current_mode()?.descriptor.channels();
        let needed = match model.exposure.policy {
            ChannelPolicy::Independent => channels,
            ChannelPolicy::Derived(_) => 1,
        };
        let requested = int_times
            .get(..needed)
            .ok_or(ErrorKind::InvalidParameter)?;
        if requested.iter().any(|time| !time.is_finite()) {
            return Err(ErrorKind::InvalidParameter.into());
        }
        if model.exposure.channels.len() < channels {
            return Err(ErrorKind::NotSupported.into());
        }
        let clamped = self.program_int_time(int_times)?;
        if clamped {
            log::warn!(
                "{}: integration time {:?} clamped to {:?}",
                model.name,
                requested,
                &self.context.int_time[..]
            );
        }
        Ok(())
    }

    /// Convert `int_times` to lines within the current line limits, write them and cache the
    /// result. Returns whether any requested channel was clamped.
    fn program_int_time(&mut self, int_times: &[f32]) -> Result<bool, Error<T::Error>> {
        let model = self.model;
        let one_line_exp_time = self.context.one_line_exp_time;
        let (lines, clamped) =
            model
                .exposure
                .lines(int_times, &self.context.line_limits, one_line_exp_time);
        for (channel, &line_count) in model.exposure.channels.iter().zip(&lines) {
            write_fields(&mut self.bus, channel.registers, line_count).map_err(Error::Transport)?;
        }
        self.context.int_time = lines
            .iter()
            .map(|&line_count| line_count as f32 * one_line_exp_time)
            .collect();
        Ok(clamped)
    }

    /// Change the frame rate by stretching the frame length.
    ///
    /// Rates outside of what the current mode supports are clamped. The longest integration time
    /// follows the new frame length, so a programmed integration time that no longer fits in the
    /// shorter frame is cut back to the new limit.
    pub fn set_fps(&mut self, fps: f32) -> Result<(), Error<T::Error>> {
        let model = self.model;
        let entry = self.current_mode()?;
        if !fps.is_finite() {
            return Err(ErrorKind::InvalidParameter.into());
        }
        let (effective, clamped) = clamp(fps, self.context.min_fps, self.context.max_fps);
        if clamped {
            log::warn!("{}: {} fps clamped to {} fps", model.name, fps, effective);
        }
        let frame_length_lines = round_u32(
            self.context.nominal_frame_length_lines as f32 * entry.descriptor.fps / effective,
        );
        write_fields(&mut self.bus, model.frame_length, frame_length_lines)
            .map_err(Error::Transport)?;
        self.context
            .set_frame_length(model, entry, frame_length_lines, effective);
        log::debug!(
            "{}: {} fps, {} lines per frame",
            model.name,
            effective,
            frame_length_lines
        );
        let one_line_exp_time = self.context.one_line_exp_time;
        let too_long = self
            .context
            .int_time
            .iter()
            .zip(&self.context.line_limits)
            .any(|(&time, limits)| lines_for(time, one_line_exp_time) > limits.max);
        if too_long {
            let int_time = self.context.int_time.clone();
            self.program_int_time(&int_time)?;
            log::debug!(
                "{}: integration time cut to {:?} for the shorter frame",
                model.name,
                &self.context.int_time[..]
            );
        }
        Ok(())
    }

    channel_values! {
        a_gain,
        "Get the current analog gain."
    }

    channel_values! {
        d_gain,
        "Get the current digital gain. Chips without a separate digital gain report 1.0."
    }

    channel_values! {
        int_time,
        "Get the current integration time, in seconds."
    }

    /// Get the current frame rate.
    pub fn fps(&self) -> Result<f32, ErrorKind> {
        self.current_mode()?;
        Ok(self.context.fps)
    }

    /// Get the current frame length, in lines.
    pub fn frame_length_lines(&self) -> Result<u32, ErrorKind> {
        self.current_mode()?;
        Ok(self.context.frame_length_lines)
    }

    /// A snapshot of everything the auto-exposure loop needs to know.
    pub fn ae_base_info(&self) -> Result<AeBaseInfo, ErrorKind> {
        let entry = self.current_mode()?;
        let context = &self.context;
        Ok(AeBaseInfo {
            hdr: entry.descriptor.hdr,
            ae_delay: entry.descriptor.ae_delay,
            a_gain_limits: context.a_gain_limits.clone(),
            d_gain_limits: context.d_gain_limits.clone(),
            int_time_limits: context.int_time_limits.clone(),
            a_gain: context.a_gain.clone(),
            d_gain: context.d_gain.clone(),
            int_time: context.int_time.clone(),
            one_line_exp_time: context.one_line_exp_time,
            frame_length_lines: context.frame_length_lines,
            max_integration_lines: context.line_limits.first().map_or(0, |lines| lines.max),
            fps: context.fps,
            min_fps: context.min_fps,
            max_fps: context.max_fps,
        })
    }

    /// Enable (or disable) the test pattern generator.
    pub fn set_test_pattern(&mut self, enable: bool) -> Result<(), Error<T::Error>> {
        self.current_mode()?;
        let register = self.model.test_pattern;
        let value = if enable {
            register.enable
        } else {
            register.disable
        };
        self.write_register(register.address, value)?;
        self.context.test_pattern = enable;
        Ok(())
    }

    /// Read back whether the test pattern generator is enabled.
    pub fn test_pattern(&mut self) -> Result<bool, Error<T::Error>> {
        self.current_mode()?;
        let register = self.model.test_pattern;
        Ok(self.read_register(register.address)? == register.enable)
    }

    /// Read a register directly.
    pub fn read_register(&mut self, address: u16) -> Result<u16, Error<T::Error>> {
        self.bus.read_register(address).map_err(Error::Transport)
    }

    /// Write a register directly.
    ///
    /// The driver's cached state is not updated, even when the register is one the driver
    /// manages.
    pub fn write_register(&mut self, address: u16, value: u16) -> Result<(), Error<T::Error>> {
        log::trace!("{:#06X} <- {:#04X}", address, value);
        self.bus
            .write_register(address, value)
            .map_err(Error::Transport)
    }
}

/// Encode every channel's gain, then write them all.
///
/// Nothing is written if any channel fails to encode. Returns the programmed gains.
fn write_linear_gain<T>(
    bus: &mut T,
    name: &str,
    gain: &LinearGain,
    requested: &[f32],
) -> Result<ChannelValues<f32>, Error<T::Error>>
where
    T: RegisterTransport,
{
    let mut encoded: ArrayVec<_, MAX_CHANNELS> = ArrayVec::new();
    for (channel, &value) in requested.iter().enumerate() {
        let registers = gain.channel(channel).ok_or(ErrorKind::NotSupported)?;
        let channel_gain = gain.encode(value)?;
        if channel_gain.clamped {
            log::warn!("{}: gain {} clamped to {}", name, value, channel_gain.gain);
        }
        encoded.push((registers, channel_gain));
    }
    for (registers, channel_gain) in &encoded {
        write_fields(bus, registers, channel_gain.raw).map_err(Error::Transport)?;
    }
    Ok(encoded
        .iter()
        .map(|(_, channel_gain)| channel_gain.gain)
        .collect())
}

/// The same as [`write_linear_gain`], for stepped gains.
fn write_ladder_gain<T>(
    bus: &mut T,
    name: &str,
    ladder: &GainLadder,
    requested: &[f32],
) -> Result<ChannelValues<f32>, Error<T::Error>>
where
    T: RegisterTransport,
{
    let mut encoded: ArrayVec<_, MAX_CHANNELS> = ArrayVec::new();
    for (channel, &value) in requested.iter().enumerate() {
        let registers = ladder.channel(channel).ok_or(ErrorKind::NotSupported)?;
        let channel_gain = ladder.encode(value)?;
        if channel_gain.clamped {
            log::warn!("{}: gain {} clamped to {}", name, value, channel_gain.gain);
        }
        encoded.push((registers, channel_gain));
    }
    for (registers, channel_gain) in &encoded {
        let step = &ladder.steps[channel_gain.step];
        for (&address, &value) in registers.step_registers.iter().zip(step.registers) {
            log::trace!("{:#06X} <- {:#04X}", address, value);
            bus.write_register(address, u16::from(value))
                .map_err(Error::Transport)?;
        }
        write_fields(bus, registers.residual, channel_gain.residual_raw)
            .map_err(Error::Transport)?;
    }
    Ok(encoded
        .iter()
        .map(|(_, channel_gain)| channel_gain.gain)
        .collect())
}

#[cfg(test)]
mod test {
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use float_cmp::{approx_eq, assert_approx_eq};
    use isp_sensor_test_data::*;

    use super::*;
    use crate::chips::{GC5603, IMX258, OS08A20, OX08A4Y};
    use crate::mode::HdrMode;
    use crate::transport::{BusConfig, BusController, DataWidth, I2cTransport, SharedI2c};

    type MockDriver<'a> = SensorDriver<I2cTransport<'a, MockSensorBus>>;

    fn driver<'a>(
        shared: &'a SharedI2c<MockSensorBus>,
        model: &'static RegisterModel,
    ) -> MockDriver<'a> {
        let mut controller = shared;
        let transport = controller.open(&model.default_bus).unwrap();
        SensorDriver::new(model, transport)
    }

    fn opened<'a>(
        shared: &'a SharedI2c<MockSensorBus>,
        model: &'static RegisterModel,
        mode: u8,
    ) -> MockDriver<'a> {
        let mut driver = driver(shared, model);
        driver.open(mode, &mut MockDelay::new()).unwrap();
        driver
    }

    /// Seconds per line for the OS08A20 at 30 FPS.
    const OS08A20_LINE: f32 = 1.0 / (30.0 * 2316.0);

    #[test]
    fn open_programs_mode() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        let mut delay = MockDelay::new();
        driver.open(0, &mut delay).unwrap();
        assert_eq!(mock.writes_to(0x0103), vec![0x01]);
        assert_eq!(delay.total_ms(), 100);
        assert_eq!(mock.register(0x380E), Some(0x09));
        assert_eq!(mock.register(0x380F), Some(0x0C));
        assert!(driver.is_configured());
        assert!(!driver.is_streaming());
        assert_eq!(driver.mode().unwrap().index, 0);
    }

    #[test]
    fn open_unknown_mode() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        let err = driver.open(7, &mut MockDelay::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert_eq!(mock.write_count(), 0);
        assert!(!driver.is_configured());
    }

    #[test]
    fn open_failure_leaves_unconfigured() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        mock.fail_address(0x3808);
        let err = driver.open(0, &mut MockDelay::new()).unwrap_err();
        assert_eq!(err, Error::Transport(MockError::InjectedFailure(0x3808)));
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert!(!driver.is_configured());
        // Everything before the failure was still written
        assert_eq!(mock.register(0x3800), Some(0x00));
        assert_eq!(mock.register(0x380E), None);
        assert_eq!(
            driver.set_streaming(true).unwrap_err().kind(),
            ErrorKind::WrongState
        );
    }

    #[test]
    fn streaming_requires_open() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        assert_eq!(
            driver.set_streaming(true).unwrap_err(),
            Error::Sensor(ErrorKind::WrongState)
        );
        driver.open(0, &mut MockDelay::new()).unwrap();
        driver.set_streaming(true).unwrap();
        assert!(driver.is_streaming());
        assert_eq!(mock.register(0x0100), Some(0x01));
    }

    #[test]
    fn open_rejected_while_streaming() {
        let shared = SharedI2c::new(0, os08a20_at_address(0x36));
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_streaming(true).unwrap();
        let err = driver.open(1, &mut MockDelay::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongState);
        // Still in the original mode
        assert_eq!(driver.mode().unwrap().index, 0);
        driver.set_streaming(false).unwrap();
        driver.open(1, &mut MockDelay::new()).unwrap();
        assert_eq!(driver.mode().unwrap().hdr, HdrMode::Stitch2);
    }

    #[test]
    fn redundant_streaming_is_silent() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        mock.clear_recent_operations();
        driver.set_streaming(false).unwrap();
        driver.set_streaming(true).unwrap();
        driver.set_streaming(true).unwrap();
        assert_eq!(mock.writes_to(0x0100), vec![0x01]);
        assert_eq!(mock.recent_operations().len(), 1);
    }

    #[test]
    fn streaming_sequences_in_order() {
        let mock = imx258_at_address(0x1A);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &IMX258, 0);
        mock.clear_recent_operations();
        driver.set_streaming(true).unwrap();
        driver.set_streaming(false).unwrap();
        assert_eq!(
            mock.recent_operations().iter().rev().copied().collect::<Vec<_>>(),
            vec![
                I2cOperation::Write {
                    address: 0x0114,
                    value: 0x03
                },
                I2cOperation::Write {
                    address: 0x0100,
                    value: 0x01
                },
                I2cOperation::Write {
                    address: 0x0100,
                    value: 0x00
                },
                I2cOperation::Write {
                    address: 0x0114,
                    value: 0x01
                },
            ]
        );
    }

    #[test]
    fn failed_stream_on_stays_stopped() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        mock.fail_address(0x0100);
        assert_eq!(
            driver.set_streaming(true).unwrap_err().kind(),
            ErrorKind::Failure
        );
        assert!(!driver.is_streaming());
    }

    #[test]
    fn close_requires_reopen() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_streaming(true).unwrap();
        driver.close();
        assert!(!driver.is_streaming());
        assert!(!driver.is_configured());
        assert_eq!(mock.register(0x0100), Some(0x00));
        assert_eq!(
            driver.set_streaming(true).unwrap_err().kind(),
            ErrorKind::WrongState
        );
        assert_eq!(driver.mode(), Err(ErrorKind::WrongState));
        driver.open(0, &mut MockDelay::new()).unwrap();
        driver.set_streaming(true).unwrap();
    }

    #[test]
    fn close_ignores_stream_off_failure() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_streaming(true).unwrap();
        mock.fail_address(0x0100);
        driver.close();
        assert!(!driver.is_streaming());
        assert!(!driver.is_configured());
    }

    #[test]
    fn int_time_below_minimum() {
        let shared = SharedI2c::new(0, os08a20_at_address(0x36));
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_int_time(&[0.0]).unwrap();
        let int_time = driver.int_time().unwrap();
        assert_eq!(int_time.len(), 1);
        assert_approx_eq!(f32, int_time[0], 2.0 * OS08A20_LINE);
        assert!(int_time[0] > 0.0);
    }

    #[test]
    fn int_time_quantized() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        // 694.8 lines
        driver.set_int_time(&[10e-3]).unwrap();
        assert_eq!(mock.register(0x3501), Some(0x02));
        assert_eq!(mock.register(0x3502), Some(0xB7));
        assert_approx_eq!(f32, driver.int_time().unwrap()[0], 695.0 * OS08A20_LINE);
    }

    #[test]
    fn int_time_clamped_to_frame() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_int_time(&[1.0]).unwrap();
        // 2316 lines less an 8 line margin
        assert_eq!(mock.register(0x3501), Some(0x09));
        assert_eq!(mock.register(0x3502), Some(0x04));
        let limits = driver.int_time_limits().unwrap()[0];
        assert_approx_eq!(f32, driver.int_time().unwrap()[0], limits.max);
    }

    #[test]
    fn int_time_monotonic() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        let mut previous = 0.0;
        for step in 0..200 {
            let requested = step as f32 * 0.2e-3;
            driver.set_int_time(&[requested]).unwrap();
            let programmed = driver.int_time().unwrap()[0];
            assert!(programmed >= previous);
            previous = programmed;
        }
    }

    #[test]
    fn int_time_needs_every_channel() {
        let shared = SharedI2c::new(0, os08a20_at_address(0x36));
        let mut driver = opened(&shared, &OS08A20, 1);
        assert_eq!(
            driver.set_int_time(&[1e-3]).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            driver.set_int_time(&[f32::NAN, 1e-3]).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        driver.set_int_time(&[10e-3, 1e-3]).unwrap();
        assert_eq!(driver.int_time().unwrap().len(), 2);
    }

    #[test]
    fn failed_write_keeps_cache() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        let before = driver.int_time().unwrap()[0];
        mock.fail_after_writes(1);
        let err = driver.set_int_time(&[10e-3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failure);
        // The high byte made it, the low byte didn't
        assert_eq!(mock.register(0x3501), Some(0x02));
        assert_eq!(driver.int_time().unwrap()[0], before);
    }

    #[test]
    fn derived_exposures() {
        let mock = ox08a4y_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OX08A4Y, 1);
        let line = 1.0 / (30.0 * 2400.0);
        driver.set_int_time(&[1600.0 * line]).unwrap();
        // HCG at 1600 lines
        assert_eq!(mock.register(0x3501), Some(0x06));
        assert_eq!(mock.register(0x3502), Some(0x40));
        // SPD at a quarter of that
        assert_eq!(mock.register(0x35C1), Some(0x01));
        assert_eq!(mock.register(0x35C2), Some(0x90));
        // VS capped at 64 lines
        assert_eq!(mock.register(0x3541), Some(0x00));
        assert_eq!(mock.register(0x3542), Some(0x40));
        let int_time = driver.int_time().unwrap();
        assert_eq!(int_time.len(), 4);
        assert_approx_eq!(f32, int_time[1], int_time[0]);
        assert_approx_eq!(f32, int_time[2], 400.0 * line);
        assert_approx_eq!(f32, int_time[3], 64.0 * line);
    }

    #[test]
    fn fps_clamped_to_mode() {
        let shared = SharedI2c::new(0, os08a20_at_address(0x36));
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_fps(130.0).unwrap();
        assert_eq!(driver.fps().unwrap(), 30.0);
        assert_eq!(driver.frame_length_lines().unwrap(), 2316);
        driver.set_fps(0.5).unwrap();
        assert_eq!(driver.fps().unwrap(), 5.0);
        assert_eq!(
            driver.set_fps(f32::INFINITY).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn fps_sets_frame_length() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_fps(5.0).unwrap();
        // 13896 lines
        assert_eq!(mock.register(0x380E), Some(0x36));
        assert_eq!(mock.register(0x380F), Some(0x48));
        for &fps in &[5.0f32, 7.5, 10.0, 12.34, 24.0, 29.97, 30.0] {
            driver.set_fps(fps).unwrap();
            let expected = (2316.0f32 * 30.0 / fps).round() as u32;
            assert_eq!(driver.frame_length_lines().unwrap(), expected);
            assert_eq!(driver.fps().unwrap(), fps);
        }
    }

    #[test]
    fn fps_moves_integration_limit() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_fps(15.0).unwrap();
        assert_eq!(driver.ae_base_info().unwrap().max_integration_lines, 4624);
        let limit = driver.int_time_limits().unwrap()[0].max;
        assert_approx_eq!(f32, limit, 4624.0 * OS08A20_LINE, epsilon = 1e-9);
        driver.set_int_time(&[1.0]).unwrap();
        // 4624 = 0x1210
        assert_eq!(mock.register(0x3501), Some(0x12));
        assert_eq!(mock.register(0x3502), Some(0x10));
    }

    #[test]
    fn fps_keeps_ae_limit_when_not_refreshed() {
        let mock = gc5603_at_address(0x31);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &GC5603, 0);
        let before = driver.int_time_limits().unwrap()[0];
        driver.set_fps(15.0).unwrap();
        assert_eq!(driver.int_time_limits().unwrap()[0], before);
        // The line limit still moved: 3500 lines less the 16 line margin
        assert_eq!(driver.ae_base_info().unwrap().max_integration_lines, 3484);
        driver.set_int_time(&[1.0]).unwrap();
        // 3484 = 0x0D9C
        assert_eq!(mock.register(0x0202), Some(0x0D));
        assert_eq!(mock.register(0x0203), Some(0x9C));
    }

    #[test]
    fn faster_fps_cuts_integration_time() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_fps(5.0).unwrap();
        driver.set_int_time(&[1.0]).unwrap();
        // 13896 lines less the margin
        assert_eq!(mock.register(0x3501), Some(0x36));
        assert_eq!(mock.register(0x3502), Some(0x40));
        driver.set_fps(30.0).unwrap();
        // Back to 2308 lines, so the frame still fits the exposure plus its margin
        assert_eq!(mock.register(0x3501), Some(0x09));
        assert_eq!(mock.register(0x3502), Some(0x04));
        let info = driver.ae_base_info().unwrap();
        assert_eq!(info.max_integration_lines, 2308);
        assert!(info.frame_length_lines >= info.max_integration_lines + 8);
        let limits = info.int_time_limits[0];
        assert_approx_eq!(f32, info.int_time[0], limits.max);
        assert!(info.int_time[0] <= limits.max);
    }

    #[test]
    fn slower_fps_keeps_integration_time() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_int_time(&[10e-3]).unwrap();
        let before = driver.int_time().unwrap()[0];
        mock.clear_recent_operations();
        driver.set_fps(10.0).unwrap();
        driver.set_fps(30.0).unwrap();
        // Only the frame length registers were touched
        assert!(mock.writes_to(0x3501).is_empty());
        assert!(mock.writes_to(0x3502).is_empty());
        assert_eq!(driver.int_time().unwrap()[0], before);
    }

    #[test]
    fn faster_fps_cuts_derived_exposures() {
        let mock = ox08a4y_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OX08A4Y, 1);
        let line = 1.0 / (30.0 * 2400.0);
        driver.set_fps(15.0).unwrap();
        driver.set_int_time(&[4000.0 * line]).unwrap();
        assert_eq!(mock.register(0x3501), Some(0x0F));
        assert_eq!(mock.register(0x3502), Some(0xA0));
        driver.set_fps(30.0).unwrap();
        // HCG cut to 2388 lines, SPD re-derived from it at 597 lines
        assert_eq!(mock.register(0x3501), Some(0x09));
        assert_eq!(mock.register(0x3502), Some(0x54));
        assert_eq!(mock.register(0x35C1), Some(0x02));
        assert_eq!(mock.register(0x35C2), Some(0x55));
        let int_time = driver.int_time().unwrap();
        assert_approx_eq!(f32, int_time[0], 2388.0 * line);
        assert_approx_eq!(f32, int_time[1], int_time[0]);
        assert_approx_eq!(f32, int_time[2], 597.0 * line);
        assert_approx_eq!(f32, int_time[3], 64.0 * line);
    }

    #[test]
    fn linear_gain_round_trip() {
        let shared = SharedI2c::new(0, os08a20_at_address(0x36));
        let mut driver = opened(&shared, &OS08A20, 0);
        let limits = driver.a_gain_limits().unwrap()[0];
        let mut requested = 1.0f32;
        while requested <= 15.5 {
            driver.set_a_gain(&[requested]).unwrap();
            let programmed = driver.a_gain().unwrap()[0];
            assert!(
                approx_eq!(f32, programmed, requested, epsilon = limits.step),
                "{} -> {}",
                requested,
                programmed
            );
            assert!(limits.contains(programmed));
            requested += 0.37;
        }
    }

    #[test]
    fn linear_gain_registers() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        driver.set_a_gain(&[2.0]).unwrap();
        assert_eq!(mock.register(0x3508), Some(0x01));
        assert_eq!(mock.register(0x3509), Some(0x00));
        driver.set_a_gain(&[40.0]).unwrap();
        assert_eq!(driver.a_gain().unwrap()[0], 15.5);
        assert_eq!(mock.register(0x3508), Some(0x07));
        assert_eq!(mock.register(0x3509), Some(0xC0));
    }

    #[test]
    fn digital_gain_registers() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OS08A20, 0);
        assert_eq!(driver.d_gain().unwrap(), &[1.0]);
        // 0x600 with 10 fractional bits
        driver.set_d_gain(&[1.5]).unwrap();
        assert_eq!(mock.register(0x350A), Some(0x01));
        assert_eq!(mock.register(0x350B), Some(0x80));
        assert_eq!(mock.register(0x350C), Some(0x00));
        assert_eq!(driver.d_gain().unwrap(), &[1.5]);
    }

    #[test]
    fn no_digital_gain() {
        let shared = SharedI2c::new(0, gc5603_at_address(0x31));
        let mut driver = opened(&shared, &GC5603, 0);
        assert_eq!(
            driver.set_d_gain(&[2.0]).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(driver.d_gain().unwrap(), &[1.0]);
    }

    #[test]
    fn hdr_gain_per_channel() {
        let mock = ox08a4y_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &OX08A4Y, 1);
        assert_eq!(
            driver.set_a_gain(&[2.5, 2.0]).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        driver.set_a_gain(&[2.5, 2.0, 1.0, 3.0]).unwrap();
        assert_eq!(driver.a_gain().unwrap(), &[2.5, 2.0, 1.0, 3.0]);
        // HCG
        assert_eq!(mock.register(0x3508), Some(0x02));
        assert_eq!(mock.register(0x3509), Some(0x80));
        // LCG
        assert_eq!(mock.register(0x3588), Some(0x02));
        assert_eq!(mock.register(0x3589), Some(0x00));
        // SPD
        assert_eq!(mock.register(0x35C8), Some(0x01));
        // VS
        assert_eq!(mock.register(0x3548), Some(0x03));
    }

    #[test]
    fn ladder_gain_bounds() {
        let mock = gc5603_at_address(0x31);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &GC5603, 0);
        let writes = mock.write_count();
        let err = driver.set_a_gain(&[0.5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(mock.write_count(), writes);
        assert_eq!(driver.a_gain().unwrap(), &[1.0]);
        driver.set_a_gain(&[100.0]).unwrap();
        assert_eq!(driver.a_gain().unwrap(), &[16.0]);
        assert_eq!(mock.register(0x0614), Some(0x04));
        assert_eq!(mock.register(0x0615), Some(0x00));
        assert_eq!(mock.register(0x0218), Some(0x00));
        // 1x residual
        assert_eq!(mock.register(0x020E), Some(0x01));
        assert_eq!(mock.register(0x020F), Some(0x00));
    }

    #[test]
    fn ladder_gain_residual() {
        let mock = gc5603_at_address(0x31);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = opened(&shared, &GC5603, 0);
        driver.set_a_gain(&[3.0]).unwrap();
        // 2.8125x step, 68/64 residual
        assert_eq!(mock.register(0x0614), Some(0x01));
        assert_eq!(mock.register(0x0615), Some(0x00));
        assert_eq!(mock.register(0x0218), Some(0x01));
        assert_eq!(mock.register(0x020E), Some(0x01));
        assert_eq!(mock.register(0x020F), Some(0x10));
        assert_approx_eq!(f32, driver.a_gain().unwrap()[0], 2.8125 * 68.0 / 64.0);
    }

    #[test]
    fn ladder_gain_round_trip() {
        let shared = SharedI2c::new(0, imx258_at_address(0x1A));
        let mut driver = opened(&shared, &IMX258, 0);
        let limits = driver.a_gain_limits().unwrap()[0];
        assert_eq!(limits.min, 1.0);
        assert_eq!(limits.max, 16.0);
        assert_eq!(limits.step, 0.0625);
        let mut requested = 1.0f32;
        while requested <= 16.0 {
            driver.set_a_gain(&[requested]).unwrap();
            let programmed = driver.a_gain().unwrap()[0];
            assert!(
                approx_eq!(f32, programmed, requested, epsilon = limits.step),
                "{} -> {}",
                requested,
                programmed
            );
            assert!(programmed >= limits.min && programmed <= limits.max);
            requested += 0.29;
        }
        // Near the top of the ladder the residual is at its coarsest
        driver.set_a_gain(&[15.9]).unwrap();
        assert_approx_eq!(f32, driver.a_gain().unwrap()[0], 15.9, epsilon = limits.step);
    }

    #[test]
    fn chip_identity() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        assert_eq!(driver.sensor_id().unwrap(), 0x530841);
        driver.check_connection().unwrap();
        driver.check_connection().unwrap();
        // Identification doesn't write anything
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn chip_identity_follows_transport_width() {
        let mock = gc5603_at_address(0x31);
        let shared = SharedI2c::new(0, mock.clone());
        let mut controller = &shared;
        let config = BusConfig {
            data_width: DataWidth::Sixteen,
            ..GC5603.default_bus
        };
        let transport = controller.open(&config).unwrap();
        let mut driver = SensorDriver::new(&GC5603, transport);
        // Each 16-bit read picks up the following register as its low byte
        mock.set_register(0x03F2, 0x01);
        assert_eq!(driver.sensor_id().unwrap(), 0x5603_0301);
        assert_eq!(driver.check_connection().unwrap_err().kind(), ErrorKind::Failure);
    }

    #[test]
    fn chip_identity_mismatch() {
        let shared = SharedI2c::new(0, MockSensorBus::with_registers(0x31, OX08A4Y_ID));
        let mut driver = driver(&shared, &GC5603);
        let first = driver.check_connection();
        let second = driver.check_connection();
        assert_eq!(first, Err(Error::Sensor(ErrorKind::Failure)));
        assert_eq!(first, second);
    }

    #[test]
    fn chip_identity_read_failure() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        mock.fail_address(0x300B);
        let err = driver.check_connection().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert_eq!(err, Error::Transport(MockError::InjectedFailure(0x300B)));
    }

    #[test]
    fn mode_enumeration() {
        let shared = SharedI2c::new(0, os08a20_at_address(0x36));
        let driver = driver(&shared, &OS08A20);
        assert_eq!(driver.enum_mode(1).unwrap().hdr, HdrMode::Stitch2);
        assert_eq!(driver.enum_mode(2), Err(ErrorKind::NotSupported));
        assert_eq!(driver.enum_mode(16), Err(ErrorKind::OutOfRange));
        let caps = driver.caps().unwrap();
        assert_eq!(caps.mode_count, 2);
        assert!(caps.supports(HdrMode::Linear));
        assert!(caps.supports(HdrMode::Stitch2));
        assert!(!caps.supports(HdrMode::NativeDcg));
        // Nothing is programmed yet
        assert_eq!(driver.mode(), Err(ErrorKind::WrongState));
        assert_eq!(driver.a_gain(), Err(ErrorKind::WrongState));
    }

    #[test]
    fn ae_base_info() {
        let shared = SharedI2c::new(0, imx258_at_address(0x1A));
        let driver = opened(&shared, &IMX258, 1);
        let info = driver.ae_base_info().unwrap();
        assert_eq!(info.hdr, HdrMode::Linear);
        assert_eq!(info.ae_delay, 2);
        assert_eq!(info.fps, 60.0);
        assert_eq!(info.max_fps, 60.0);
        assert_eq!(info.min_fps, 5.0);
        assert_eq!(info.frame_length_lines, 1612);
        assert_eq!(info.max_integration_lines, 1602);
        assert_approx_eq!(f32, info.one_line_exp_time, 1.0 / (60.0 * 1612.0));
        assert_eq!(info.a_gain.len(), 1);
        assert_eq!(info.a_gain_limits[0].max, 16.0);
        assert_eq!(info.d_gain_limits[0].max, 1.0);
    }

    #[test]
    fn test_pattern() {
        let mock = os08a20_at_address(0x36);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &OS08A20);
        assert_eq!(
            driver.set_test_pattern(true).unwrap_err().kind(),
            ErrorKind::WrongState
        );
        driver.open(0, &mut MockDelay::new()).unwrap();
        assert!(!driver.test_pattern().unwrap());
        driver.set_test_pattern(true).unwrap();
        assert_eq!(mock.register(0x5081), Some(0x80));
        assert!(driver.test_pattern().unwrap());
        assert!(driver.is_test_pattern_enabled());
        driver.set_test_pattern(false).unwrap();
        assert!(!driver.test_pattern().unwrap());
    }

    #[test]
    fn raw_register_access() {
        let mock = gc5603_at_address(0x31);
        let shared = SharedI2c::new(0, mock.clone());
        let mut driver = driver(&shared, &GC5603);
        assert_eq!(driver.read_register(0x03F0).unwrap(), 0x56);
        driver.write_register(0x0100, 0x09).unwrap();
        assert_eq!(mock.register(0x0100), Some(0x09));
        // Raw writes don't count as streaming
        assert!(!driver.is_streaming());
    }
}
