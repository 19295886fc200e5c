// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The mutable state of one sensor instance.
use arrayvec::ArrayVec;

use crate::exposure::LineLimits;
use crate::gain::Limits;
use crate::mode::{HdrMode, ModeEntry, MAX_CHANNELS};
use crate::model::RegisterModel;

/// The limits reported for chips without a separate digital gain.
const UNITY_GAIN: Limits = Limits::new(1.0, 1.0, 0.0);

/// Per-channel values, one entry for each exposure channel of the current mode.
pub type ChannelValues<T> = ArrayVec<T, MAX_CHANNELS>;

/// Everything a driver remembers between calls.
///
/// All gain and integration time values are the ones actually programmed into the chip, after
/// quantization and clamping.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SensorContext {
    pub(crate) mode: Option<&'static ModeEntry>,

    /// Set once a mode has been successfully programmed, cleared on close.
    pub(crate) configured: bool,

    pub(crate) streaming: bool,

    pub(crate) test_pattern: bool,

    pub(crate) a_gain: ChannelValues<f32>,
    pub(crate) d_gain: ChannelValues<f32>,
    pub(crate) int_time: ChannelValues<f32>,

    pub(crate) a_gain_limits: ChannelValues<Limits>,
    pub(crate) d_gain_limits: ChannelValues<Limits>,
    pub(crate) int_time_limits: ChannelValues<Limits>,

    /// Integration limits in lines, used for clamping.
    pub(crate) line_limits: ChannelValues<LineLimits>,

    pub(crate) frame_length_lines: u32,
    pub(crate) nominal_frame_length_lines: u32,

    /// Seconds per line at the nominal frame rate.
    pub(crate) one_line_exp_time: f32,

    pub(crate) fps: f32,
    pub(crate) min_fps: f32,
    pub(crate) max_fps: f32,
}

/// Express line limits in seconds.
fn time_limits(lines: LineLimits, one_line_exp_time: f32) -> Limits {
    Limits::new(
        lines.min as f32 * one_line_exp_time,
        lines.max as f32 * one_line_exp_time,
        one_line_exp_time,
    )
}

impl SensorContext {
    /// The state right after `entry` has been programmed.
    ///
    /// Gains start at their minimum and integration times at the shortest supported exposure.
    pub(crate) fn for_mode(model: &RegisterModel, entry: &'static ModeEntry) -> Self {
        let timing = &entry.timing;
        let fps = entry.descriptor.fps;
        let one_line_exp_time = timing.one_line_exp_time(fps);
        let max_lines = timing.max_integration_lines(timing.frame_length_lines);
        let a_gain_limits = model.analog_gain.limits();
        let d_gain_limits = model.digital_gain.map_or(UNITY_GAIN, |gain| gain.limits());
        let mut context = Self {
            mode: Some(entry),
            configured: true,
            frame_length_lines: timing.frame_length_lines,
            nominal_frame_length_lines: timing.frame_length_lines,
            one_line_exp_time,
            fps,
            min_fps: timing.min_fps,
            max_fps: fps,
            ..Self::default()
        };
        for channel in 0..entry.descriptor.channels() {
            let lines = model
                .exposure
                .limits(channel, timing.min_integration_lines, max_lines);
            context.line_limits.push(lines);
            context
                .int_time_limits
                .push(time_limits(lines, one_line_exp_time));
            context.int_time.push(lines.min as f32 * one_line_exp_time);
            context.a_gain_limits.push(a_gain_limits);
            context.a_gain.push(a_gain_limits.min);
            context.d_gain_limits.push(d_gain_limits);
            context.d_gain.push(d_gain_limits.min);
        }
        context
    }

    /// Forget the programmed mode, returning to the freshly created state.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a new frame length, moving the integration limits with it.
    pub(crate) fn set_frame_length(
        &mut self,
        model: &RegisterModel,
        entry: &ModeEntry,
        frame_length_lines: u32,
        fps: f32,
    ) {
        self.frame_length_lines = frame_length_lines;
        self.fps = fps;
        let max_lines = entry.timing.max_integration_lines(frame_length_lines);
        for (channel, limits) in self.line_limits.iter_mut().enumerate() {
            *limits = model
                .exposure
                .limits(channel, entry.timing.min_integration_lines, max_lines);
        }
        if model.fps_refreshes_ae_limits {
            let one_line_exp_time = self.one_line_exp_time;
            for (time, lines) in self.int_time_limits.iter_mut().zip(&self.line_limits) {
                *time = time_limits(*lines, one_line_exp_time);
            }
        }
    }
}

/// A snapshot of the exposure controls for the auto-exposure loop.
#[derive(Clone, Debug, PartialEq)]
pub struct AeBaseInfo {
    pub hdr: HdrMode,

    /// Frames between programming a value and seeing it in the output.
    pub ae_delay: u8,

    pub a_gain_limits: ChannelValues<Limits>,
    pub d_gain_limits: ChannelValues<Limits>,
    pub int_time_limits: ChannelValues<Limits>,

    pub a_gain: ChannelValues<f32>,
    pub d_gain: ChannelValues<f32>,
    pub int_time: ChannelValues<f32>,

    pub one_line_exp_time: f32,

    pub frame_length_lines: u32,

    /// The longest integration of the primary channel at the current frame length, in lines.
    pub max_integration_lines: u32,

    pub fps: f32,
    pub min_fps: f32,
    pub max_fps: f32,
}
