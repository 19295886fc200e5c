// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Integration time encoding.
//!
//! Sensors integrate for a whole number of lines. A requested integration time in seconds is
//! converted with `round(time / one_line_exp_time)`, clamped to the channel's line limits, and
//! written to the chip's exposure registers. Multi-exposure chips either take an independent time
//! per channel, or derive the shorter channels from the primary one.
use arrayvec::ArrayVec;

use crate::mode::MAX_CHANNELS;
use crate::register::RegisterField;
use crate::util::{clamp, round_u32};

/// The exposure registers of one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExposureChannel {
    /// Channels that share another channel's integration (such as the low conversion gain
    /// readout of a DCG pair) have no registers of their own.
    pub registers: &'static [RegisterField],

    /// A cap on this channel's integration, in lines, below the frame-length-derived maximum.
    pub max_lines: Option<u32>,
}

/// How the integration of each channel is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChannelPolicy {
    /// Every channel takes its own requested time.
    Independent,

    /// Only the first channel's request is used. Each following channel integrates for the
    /// previous channel's lines divided by the matching divisor (the first divisor is ignored).
    Derived(&'static [u32]),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExposureEncoding {
    /// Indexed by channel.
    pub channels: &'static [ExposureChannel],

    pub policy: ChannelPolicy,
}

/// The line limits of one channel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LineLimits {
    pub min: u32,
    pub max: u32,
}

impl LineLimits {
    pub fn clamp(&self, lines: u32) -> (u32, bool) {
        clamp(lines, self.min, self.max)
    }
}

/// Convert seconds to a line count, without clamping.
pub fn lines_for(int_time: f32, one_line_exp_time: f32) -> u32 {
    if one_line_exp_time > 0.0 {
        round_u32(int_time / one_line_exp_time)
    } else {
        0
    }
}

impl ExposureEncoding {
    /// Compute the line count of every channel for the requested times.
    ///
    /// `requested` and `limits` must have an entry per channel (only the first request is read
    /// for [`ChannelPolicy::Derived`]). The second value is set if any channel was clamped.
    pub fn lines(
        &self,
        requested: &[f32],
        limits: &[LineLimits],
        one_line_exp_time: f32,
    ) -> (ArrayVec<u32, MAX_CHANNELS>, bool) {
        let mut lines = ArrayVec::new();
        let mut any_clamped = false;
        for (channel, channel_limits) in limits.iter().enumerate().take(MAX_CHANNELS) {
            let unclamped = match (self.policy, channel) {
                (ChannelPolicy::Independent, _) | (ChannelPolicy::Derived(_), 0) => {
                    lines_for(requested[channel], one_line_exp_time)
                }
                (ChannelPolicy::Derived(divisors), _) => {
                    let previous: u32 = lines[channel - 1];
                    let divisor = divisors.get(channel).copied().unwrap_or(1).max(1);
                    previous / divisor
                }
            };
            let (clamped_lines, clamped) = channel_limits.clamp(unclamped);
            // Derived channels landing on their floor is expected, not a correction.
            if clamped && (channel == 0 || self.policy == ChannelPolicy::Independent) {
                any_clamped = true;
            }
            lines.push(clamped_lines);
        }
        (lines, any_clamped)
    }

    /// The line limits of `channel` for a frame whose longest integration is `max_lines`.
    pub fn limits(&self, channel: usize, min_lines: u32, max_lines: u32) -> LineLimits {
        let cap = self
            .channels
            .get(channel)
            .and_then(|channel| channel.max_lines)
            .unwrap_or(u32::MAX);
        let max = max_lines.min(cap).max(min_lines);
        LineLimits {
            min: min_lines,
            max,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SINGLE: ExposureEncoding = ExposureEncoding {
        channels: &[ExposureChannel {
            registers: &[
                RegisterField::new(0x0202, 8, 8),
                RegisterField::new(0x0203, 0, 8),
            ],
            max_lines: None,
        }],
        policy: ChannelPolicy::Independent,
    };

    const DERIVED: ExposureEncoding = ExposureEncoding {
        channels: &[
            ExposureChannel {
                registers: &[RegisterField::new(0x3501, 8, 8)],
                max_lines: None,
            },
            ExposureChannel {
                registers: &[],
                max_lines: None,
            },
            ExposureChannel {
                registers: &[RegisterField::new(0x3541, 8, 8)],
                max_lines: None,
            },
            ExposureChannel {
                registers: &[RegisterField::new(0x35C1, 8, 8)],
                max_lines: Some(64),
            },
        ],
        policy: ChannelPolicy::Derived(&[1, 1, 4, 4]),
    };

    #[test]
    fn lines_for_rounds() {
        assert_eq!(lines_for(10e-3, 1e-5), 1000);
        assert_eq!(lines_for(10.4e-5, 1e-5), 10);
        assert_eq!(lines_for(10.6e-5, 1e-5), 11);
        assert_eq!(lines_for(1.0, 0.0), 0);
    }

    #[test]
    fn clamps_to_limits() {
        let limits = [LineLimits { min: 4, max: 2000 }];
        assert_eq!(SINGLE.lines(&[0.0], &limits, 1e-5).0[0], 4);
        let (lines, clamped) = SINGLE.lines(&[1.0], &limits, 1e-5);
        assert_eq!(&lines[..], &[2000]);
        assert!(clamped);
        let (lines, clamped) = SINGLE.lines(&[5e-3], &limits, 1e-5);
        assert_eq!(&lines[..], &[500]);
        assert!(!clamped);
    }

    #[test]
    fn monotonic_in_unclamped_region() {
        let limits = [LineLimits { min: 1, max: 100_000 }];
        let mut previous = 0;
        for step in 0..1000 {
            let time = step as f32 * 3.3e-6;
            let (lines, _) = SINGLE.lines(&[time], &limits, 1e-5);
            assert!(lines[0] >= previous);
            previous = lines[0];
        }
    }

    #[test]
    fn derived_channels() {
        let limits = [
            DERIVED.limits(0, 2, 2000),
            DERIVED.limits(1, 2, 2000),
            DERIVED.limits(2, 1, 2000),
            DERIVED.limits(3, 1, 2000),
        ];
        assert_eq!(limits[3].max, 64);
        // Later requests are ignored entirely.
        let (lines, clamped) = DERIVED.lines(&[1600e-5, 9.0, 9.0, 9.0], &limits, 1e-5);
        assert_eq!(&lines[..], &[1600, 1600, 400, 64]);
        // The VS channel hit its own cap, but that isn't a correction of the request.
        assert!(!clamped);
        let (lines, _) = DERIVED.lines(&[320e-5], &limits, 1e-5);
        assert_eq!(&lines[..], &[320, 320, 80, 20]);
    }
}
