// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

// Various floating point operations are not implemented in core, so we use libm to provide them as
// needed.
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

/// Round to the nearest integer, saturating at the bounds of `u32`.
///
/// Negative values and NaN become 0.
pub(crate) fn round_u32(value: f32) -> u32 {
    // `as` saturates for floats, and maps NaN to 0.
    value.round() as u32
}

/// Clamp `value` to `[min, max]`, reporting whether it had to be changed.
///
/// `min` wins if the bounds are inverted, which can only happen with a malformed chip table.
pub(crate) fn clamp<T: PartialOrd + Copy>(value: T, min: T, max: T) -> (T, bool) {
    if value < min {
        (min, true)
    } else if value > max {
        (if max < min { min } else { max }, true)
    } else {
        (value, false)
    }
}

/// The fixed-point scale for a value with `fractional_bits` bits after the binary point.
pub(crate) fn fixed_point_scale(fractional_bits: u8) -> f32 {
    (1u32 << fractional_bits) as f32
}

/// The smallest raw value that is at least `value` once scaled.
pub(crate) fn ceil_u32(value: f32) -> u32 {
    value.ceil() as u32
}

/// The largest raw value that is at most `value` once scaled.
pub(crate) fn floor_u32(value: f32) -> u32 {
    value.floor() as u32
}

#[cfg(test)]
mod test {
    #[test]
    fn round_u32() {
        assert_eq!(super::round_u32(1.4), 1);
        assert_eq!(super::round_u32(1.5), 2);
        assert_eq!(super::round_u32(-3.0), 0);
        assert_eq!(super::round_u32(f32::NAN), 0);
    }

    #[test]
    fn clamp() {
        assert_eq!(super::clamp(5, 1, 10), (5, false));
        assert_eq!(super::clamp(0, 1, 10), (1, true));
        assert_eq!(super::clamp(11, 1, 10), (10, true));
        assert_eq!(super::clamp(0.5f32, 1.0, 10.0), (1.0, true));
    }

    #[test]
    fn inverted_bounds_prefer_min() {
        assert_eq!(super::clamp(20, 10, 5), (10, true));
    }

    #[test]
    fn fixed_point_scale() {
        assert_eq!(super::fixed_point_scale(0), 1.0);
        assert_eq!(super::fixed_point_scale(7), 128.0);
        assert_eq!(super::fixed_point_scale(10), 1024.0);
    }
}
