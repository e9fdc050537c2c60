//! IEEE 754 binary16 conversion, used for every position and rotation on the wire.

/// Converts `value` to binary16 bits, rounding to nearest with ties to even.
pub fn float_to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x007F_FFFF;

    // infinity and NaN
    if exponent == 0xFF {
        let nan = if mantissa != 0 {
            0x0200 | (mantissa >> 13) as u16
        } else {
            0
        };
        return sign | 0x7C00 | nan;
    }

    let half_exponent = exponent - 127 + 15;

    if half_exponent >= 0x1F {
        return sign | 0x7C00;
    }

    if half_exponent <= 0 {
        // below 2^-25 nothing survives rounding
        if half_exponent < -10 {
            return sign;
        }

        let mantissa = mantissa | 0x0080_0000;
        let shift = (14 - half_exponent) as u32;
        let halfway = 1u32 << (shift - 1);
        let remainder = mantissa & ((1u32 << shift) - 1);

        let mut half = mantissa >> shift;
        if remainder > halfway || (remainder == halfway && half & 1 == 1) {
            half += 1;
        }
        return sign | half as u16;
    }

    let mut half = ((half_exponent as u32) << 10) | (mantissa >> 13);
    let remainder = mantissa & 0x1FFF;
    // a carry out of the mantissa correctly bumps the exponent, up to infinity
    if remainder > 0x1000 || (remainder == 0x1000 && half & 1 == 1) {
        half += 1;
    }
    sign | half as u16
}

/// Converts binary16 bits back to a `f32`. Exact for every input.
pub fn half_to_float(half: u16) -> f32 {
    let sign = ((half & 0x8000) as u32) << 16;
    let exponent = ((half >> 10) & 0x1F) as u32;
    let mantissa = (half & 0x03FF) as u32;

    match exponent {
        0 => {
            let magnitude = mantissa as f32 / 16_777_216.0;
            if sign != 0 { -magnitude } else { magnitude }
        }
        0x1F => f32::from_bits(sign | 0x7F80_0000 | (mantissa << 13)),
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (mantissa << 13)),
    }
}

pub fn read_half(packed: u16) -> f32 {
    half_to_float(packed)
}

pub fn write_half(value: &f32) -> u16 {
    float_to_half(*value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(float_to_half(0.0), 0x0000);
        assert_eq!(float_to_half(-0.0), 0x8000);
        assert_eq!(float_to_half(1.0), 0x3C00);
        assert_eq!(float_to_half(-2.0), 0xC000);
        assert_eq!(float_to_half(0.5), 0x3800);
        assert_eq!(float_to_half(0.1), 0x2E66);
        assert_eq!(float_to_half(1.0 / 3.0), 0x3555);
        assert_eq!(float_to_half(65504.0), 0x7BFF);
        assert_eq!(float_to_half(f32::INFINITY), 0x7C00);
        assert_eq!(float_to_half(f32::NEG_INFINITY), 0xFC00);
        assert!(half_to_float(float_to_half(f32::NAN)).is_nan());
    }

    #[test]
    fn overflow_becomes_infinity() {
        assert_eq!(float_to_half(65520.0), 0x7C00);
        assert_eq!(float_to_half(1.0e10), 0x7C00);
        assert_eq!(float_to_half(-1.0e10), 0xFC00);
    }

    #[test]
    fn ties_round_to_even() {
        // halfway between 0x3C00 and 0x3C01, rounds down to the even one
        assert_eq!(float_to_half(1.0 + 2.0f32.powi(-11)), 0x3C00);
        // halfway between 0x3C01 and 0x3C02, rounds up to the even one
        assert_eq!(float_to_half(1.0 + 3.0 * 2.0f32.powi(-11)), 0x3C02);
        // just above the halfway point always rounds up
        assert_eq!(float_to_half(1.0 + 2.0f32.powi(-11) + 2.0f32.powi(-20)), 0x3C01);
    }

    #[test]
    fn subnormals() {
        assert_eq!(float_to_half(2.0f32.powi(-24)), 0x0001);
        assert_eq!(float_to_half(2.0f32.powi(-14)), 0x0400);
        assert_eq!(float_to_half(2.0f32.powi(-15)), 0x0200);
        // exactly half of the smallest subnormal ties to zero
        assert_eq!(float_to_half(2.0f32.powi(-25)), 0x0000);
        assert_eq!(float_to_half(1.0e-10), 0x0000);
        assert_eq!(half_to_float(0x0001), 2.0f32.powi(-24));
        assert_eq!(half_to_float(0x8001), -(2.0f32.powi(-24)));
    }

    #[test]
    fn round_trip_within_precision() {
        let values = [
            0.0f32, 1.0, -1.0, 0.25, -0.75, 3.14159, -123.456, 1000.5, -2048.0, 0.0001, 60000.0,
            0.70710677,
        ];

        for value in values {
            let restored = half_to_float(float_to_half(value));
            // 11 significant bits, so half an ulp is 2^-11 relative
            let tolerance = (value.abs() * 2.0f32.powi(-11)).max(2.0f32.powi(-25));
            assert!(
                (restored - value).abs() <= tolerance,
                "{value} came back as {restored}"
            );
        }
    }

    #[test]
    fn every_half_survives() {
        for bits in 0..=u16::MAX {
            let float = half_to_float(bits);
            if float.is_nan() {
                continue;
            }
            assert_eq!(float_to_half(float), bits);
        }
    }
}
