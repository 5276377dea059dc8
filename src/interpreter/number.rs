// File: src/interpreter/number.rs
//
// Text form of numbers as printed by `print`. Matches the classic `%g`
// conversion: `precision` significant digits, trailing zeros dropped, and
// scientific notation once the decimal exponent is below -4 or reaches the
// precision.

pub const DEFAULT_PRECISION: usize = 6;

/// Formats `value` the way `print` shows it.
pub fn format_number(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }

    let precision = precision.max(1);
    // Round to the requested significant digits first; the exponent that
    // decides between fixed and scientific notation is the rounded one.
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_trailing_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_trailing_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(value: f64) -> String {
        format_number(value, DEFAULT_PRECISION)
    }

    #[test]
    fn test_integral_values_have_no_fraction() {
        assert_eq!(fmt(7.0), "7");
        assert_eq!(fmt(-42.0), "-42");
        assert_eq!(fmt(123456.0), "123456");
        assert_eq!(fmt(1.0), "1");
    }

    #[test]
    fn test_fractions_use_six_significant_digits() {
        assert_eq!(fmt(0.5), "0.5");
        assert_eq!(fmt(1.0 / 3.0), "0.333333");
        assert_eq!(fmt(2.0 / 3.0), "0.666667");
        assert_eq!(fmt(3.14159265), "3.14159");
        assert_eq!(fmt(0.0001), "0.0001");
    }

    #[test]
    fn test_large_and_small_values_switch_to_exponent() {
        assert_eq!(fmt(1e6), "1e+06");
        assert_eq!(fmt(1234567.0), "1.23457e+06");
        assert_eq!(fmt(999999.5), "1e+06");
        assert_eq!(fmt(0.00001), "1e-05");
        assert_eq!(fmt(1.5e-7), "1.5e-07");
        assert_eq!(fmt(2.0_f64.powi(100)), "1.26765e+30");
        assert_eq!(fmt(1e300 * 10.0), "1e+301");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(fmt(0.0), "0");
        assert_eq!(fmt(-0.0), "-0");
        assert_eq!(fmt(f64::INFINITY), "inf");
        assert_eq!(fmt(f64::NEG_INFINITY), "-inf");
        assert_eq!(fmt(f64::NAN), "nan");
    }

    #[test]
    fn test_custom_precision() {
        assert_eq!(format_number(1.0 / 3.0, 3), "0.333");
        assert_eq!(format_number(1234.0, 3), "1.23e+03");
        assert_eq!(format_number(2.4, 1), "2");
        assert_eq!(format_number(1.0 / 3.0, 0), "0.3");
        assert_eq!(format_number(0.1 + 0.2, 17), "0.30000000000000004");
    }
}
