/// Formats `x` in C-style scientific notation (`%.{precision}e`), e.g. `1.50e+00`.
pub fn sci(x: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, x);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_c_printf_exponent_layout() {
        assert_eq!(sci(1.5, 2), "1.50e+00");
        assert_eq!(sci(-0.000123, 3), "-1.230e-04");
        assert_eq!(sci(6.02e23, 1), "6.0e+23");
        assert_eq!(sci(1e-100, 0), "1e-100");
    }

    #[test]
    fn non_finite_values_pass_through() {
        assert_eq!(sci(f64::NAN, 4), "NaN");
        assert_eq!(sci(f64::INFINITY, 4), "inf");
    }
}
