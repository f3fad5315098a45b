/// Format a number the way it appears in series keys and predicate text:
/// integral values without a fractional part (`30`, `2`), everything else
/// with the shortest round-tripping representation (`2.5`, `0.015`).
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_values_drop_fraction() {
        assert_eq!(format_number(30.0), "30");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn fractional_values_keep_digits() {
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.015), "0.015");
    }
}
