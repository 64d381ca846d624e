use pay_common::MinorUnits;
use payment_core::traits::GatewayError;

/// Formats a minor-unit amount the way the gateway writes money on the wire, e.g. `50000` -> `"50000.00"`.
pub fn format_gross_amount(amount: MinorUnits) -> String {
    format!("{}.00", amount.value())
}

/// Parses a gateway amount string back into minor units.
///
/// The gateway deals in zero-decimal currency but still pads amounts with a decimal fraction, so `"50000.00"` and
/// `"50000"` are both `50000`. A non-zero fraction means the amount cannot be represented and is an error rather
/// than something to round.
pub fn parse_gross_amount(s: &str) -> Result<MinorUnits, GatewayError> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if !frac.is_empty() && !frac.chars().all(|c| c == '0') {
        return Err(GatewayError::ResponseError(format!("Fractional gateway amount: {s}")));
    }
    whole
        .parse::<i64>()
        .map(MinorUnits::from)
        .map_err(|_| GatewayError::ResponseError(format!("Unparseable gateway amount: {s}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        assert_eq!(format_gross_amount(MinorUnits::from(50_000)), "50000.00");
        assert_eq!(parse_gross_amount("50000.00").unwrap(), MinorUnits::from(50_000));
        assert_eq!(parse_gross_amount("50000").unwrap(), MinorUnits::from(50_000));
        assert_eq!(parse_gross_amount("0.0").unwrap(), MinorUnits::from(0));
    }

    #[test]
    fn fractional_amounts_are_rejected() {
        assert!(parse_gross_amount("50000.50").is_err());
        assert!(parse_gross_amount("five").is_err());
        assert!(parse_gross_amount("").is_err());
    }
}
