//! Currency display formatting for alert messages.

/// Format an amount for a currency code. Known codes get their symbol;
/// anything else falls back to `"<code> <amount>"` with two decimals.
pub fn format_currency(amount: f64, currency_code: &str) -> String {
    match symbol_for(currency_code) {
        Some(symbol) => format!("{}{:.2}", symbol, amount),
        None => format!("{} {:.2}", currency_code, amount),
    }
}

fn symbol_for(currency_code: &str) -> Option<&'static str> {
    match currency_code {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "CNY" => Some("¥"),
        "INR" => Some("₹"),
        "KRW" => Some("₩"),
        "CAD" => Some("CA$"),
        "AUD" => Some("A$"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_currency_uses_symbol() {
        assert_eq!(format_currency(410.0, "USD"), "$410.00");
        assert_eq!(format_currency(99.5, "EUR"), "€99.50");
    }

    #[test]
    fn test_unknown_currency_falls_back_to_code() {
        assert_eq!(format_currency(1200.0, "SEK"), "SEK 1200.00");
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        assert_eq!(format_currency(10.005, "USD"), "$10.01");
    }
}
