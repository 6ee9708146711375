//! MSISDN normalisation for mobile-money rails.

use crate::domain::foundation::ValidationError;

const COUNTRY_CODE: &str = "254";

/// Normalises a Kenyan mobile number to the `2547XXXXXXXX` form the
/// provider expects.
///
/// Accepts `07..`/`01..` local numbers, `+254..` and bare `254..`
/// international forms, and nine-digit subscriber numbers.
pub fn normalize_msisdn(raw: &str) -> Result<String, ValidationError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if cleaned.is_empty() {
        return Err(ValidationError::empty_field("phone_number"));
    }
    if !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format(
            "phone_number",
            "must contain only digits",
        ));
    }

    let normalized = match cleaned.len() {
        12 if cleaned.starts_with(COUNTRY_CODE) => cleaned.to_string(),
        10 if cleaned.starts_with('0') => format!("{}{}", COUNTRY_CODE, &cleaned[1..]),
        9 => format!("{}{}", COUNTRY_CODE, cleaned),
        _ => {
            return Err(ValidationError::invalid_format(
                "phone_number",
                format!("unrecognised number '{}'", raw),
            ))
        }
    };

    match normalized.as_bytes()[3] {
        b'7' | b'1' => Ok(normalized),
        _ => Err(ValidationError::invalid_format(
            "phone_number",
            "not a mobile subscriber number",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_format_gets_country_code() {
        assert_eq!(normalize_msisdn("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("0112 345 678").unwrap(), "254112345678");
    }

    #[test]
    fn international_formats_are_kept() {
        assert_eq!(normalize_msisdn("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("712345678").unwrap(), "254712345678");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize_msisdn("").is_err());
        assert!(normalize_msisdn("07123abc78").is_err());
        assert!(normalize_msisdn("12345").is_err());
        assert!(normalize_msisdn("0212345678").is_err());
    }
}
