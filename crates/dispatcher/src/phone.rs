//! Phone canonicalization.
//!
//! The provider expects full international numbers as bare digits
//! (country code + national number, no `+`). Uploaded files carry phones
//! in whatever shape the operator's spreadsheet had: formatted, with a
//! trunk prefix, with or without a country code.

/// Canonicalization settings.
#[derive(Debug, Clone)]
pub struct PhoneOptions {
    /// Country code prepended to bare national numbers.
    pub default_country_code: String,
}

impl Default for PhoneOptions {
    fn default() -> Self {
        Self {
            default_country_code: "1".to_string(),
        }
    }
}

/// Bounds on the canonical digit count, per E.164.
const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// National numbers in this length range get the default country code
/// prepended when they don't already start with it.
const NATIONAL_MIN: usize = 8;
const NATIONAL_MAX: usize = 12;

/// Canonicalize a raw phone string.
///
/// Returns the provider-ready digit string, or `None` when the input
/// cannot be a valid number. A leading `+` or `00` marks the number as
/// already international; otherwise one leading trunk `0` is dropped and
/// the default country code applied to bare national numbers.
pub fn canonicalize(raw: &str, options: &PhoneOptions) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let explicit_international = trimmed.starts_with('+');
    let mut digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let candidate = if explicit_international {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else {
        if digits.starts_with('0') {
            digits.remove(0);
        }
        let cc = options.default_country_code.as_str();
        if (NATIONAL_MIN..=NATIONAL_MAX).contains(&digits.len()) && !digits.starts_with(cc) {
            format!("{cc}{digits}")
        } else {
            digits
        }
    };

    if (MIN_DIGITS..=MAX_DIGITS).contains(&candidate.len()) {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(cc: &str) -> PhoneOptions {
        PhoneOptions {
            default_country_code: cc.to_string(),
        }
    }

    #[test]
    fn formatted_national_number_gets_country_code() {
        assert_eq!(
            canonicalize("(555) 000-1111", &opts("1")),
            Some("15550001111".to_string())
        );
    }

    #[test]
    fn plus_prefixed_number_is_kept_as_is() {
        assert_eq!(
            canonicalize("+44 7700 900123", &opts("1")),
            Some("447700900123".to_string())
        );
    }

    #[test]
    fn double_zero_prefix_is_international() {
        assert_eq!(
            canonicalize("0044 7700 900123", &opts("1")),
            Some("447700900123".to_string())
        );
    }

    #[test]
    fn trunk_zero_is_dropped_before_country_code() {
        assert_eq!(
            canonicalize("07700 900123", &opts("44")),
            Some("447700900123".to_string())
        );
    }

    #[test]
    fn number_already_carrying_country_code_is_not_doubled() {
        assert_eq!(
            canonicalize("15550001111", &opts("1")),
            Some("15550001111".to_string())
        );
    }

    #[test]
    fn garbage_and_short_inputs_fail() {
        assert_eq!(canonicalize("", &opts("1")), None);
        assert_eq!(canonicalize("n/a", &opts("1")), None);
        assert_eq!(canonicalize("12345", &opts("1")), None);
        assert_eq!(canonicalize("+123", &opts("1")), None);
    }

    #[test]
    fn overlong_numbers_fail() {
        assert_eq!(canonicalize("+1234567890123456", &opts("1")), None);
    }
}
