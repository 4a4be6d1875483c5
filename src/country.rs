use std::fmt;

/// Countries the rule sets cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Country {
    Fr,
    Be,
}

impl Country {
    pub const DEFAULT: Country = Country::Fr;

    /// ISO code used as the cache key and in config documents.
    pub fn code(&self) -> &'static str {
        match self {
            Country::Fr => "FR",
            Country::Be => "BE",
        }
    }

    /// International calling code without the `+`.
    pub fn calling_code(&self) -> &'static str {
        match self {
            Country::Fr => "33",
            Country::Be => "32",
        }
    }

    pub fn from_code(code: &str) -> Option<Country> {
        match code.to_ascii_uppercase().as_str() {
            "FR" => Some(Country::Fr),
            "BE" => Some(Country::Be),
            _ => None,
        }
    }

    /// Country named by an explicit international prefix, if any.
    /// Spoofed or purely national numbers carry no such prefix and
    /// return `None`.
    pub fn of_international_prefix(raw: &str) -> Option<Country> {
        let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();

        if cleaned.starts_with("+33") || cleaned.starts_with("0033") {
            Some(Country::Fr)
        } else if cleaned.starts_with("+32") || cleaned.starts_with("0032") {
            Some(Country::Be)
        } else {
            None
        }
    }

    /// Guesses the country of a phone number from its prefix. National
    /// numbers are disambiguated by length: French national numbers are
    /// 10 digits, Belgian fixed lines are 9. Anything unrecognized falls
    /// back to France.
    pub fn of_number(raw: &str) -> Country {
        if let Some(country) = Country::of_international_prefix(raw) {
            return country;
        }
        let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();

        if cleaned.starts_with('0') && !cleaned.starts_with("00") {
            if cleaned.len() == 10 {
                Country::Fr
            } else {
                Country::Be
            }
        } else {
            Country::DEFAULT
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Device-side country detection (SIM, locale). Platform collaborators
/// implement this; the core only ever asks for a country.
pub trait CountrySource {
    fn detect_country(&self) -> Country;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_france_from_international_prefixes() {
        assert_eq!(Country::of_number("+33612345678"), Country::Fr);
        assert_eq!(Country::of_number("0033612345678"), Country::Fr);
    }

    #[test]
    fn detects_belgium_from_international_prefixes() {
        assert_eq!(Country::of_number("+32471234567"), Country::Be);
        assert_eq!(Country::of_number("0032471234567"), Country::Be);
    }

    #[test]
    fn national_numbers_disambiguated_by_length() {
        assert_eq!(Country::of_number("0612345678"), Country::Fr);
        assert_eq!(Country::of_number("021234567"), Country::Be);
    }

    #[test]
    fn unknown_defaults_to_france() {
        assert_eq!(Country::of_number("+14155552671"), Country::Fr);
        assert_eq!(Country::of_number("112"), Country::Fr);
    }

    #[test]
    fn ignores_separator_characters() {
        assert_eq!(Country::of_number("+33 6 12 34 56 78"), Country::Fr);
    }
}
