//! Phone number canonicalization and surface-form expansion.
//!
//! A number arrives in whatever shape the network or the user typed:
//! `+33612345678`, `0612345678`, `0033 6 12 34 56 78`, `33612345678`.
//! Every matching stage needs to treat those as the same number, so the
//! expansion produces all separator-free surface forms and the
//! canonicalizer picks one normalized representative for exact comparison.
//! Invalid input is never rejected; an unrecognized string comes back as
//! its own single form and falls through to default-allow downstream.

use crate::country::Country;

/// Service and emergency codes are shorter than any real subscriber
/// number. They are compared literally and never expanded.
const MIN_EXPANDABLE_LEN: usize = 4;

/// Strips everything except digits and a leading `+`.
pub fn clean(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.trim().chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }
    out
}

/// Returns every separator-free surface form of `raw`: the cleaned input
/// itself plus, when the country prefix is recognizable, the national
/// (`0XXXXXXXXX`), plus-international (`+33XXXXXXXXX`) and bare
/// international (`33XXXXXXXXX`) variants.
pub fn expand_formats(raw: &str) -> Vec<String> {
    let cleaned = clean(raw);
    let mut formats = vec![cleaned.clone()];

    if cleaned.len() < MIN_EXPANDABLE_LEN {
        return formats;
    }

    for country in [Country::Fr, Country::Be] {
        let cc = country.calling_code();
        if let Some(rest) = cleaned
            .strip_prefix(&format!("+{cc}"))
            .or_else(|| cleaned.strip_prefix(&format!("00{cc}")))
        {
            if !rest.is_empty() {
                formats.push(format!("+{cc}{rest}"));
                formats.push(format!("{cc}{rest}"));
                formats.push(format!("0{rest}"));
            }
            dedup(&mut formats);
            return formats;
        }
        // Bare international form without + or 00. Requires enough digits
        // to not confuse "33" the service code with "33…" the prefix.
        if let Some(rest) = cleaned.strip_prefix(cc) {
            if cleaned.len() > MIN_EXPANDABLE_LEN && !cleaned.starts_with('0') {
                formats.push(format!("+{cc}{rest}"));
                formats.push(format!("0{rest}"));
                dedup(&mut formats);
                return formats;
            }
        }
    }

    // National trunk form: 10 digits starting with 0 is French,
    // 9 or 10 digits starting with 0 can be Belgian.
    if cleaned.starts_with('0') && !cleaned.starts_with("00") {
        let country = Country::of_number(&cleaned);
        let cc = country.calling_code();
        let rest = &cleaned[1..];
        if !rest.is_empty() {
            formats.push(format!("+{cc}{rest}"));
            formats.push(format!("{cc}{rest}"));
        }
    }

    dedup(&mut formats);
    formats
}

/// Produces the single canonical form used for exact comparisons:
/// `+<cc><subscriber>` when the number is recognizably French or Belgian,
/// the cleaned input otherwise. Idempotent: canonicalizing a canonical
/// form yields itself.
pub fn canonicalize(raw: &str, country: Country) -> String {
    let cleaned = clean(raw);

    if cleaned.len() < MIN_EXPANDABLE_LEN {
        return cleaned;
    }

    for c in [Country::Fr, Country::Be] {
        let cc = c.calling_code();
        if let Some(rest) = cleaned
            .strip_prefix(&format!("+{cc}"))
            .or_else(|| cleaned.strip_prefix(&format!("00{cc}")))
        {
            if !rest.is_empty() {
                return format!("+{cc}{rest}");
            }
        }
    }

    let cc = country.calling_code();
    if cleaned.starts_with('0') && !cleaned.starts_with("00") && cleaned.len() >= 9 {
        return format!("+{cc}{}", &cleaned[1..]);
    }

    cleaned
}

/// National form with the leading trunk zero, for rule matching against
/// prefixes authored nationally (`0890…`).
pub fn national_form(raw: &str, country: Country) -> String {
    let cleaned = clean(raw);
    let cc = country.calling_code();

    if let Some(rest) = cleaned
        .strip_prefix(&format!("+{cc}"))
        .or_else(|| cleaned.strip_prefix(&format!("00{cc}")))
    {
        return format!("0{rest}");
    }
    if cleaned.starts_with("00") {
        return cleaned[2..].to_string();
    }
    if let Some(rest) = cleaned.strip_prefix('+') {
        return rest.to_string();
    }
    cleaned
}

/// International form without the `+`, for rule matching against prefixes
/// authored internationally (`3389…`).
pub fn international_form(raw: &str, country: Country) -> String {
    let cleaned = clean(raw);

    if let Some(rest) = cleaned.strip_prefix('+') {
        return rest.to_string();
    }
    if let Some(rest) = cleaned.strip_prefix("00") {
        return rest.to_string();
    }
    if cleaned.starts_with('0') {
        return format!("{}{}", country.calling_code(), &cleaned[1..]);
    }
    cleaned
}

/// True when both inputs canonicalize to the same non-empty form.
pub fn numbers_equal(a: &str, b: &str, country: Country) -> bool {
    let ca = canonicalize(a, country);
    let cb = canonicalize(b, country);
    !ca.is_empty() && ca == cb
}

/// Human-readable national rendering (`06 12 34 56 78`) for CLI output.
pub fn national_display(raw: &str, country: Country) -> String {
    let national = national_form(raw, country);
    if national.len() != 10 || !national.starts_with('0') {
        return national;
    }
    national
        .as_bytes()
        .chunks(2)
        .map(|pair| std::str::from_utf8(pair).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn dedup(formats: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    formats.retain(|f| !f.is_empty() && seen.insert(f.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_french_international_number() {
        let formats = expand_formats("+33612345678");
        assert!(formats.contains(&"+33612345678".to_string()));
        assert!(formats.contains(&"33612345678".to_string()));
        assert!(formats.contains(&"0612345678".to_string()));
    }

    #[test]
    fn expands_french_national_number() {
        let formats = expand_formats("0612345678");
        assert!(formats.contains(&"0612345678".to_string()));
        assert!(formats.contains(&"+33612345678".to_string()));
        assert!(formats.contains(&"33612345678".to_string()));
    }

    #[test]
    fn expands_00_prefixed_number() {
        let formats = expand_formats("0033612345678");
        assert!(formats.contains(&"+33612345678".to_string()));
        assert!(formats.contains(&"0612345678".to_string()));
    }

    #[test]
    fn expands_belgian_number() {
        let formats = expand_formats("+32471234567");
        assert!(formats.contains(&"0471234567".to_string()));
        assert!(formats.contains(&"32471234567".to_string()));
    }

    #[test]
    fn short_codes_stay_literal() {
        assert_eq!(expand_formats("112"), vec!["112".to_string()]);
        assert_eq!(expand_formats("15"), vec!["15".to_string()]);
    }

    #[test]
    fn strips_separators() {
        let formats = expand_formats("+33 6 12 34 56 78");
        assert!(formats.contains(&"0612345678".to_string()));
    }

    #[test]
    fn unrecognized_number_is_its_own_form() {
        let formats = expand_formats("+14155552671");
        assert_eq!(formats, vec!["+14155552671".to_string()]);
    }

    #[test]
    fn canonicalize_national_french_numbers() {
        for n in ["0612345678", "0145678901", "0990123456"] {
            let canonical = canonicalize(n, Country::Fr);
            assert_eq!(canonical, format!("+33{}", &n[1..]));
        }
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for n in ["0612345678", "+33612345678", "0033612345678", "112", "+14155552671", "garbage"] {
            let once = canonicalize(n, Country::Fr);
            assert_eq!(canonicalize(&once, Country::Fr), once);
        }
    }

    #[test]
    fn national_and_international_forms() {
        assert_eq!(national_form("+33890123456", Country::Fr), "0890123456");
        assert_eq!(international_form("0890123456", Country::Fr), "33890123456");
        assert_eq!(international_form("+33890123456", Country::Fr), "33890123456");
    }

    #[test]
    fn equality_across_surface_forms() {
        assert!(numbers_equal("+33612345678", "06 12 34 56 78", Country::Fr));
        assert!(numbers_equal("0033612345678", "0612345678", Country::Fr));
        assert!(!numbers_equal("0612345678", "0612345679", Country::Fr));
        assert!(!numbers_equal("", "", Country::Fr));
    }

    #[test]
    fn national_display_pairs_digits() {
        assert_eq!(national_display("+33612345678", Country::Fr), "06 12 34 56 78");
        assert_eq!(national_display("3900", Country::Fr), "3900");
    }
}
