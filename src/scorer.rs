//! Message content risk scoring.
//!
//! The scorer accumulates points from independent signal families —
//! category keywords, weighted word lists, regex pattern tiers, compound
//! heuristics and contextual structure — then caps the total at 100 and
//! classifies it into a risk band. For a fixed configuration the score is
//! exactly reproducible: no clock, no randomness. A trusted sender
//! short-circuits everything to 0.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use unicode_normalization::UnicodeNormalization;

use crate::rules::RuleSet;

/// Fixed risk-band thresholds, shared with conversation aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    pub fn of_score(score: u32) -> RiskBand {
        match score {
            0..=30 => RiskBand::Low,
            31..=60 => RiskBand::Medium,
            61..=80 => RiskBand::High,
            _ => RiskBand::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Faible",
            RiskBand::Medium => "Modéré",
            RiskBand::High => "Élevé",
            RiskBand::Critical => "Critique",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspicionResult {
    /// 0..=100, min(100, sum of all contributing weights).
    pub score: u32,
    pub band: RiskBand,
    /// Distinct matched words, in detection order.
    pub words: Vec<String>,
    /// Distinct matched pattern descriptions, in detection order.
    pub patterns: Vec<String>,
    pub explanation: String,
}

impl SuspicionResult {
    fn clean(score: u32, explanation: &str) -> Self {
        SuspicionResult {
            score,
            band: RiskBand::of_score(score),
            words: Vec::new(),
            patterns: Vec::new(),
            explanation: explanation.to_string(),
        }
    }

    pub fn is_suspicious(&self) -> bool {
        self.band >= RiskBand::High
    }
}

/// Point values. Category hits additionally scale by the per-category
/// weight below.
const CATEGORY_BASE_POINTS: f64 = 8.0;
const HIGH_RISK_WORD_POINTS: f64 = 20.0;
const MEDIUM_RISK_WORD_POINTS: f64 = 10.0;
const HIGH_RISK_PATTERN_POINTS: f64 = 30.0;
const MEDIUM_RISK_PATTERN_POINTS: f64 = 15.0;
// Courier scams are currently the most common real-world family, hence
// the heaviest pattern weight.
const COURIER_PATTERN_POINTS: f64 = 35.0;
const URGENCY_LINK_POINTS: f64 = 25.0;
const MONEY_ACTION_POINTS: f64 = 20.0;
const BRAND_PROBLEM_POINTS: f64 = 22.0;
const SUSPICIOUS_SENDER_POINTS: f64 = 15.0;
const TIME_PRESSURE_POINTS: f64 = 12.0;
const SHORT_WITH_LINK_POINTS: f64 = 15.0;
const EXTRA_LINK_POINTS: f64 = 8.0;
const UPPERCASE_POINTS: f64 = 10.0;
const EXCLAMATION_POINTS: f64 = 8.0;
const SUSPICIOUS_DOMAIN_POINTS: f64 = 25.0;
const SPELLING_POINTS: f64 = 8.0;

fn category_weight(category: &str) -> f64 {
    match category {
        "urgency" => 3.0,
        "banking" => 2.8,
        "phishing" => 3.0,
        "technical" => 2.5,
        "gains" => 2.3,
        "delivery" => 1.8,
        "call" => 1.2,
        "government" => 2.5,
        _ => 1.0,
    }
}

const URGENCY_WORDS: [&str; 3] = ["urgent", "immediat", "action"];
const LINK_WORDS: [&str; 4] = ["http", "www", "bit.ly", "lien"];
const MONEY_WORDS: [&str; 5] = ["virement", "argent", "gain", "€", "euro"];
const ACTION_WORDS: [&str; 3] = ["cliqu", "appel", "repond"];
const BRAND_WORDS: [&str; 4] = ["amazon", "paypal", "netflix", "google"];
const PROBLEM_WORDS: [&str; 3] = ["probleme", "suspension", "verification"];
const TIME_PRESSURE_WORDS: [&str; 5] = ["24h", "immediat", "expir", "dernier", "echeanc"];
const LINK_TOKENS: [&str; 5] = ["http://", "https://", "www.", "bit.ly", "tinyurl"];
const SPELLING_MISTAKES: [&str; 4] = ["votre compte a ete", "clickez", "telephonez", "recu"];

const SHORT_MESSAGE_LEN: usize = 50;
const UPPERCASE_RATIO_THRESHOLD: f64 = 0.7;

pub struct MessageRiskScorer {
    categories: Vec<(String, Vec<String>)>,
    high_risk_words: Vec<String>,
    medium_risk_words: Vec<String>,
    high_risk_patterns: Vec<Regex>,
    medium_risk_patterns: Vec<Regex>,
    courier_patterns: Vec<Regex>,
    suspicious_domains: Vec<Regex>,
    suspicious_numbers: Vec<Regex>,
    trusted_senders: Vec<String>,
    trusted_numbers: Vec<String>,
}

impl MessageRiskScorer {
    /// Builds the scorer from a loaded rule set. Keywords are normalized
    /// once here; patterns compile case-insensitively, invalid ones are
    /// skipped with a warning (reduced coverage, not a failure).
    pub fn from_rules(rules: &RuleSet) -> Self {
        let detection = &rules.detection;
        MessageRiskScorer {
            categories: rules
                .word_categories
                .iter()
                .map(|(name, words)| {
                    (name.clone(), words.iter().map(|w| normalize_text(w)).collect())
                })
                .collect(),
            high_risk_words: detection
                .weighted_words
                .high_risk
                .words
                .iter()
                .map(|w| normalize_text(w))
                .collect(),
            medium_risk_words: detection
                .weighted_words
                .medium_risk
                .words
                .iter()
                .map(|w| normalize_text(w))
                .collect(),
            high_risk_patterns: compile_patterns(&detection.patterns.high_risk),
            medium_risk_patterns: compile_patterns(&detection.patterns.medium_risk),
            courier_patterns: compile_patterns(&detection.suspicious_characteristics.courier_scam_patterns.patterns),
            suspicious_domains: compile_patterns(&detection.suspicious_characteristics.suspicious_domains.patterns),
            suspicious_numbers: compile_patterns(&detection.suspicious_characteristics.suspicious_numbers.patterns),
            trusted_senders: detection.whitelist.trusted_senders.iter().map(|s| normalize_text(s)).collect(),
            trusted_numbers: detection.whitelist.trusted_numbers.clone(),
        }
    }

    /// Scores one message. `sender` is the raw sender address as supplied
    /// by the platform, `body` the untouched message text.
    pub fn score(&self, sender: &str, body: &str) -> SuspicionResult {
        if body.trim().is_empty() {
            return SuspicionResult::clean(0, "Message vide");
        }
        if self.is_trusted(sender, body) {
            debug!("trusted sender '{sender}', skipping content scoring");
            return SuspicionResult::clean(0, "Expéditeur de confiance");
        }

        let normalized = normalize_text(body);
        let mut total = 0.0;
        let mut words = Vec::new();
        let mut patterns = Vec::new();
        let mut explanations = Vec::new();

        // 1. Category keywords.
        for (category, keywords) in &self.categories {
            let hits: Vec<&String> = keywords.iter().filter(|w| normalized.contains(w.as_str())).collect();
            if !hits.is_empty() {
                let points = hits.len() as f64 * category_weight(category) * CATEGORY_BASE_POINTS;
                total += points;
                words.extend(hits.iter().map(|w| w.to_string()));
                explanations.push(format!("{category}: {} mot(s) (+{})", hits.len(), points as u32));
            }
        }

        // 2. Pattern tiers.
        total += self.scan_patterns(&normalized, &mut patterns);

        // 3. Weighted word lists.
        let word_points = self.scan_weighted_words(&normalized, &mut words);
        total += word_points;
        if word_points > 0.0 {
            explanations.push(format!("Mots suspects: +{}", word_points as u32));
        }

        // 4. Compound heuristics.
        total += self.scan_compounds(sender, &normalized, &mut patterns);

        // 5. Contextual structure.
        let context_points = self.scan_context(body, &normalized);
        total += context_points;
        if context_points > 0.0 {
            explanations.push(format!("Contexte suspect (+{})", context_points as u32));
        }

        let score = (total as u32).min(100);
        let explanation = if explanations.is_empty() {
            "Aucun indicateur suspect détecté".to_string()
        } else {
            explanations.join(", ")
        };

        dedup_in_place(&mut words);
        dedup_in_place(&mut patterns);

        SuspicionResult {
            score,
            band: RiskBand::of_score(score),
            words,
            patterns,
            explanation,
        }
    }

    fn is_trusted(&self, sender: &str, body: &str) -> bool {
        if self.trusted_numbers.iter().any(|n| sender.contains(n.as_str())) {
            return true;
        }
        let normalized = normalize_text(body);
        self.trusted_senders.iter().any(|s| normalized.contains(s.as_str()))
    }

    fn scan_patterns(&self, message: &str, detected: &mut Vec<String>) -> f64 {
        let mut score = 0.0;
        for regex in &self.high_risk_patterns {
            if regex.is_match(message) {
                score += HIGH_RISK_PATTERN_POINTS;
                detected.push(format!("Haut risque: {}", truncate(regex.as_str(), 25)));
            }
        }
        for regex in &self.medium_risk_patterns {
            if regex.is_match(message) {
                score += MEDIUM_RISK_PATTERN_POINTS;
                detected.push(format!("Risque moyen: {}", truncate(regex.as_str(), 25)));
            }
        }
        for regex in &self.courier_patterns {
            if regex.is_match(message) {
                score += COURIER_PATTERN_POINTS;
                detected.push(format!("Arnaque coursier: {}", truncate(regex.as_str(), 25)));
            }
        }
        score
    }

    fn scan_weighted_words(&self, message: &str, detected: &mut Vec<String>) -> f64 {
        let mut score = 0.0;
        for word in &self.high_risk_words {
            if message.contains(word.as_str()) {
                score += HIGH_RISK_WORD_POINTS;
                detected.push(format!("{word} (+{})", HIGH_RISK_WORD_POINTS as u32));
            }
        }
        for word in &self.medium_risk_words {
            if message.contains(word.as_str()) {
                score += MEDIUM_RISK_WORD_POINTS;
                detected.push(format!("{word} (+{})", MEDIUM_RISK_WORD_POINTS as u32));
            }
        }
        score
    }

    fn scan_compounds(&self, sender: &str, message: &str, detected: &mut Vec<String>) -> f64 {
        let mut score = 0.0;

        if contains_any(message, &URGENCY_WORDS) && contains_any(message, &LINK_WORDS) {
            score += URGENCY_LINK_POINTS;
            detected.push("Urgence + Lien".to_string());
        }
        if contains_any(message, &MONEY_WORDS) && contains_any(message, &ACTION_WORDS) {
            score += MONEY_ACTION_POINTS;
            detected.push("Argent + Action requise".to_string());
        }
        if contains_any(message, &BRAND_WORDS) && contains_any(message, &PROBLEM_WORDS) {
            score += BRAND_PROBLEM_POINTS;
            detected.push("Fausse entreprise".to_string());
        }
        if self.is_sender_suspicious(sender) {
            score += SUSPICIOUS_SENDER_POINTS;
            detected.push("Numéro suspect".to_string());
        }
        if contains_any(message, &TIME_PRESSURE_WORDS) {
            score += TIME_PRESSURE_POINTS;
            detected.push("Pression temporelle".to_string());
        }
        score
    }

    fn scan_context(&self, original: &str, normalized: &str) -> f64 {
        let mut score = 0.0;

        let link_count = count_links(normalized);
        if original.chars().count() < SHORT_MESSAGE_LEN && contains_any(normalized, &["http", "www", "bit.ly"]) {
            score += SHORT_WITH_LINK_POINTS;
        }
        if link_count > 1 {
            score += (link_count - 1) as f64 * EXTRA_LINK_POINTS;
        }

        let char_count = original.chars().count();
        if char_count > 10 {
            let upper = original.chars().filter(|c| c.is_uppercase()).count();
            if upper as f64 / char_count as f64 > UPPERCASE_RATIO_THRESHOLD {
                score += UPPERCASE_POINTS;
            }
        }

        if original.chars().filter(|c| *c == '!').count() >= 3 {
            score += EXCLAMATION_POINTS;
        }

        // First suspicious-domain match only; the extra-link bonus already
        // scales with volume.
        if self.suspicious_domains.iter().any(|p| p.is_match(normalized)) {
            score += SUSPICIOUS_DOMAIN_POINTS;
        }

        if contains_any(normalized, &SPELLING_MISTAKES) {
            score += SPELLING_POINTS;
        }

        score
    }

    /// Sender shape checks: configured patterns, premium-rate prefixes,
    /// foreign numbers, implausible lengths.
    fn is_sender_suspicious(&self, sender: &str) -> bool {
        if self.suspicious_numbers.iter().any(|p| p.is_match(sender)) {
            return true;
        }
        if sender.starts_with("08") || sender.starts_with("09") {
            return true;
        }
        if sender.starts_with('+') && !sender.starts_with("+33") && !sender.starts_with("+32") {
            return true;
        }
        let digit_count = sender.chars().filter(|c| c.is_ascii_digit()).count();
        digit_count < 8 || digit_count > 12
    }
}

/// Normalization applied to every keyword and message before matching:
/// NFD decomposition with combining marks dropped (diacritics), Cyrillic
/// look-alike substitution (homoglyph evasion), lowercasing, whitespace
/// collapse.
pub fn normalize_text(text: &str) -> String {
    lazy_static! {
        static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    }
    let decomposed: String = text
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .map(substitute_homoglyph)
        .collect();
    let lowered = decomposed.to_lowercase();
    WHITESPACE.replace_all(lowered.trim(), " ").into_owned()
}

fn substitute_homoglyph(c: char) -> char {
    match c {
        'а' | 'А' => 'a', // Cyrillic
        'е' | 'Е' => 'e',
        'о' | 'О' => 'o',
        'р' | 'Р' => 'p',
        'с' | 'С' => 'c',
        'у' | 'У' => 'y',
        'х' | 'Х' => 'x',
        _ => c,
    }
}

fn compile_patterns(sources: &[String]) -> Vec<Regex> {
    sources
        .iter()
        .filter_map(|src| match RegexBuilder::new(src).case_insensitive(true).build() {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("skipping invalid pattern '{src}': {e}");
                None
            }
        })
        .collect()
}

fn contains_any(message: &str, words: &[&str]) -> bool {
    words.iter().any(|w| message.contains(w))
}

fn count_links(message: &str) -> usize {
    LINK_TOKENS.iter().map(|t| message.matches(t).count()).sum()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::Country;
    use crate::rules::RuleStore;

    fn scorer() -> MessageRiskScorer {
        let rules = RuleStore::builtin().rule_set(Country::Fr);
        MessageRiskScorer::from_rules(&rules)
    }

    #[test]
    fn empty_body_scores_zero() {
        let result = scorer().score("+33612345678", "   ");
        assert_eq!(result.score, 0);
        assert_eq!(result.band, RiskBand::Low);
        assert_eq!(result.explanation, "Message vide");
    }

    #[test]
    fn trusted_number_short_circuits_scoring() {
        // 36646 is a configured trusted number; body content is ignored.
        let result = scorer().score("36646", "URGENT!!! Votre compte est bloque http://bit.ly/x");
        assert_eq!(result.score, 0);
        assert_eq!(result.explanation, "Expéditeur de confiance");
    }

    #[test]
    fn trusted_sender_name_in_body_short_circuits() {
        let result = scorer().score("+33612345678", "Votre rendez-vous Doctolib est confirmé demain");
        assert_eq!(result.score, 0);
    }

    #[test]
    fn lottery_scam_scores_critical() {
        let result = scorer().score(
            "+233501234567",
            "Vous avez GAGNE 1000 euros!!! Cliquez ici: http://bit.ly/x",
        );
        assert!(result.score >= 80, "score was {}", result.score);
        assert_eq!(result.band, RiskBand::Critical);
        assert!(result.words.iter().any(|w| w.contains("gagne")));
    }

    #[test]
    fn courier_scam_pattern_weighs_heaviest() {
        let calm = scorer().score("+33612345678", "Votre rendez-vous est confirmé");
        let courier = scorer().score("+33612345678", "Votre colis est bloque, frais de douane requis");
        assert!(courier.score > calm.score + 30);
        assert!(courier.patterns.iter().any(|p| p.starts_with("Arnaque coursier")));
    }

    #[test]
    fn score_is_monotonic_under_appended_triggers() {
        let s = scorer();
        let sender = "+33612345678";
        let mut body = String::from("Bonjour, votre rendez-vous est confirmé.");
        let mut last = s.score(sender, &body).score;
        for trigger in [
            " Votre colis est en attente.",
            " Frais de douane a payer.",
            " Offre limitee, repondez vite!",
            " Virement recu, cliquez http://bit.ly/a",
            " URGENT action requise http://bit.ly/b",
        ] {
            body.push_str(trigger);
            let next = s.score(sender, &body).score;
            assert!(next >= last, "score decreased from {last} to {next} after '{trigger}'");
            assert!(next <= 100);
            last = next;
        }
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        let body = "URGENT!!! GAGNE virement euros gagne colis bloque frais de douane \
                    cliquez http://bit.ly/a http://bit.ly/b www.arnaque.tk compte bloque \
                    carte bancaire code secret immediat dernier 24h"
            .repeat(3);
        let result = scorer().score("0899123456", &body);
        assert_eq!(result.score, 100);
        assert_eq!(result.band, RiskBand::Critical);
    }

    #[test]
    fn band_thresholds_are_fixed() {
        assert_eq!(RiskBand::of_score(0), RiskBand::Low);
        assert_eq!(RiskBand::of_score(30), RiskBand::Low);
        assert_eq!(RiskBand::of_score(31), RiskBand::Medium);
        assert_eq!(RiskBand::of_score(60), RiskBand::Medium);
        assert_eq!(RiskBand::of_score(61), RiskBand::High);
        assert_eq!(RiskBand::of_score(80), RiskBand::High);
        assert_eq!(RiskBand::of_score(81), RiskBand::Critical);
        assert_eq!(RiskBand::of_score(100), RiskBand::Critical);
    }

    #[test]
    fn homoglyph_evasion_scores_like_plain_text() {
        let s = scorer();
        // Cyrillic а/е/о standing in for Latin letters.
        let evasive = "Vous avez gаgné 1000 еurоs, cliquez http://bit.ly/x";
        let plain = "Vous avez gagné 1000 euros, cliquez http://bit.ly/x";
        assert_eq!(s.score("+33612345678", evasive).score, s.score("+33612345678", plain).score);
    }

    #[test]
    fn diacritics_are_stripped_before_matching() {
        assert_eq!(normalize_text("Félicitations  GAGNÉ"), "felicitations gagne");
    }

    #[test]
    fn uppercase_shouting_adds_points() {
        let s = scorer();
        let shouted = s.score("+33612345678", "VOTRE COLIS EST BLOQUE AU DEPOT");
        let spoken = s.score("+33612345678", "Votre colis est bloque au depot");
        assert!(shouted.score > spoken.score);
    }

    #[test]
    fn extra_links_add_points_beyond_the_first() {
        let s = scorer();
        // Long enough to avoid the short-with-link bonus; identical text
        // apart from the second link.
        let one = s.score("+33612345678", "Consultez notre catalogue complet ici maintenant: http://a.example/page1 merci");
        let two = s.score("+33612345678", "Consultez notre catalogue complet ici maintenant: http://a.example/page1 http://b.example/page2");
        assert!(two.score > one.score);
    }

    #[test]
    fn suspicious_sender_shapes_are_flagged() {
        let s = scorer();
        assert!(s.is_sender_suspicious("0899123456"));
        assert!(s.is_sender_suspicious("+4915123456789"));
        assert!(s.is_sender_suspicious("38001")); // short code
        assert!(!s.is_sender_suspicious("+33612345678"));
    }

    #[test]
    fn evidence_lists_are_distinct() {
        let result = scorer().score("0899123456", "gagne gagne gagne euro euro cliquez");
        let mut seen = std::collections::HashSet::new();
        for w in &result.words {
            assert!(seen.insert(w.clone()), "duplicate evidence entry {w}");
        }
    }
}
