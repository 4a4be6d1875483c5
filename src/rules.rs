//! Rule storage and lookup.
//!
//! The [`RuleStore`] loads one rule document per country, compiles every
//! wildcard prefix once, and caches the resulting [`RuleSet`] behind an
//! `RwLock`. Reload swaps a fully built `Arc<RuleSet>` in one write, so
//! concurrent readers see either the old or the new set, never a partial
//! one. A missing or malformed document degrades to the built-in rules
//! (and, failing that, to an empty set): rule lookups fail open, screening
//! never stops because a file went bad.

use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::{
    BlockedWordsDocument, DetectionAlgorithms, KnownSpamEntry, RuleConfig, RuleDocument, Severity,
};
use crate::country::Country;

/// Result of an always-block lookup: which category fired and the reason
/// surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub category: String,
    pub reason: String,
    pub matched_prefix: String,
}

/// A known-spam database hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpamMatch {
    pub number: String,
    pub category: String,
    pub severity: Severity,
}

/// A prefix authored with `#` single-digit wildcards compiles to a
/// fixed-width anchored regex; plain prefixes stay `starts_with`.
#[derive(Debug, Clone)]
enum CompiledPrefix {
    Literal(String),
    Wildcard { source: String, regex: Regex },
}

impl CompiledPrefix {
    fn compile(raw: &str) -> Option<CompiledPrefix> {
        let cleaned = raw.replace('+', "");
        if cleaned.is_empty() {
            return None;
        }
        if !cleaned.contains('#') {
            return Some(CompiledPrefix::Literal(cleaned));
        }
        let mut pattern = String::from("^");
        for c in cleaned.chars() {
            if c == '#' {
                pattern.push_str(r"\d");
            } else {
                pattern.push_str(&regex::escape(&c.to_string()));
            }
        }
        pattern.push('$');
        match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPrefix::Wildcard { source: cleaned, regex }),
            Err(e) => {
                warn!("invalid wildcard prefix '{raw}': {e}");
                None
            }
        }
    }

    fn matches(&self, number: &str) -> bool {
        let candidate = number.trim_start_matches('+');
        match self {
            CompiledPrefix::Literal(prefix) => candidate.starts_with(prefix.as_str()),
            CompiledPrefix::Wildcard { regex, .. } => regex.is_match(candidate),
        }
    }

    fn source(&self) -> &str {
        match self {
            CompiledPrefix::Literal(prefix) => prefix,
            CompiledPrefix::Wildcard { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    name: String,
    description: String,
    prefixes: Vec<CompiledPrefix>,
}

#[derive(Debug, Clone)]
struct CompiledNumberPattern {
    prefix: CompiledPrefix,
    reason: String,
}

/// One country's rules, fully parsed and compiled.
#[derive(Debug)]
pub struct RuleSet {
    pub country: Country,
    pub version: String,
    never_block: Vec<String>,
    trusted_prefixes: Vec<String>,
    categories: Vec<CompiledCategory>,
    spam_entries: Vec<KnownSpamEntry>,
    trusted_numbers: Vec<String>,
    spoofing: Vec<CompiledNumberPattern>,
    harassment: Vec<CompiledNumberPattern>,
    /// Content-scoring sections, handed to the message scorer unchanged.
    pub detection: DetectionAlgorithms,
    pub word_categories: std::collections::BTreeMap<String, Vec<String>>,
}

impl RuleSet {
    pub fn from_config(country: Country, config: RuleConfig, words: BlockedWordsDocument) -> Self {
        let mut categories = Vec::new();
        for (name, cat) in &config.prefix_rules.always_block.categories {
            if cat.never_block == Some(true) || !cat.block_by_default {
                continue;
            }
            categories.push(CompiledCategory {
                name: name.clone(),
                description: if cat.description.is_empty() {
                    name.replace('_', " ")
                } else {
                    cat.description.clone()
                },
                prefixes: cat.prefixes.iter().filter_map(|p| CompiledPrefix::compile(p)).collect(),
            });
        }
        // Belgian documents carry a flat list instead of categories.
        if !config.prefix_rules.always_block.prefixes.is_empty() {
            categories.push(CompiledCategory {
                name: "always_block".to_string(),
                description: "Préfixe surtaxé".to_string(),
                prefixes: config
                    .prefix_rules
                    .always_block
                    .prefixes
                    .iter()
                    .filter_map(|p| CompiledPrefix::compile(p))
                    .collect(),
            });
        }

        let trusted_numbers = config
            .whitelist_exceptions
            .trusted_organizations
            .iter()
            .flat_map(|org| org.specific_numbers.iter())
            .map(|n| digits(n))
            .filter(|n| !n.is_empty())
            .collect();

        let mut spoofing = Vec::new();
        let mut harassment = Vec::new();
        if let Some(patterns) = &config.nouveautes_2026 {
            for p in &patterns.visual_spoofing.patterns {
                if let Some(prefix) = CompiledPrefix::compile(&p.pattern) {
                    let target = p.imitates.as_deref().unwrap_or(&p.pattern);
                    spoofing.push(CompiledNumberPattern {
                        prefix,
                        reason: format!("Visual spoofing: {target}"),
                    });
                }
            }
            for p in &patterns.harassment_series.patterns {
                if let Some(prefix) = CompiledPrefix::compile(&p.pattern) {
                    harassment.push(CompiledNumberPattern {
                        prefix,
                        reason: format!("Série harcèlement: {}", p.pattern),
                    });
                }
            }
        }

        RuleSet {
            country,
            version: config.version.clone(),
            never_block: config.prefix_rules.never_block.prefixes.clone(),
            trusted_prefixes: config.trusted_prefixes.prefixes.clone(),
            categories,
            spam_entries: config.known_spam_numbers.entries,
            trusted_numbers,
            spoofing,
            harassment,
            detection: config.detection_algorithms,
            word_categories: words.blocked_words.categories,
        }
    }

    /// Never-block prefixes always win, whatever else matches. Emergency
    /// short codes are listed here and compared against the literal form.
    pub fn never_block(&self, forms: &[String]) -> bool {
        forms
            .iter()
            .any(|f| self.never_block.iter().any(|p| f.starts_with(p.as_str())))
    }

    /// Legitimate toll-free prefixes ("numéros verts") allowed ahead of
    /// every blocking rule.
    pub fn is_green_number(&self, forms: &[String]) -> bool {
        forms
            .iter()
            .any(|f| self.trusted_prefixes.iter().any(|p| f.starts_with(p.as_str())))
    }

    /// Tests both the national and international surface forms against
    /// every always-block category. First matching category wins.
    pub fn always_block_match(&self, national: &str, international: &str) -> Option<RuleMatch> {
        for cat in &self.categories {
            for prefix in &cat.prefixes {
                if prefix.matches(national) || prefix.matches(international) {
                    return Some(RuleMatch {
                        category: cat.name.clone(),
                        reason: cat.description.clone(),
                        matched_prefix: prefix.source().to_string(),
                    });
                }
            }
        }
        None
    }

    /// Country-specific heuristic patterns (visual spoofing, harassment
    /// series), checked after the prefix categories. Takes every surface
    /// form of the number: spoofing patterns only match the literal
    /// dialed form, which national normalization would destroy.
    pub fn pattern_match(&self, forms: &[&str]) -> Option<RuleMatch> {
        for (set, category) in [(&self.spoofing, "visual_spoofing"), (&self.harassment, "harassment")] {
            for p in set.iter() {
                if forms.iter().any(|f| p.prefix.matches(f)) {
                    return Some(RuleMatch {
                        category: category.to_string(),
                        reason: p.reason.clone(),
                        matched_prefix: p.prefix.source().to_string(),
                    });
                }
            }
        }
        None
    }

    /// Known-spam lookup by bidirectional substring containment on the
    /// digit-only forms, so a partial database entry still matches a full
    /// number and vice versa.
    pub fn known_spam(&self, forms: &[String]) -> Option<SpamMatch> {
        for entry in &self.spam_entries {
            let entry_digits = digits(&entry.number);
            if entry_digits.is_empty() {
                continue;
            }
            for form in forms {
                let form_digits = digits(form);
                if form_digits.is_empty() {
                    continue;
                }
                if form_digits.contains(&entry_digits) || entry_digits.contains(&form_digits) {
                    return Some(SpamMatch {
                        number: entry_digits,
                        category: entry.category.clone(),
                        severity: entry.severity,
                    });
                }
            }
        }
        None
    }

    /// Organizational whitelist, same containment discipline as known-spam.
    pub fn is_trusted(&self, forms: &[String]) -> bool {
        for trusted in &self.trusted_numbers {
            for form in forms {
                let form_digits = digits(form);
                if form_digits.is_empty() {
                    continue;
                }
                if form_digits.contains(trusted.as_str()) || trusted.contains(&form_digits) {
                    return true;
                }
            }
        }
        false
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Per-country rule cache. Readers share `Arc<RuleSet>`s; a reload builds
/// the replacement off to the side and swaps it under the write lock.
pub struct RuleStore {
    config_dir: Option<PathBuf>,
    cache: RwLock<HashMap<Country, Arc<RuleSet>>>,
}

impl RuleStore {
    /// Store backed by JSON documents in `config_dir`; countries without a
    /// readable document fall back to the built-in rules.
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        RuleStore {
            config_dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Store using only the built-in rule sets.
    pub fn builtin() -> Self {
        RuleStore::new(None)
    }

    /// Store wrapping an explicit config, for tests and embedders.
    pub fn from_config(country: Country, config: RuleConfig, words: BlockedWordsDocument) -> Self {
        let store = RuleStore::new(None);
        let set = Arc::new(RuleSet::from_config(country, config, words));
        store.cache.write().expect("rule cache poisoned").insert(country, set);
        store
    }

    pub fn rule_set(&self, country: Country) -> Arc<RuleSet> {
        if let Some(set) = self.cache.read().expect("rule cache poisoned").get(&country) {
            return Arc::clone(set);
        }
        let set = Arc::new(self.load(country));
        self.cache
            .write()
            .expect("rule cache poisoned")
            .insert(country, Arc::clone(&set));
        set
    }

    /// Drops the cached set for `country` so the next lookup reloads from
    /// disk. In-flight readers keep their current `Arc`.
    pub fn invalidate(&self, country: Country) {
        self.cache.write().expect("rule cache poisoned").remove(&country);
    }

    fn load(&self, country: Country) -> RuleSet {
        let config = self
            .config_dir
            .as_deref()
            .and_then(|dir| load_rule_config(dir, country))
            .unwrap_or_else(|| RuleConfig::builtin(country));
        let words = self
            .config_dir
            .as_deref()
            .and_then(|dir| load_words(dir, country))
            .unwrap_or_else(|| BlockedWordsDocument::builtin(country));
        debug!(
            "loaded rule set for {country}: version '{}', {} always-block categories",
            config.version,
            config.prefix_rules.always_block.categories.len()
        );
        RuleSet::from_config(country, config, words)
    }
}

pub fn rule_file_name(country: Country) -> String {
    format!("prefixes_blocked_{}.json", country.code().to_lowercase())
}

pub fn words_file_name(country: Country) -> String {
    format!("blocked_words_{}.json", country.code().to_lowercase())
}

fn load_rule_config(dir: &Path, country: Country) -> Option<RuleConfig> {
    let path = dir.join(rule_file_name(country));
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            warn!("rule document {} unreadable, using built-in rules: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str::<RuleDocument>(&text) {
        Ok(doc) => Some(doc.into_config(country)),
        Err(e) => {
            warn!("rule document {} malformed, using built-in rules: {e}", path.display());
            None
        }
    }
}

fn load_words(dir: &Path, country: Country) -> Option<BlockedWordsDocument> {
    let path = dir.join(words_file_name(country));
    let text = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("keyword document {} malformed, using built-in keywords: {e}", path.display());
            None
        }
    }
}
