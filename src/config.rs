//! Typed schema for the per-country rule documents.
//!
//! Two documents feed the engine: the prefix/spam rule document
//! (`prefixes_blocked_xx.json`) and the category keyword document
//! (`blocked_words_xx.json`). Field names mirror the shipped JSON files
//! exactly; existing configuration must keep loading unchanged. Older
//! installations carry the prefix document as a bare JSON array of
//! prefixes, so loading goes through [`RuleDocument`] which resolves the
//! two shapes once, up front. Downstream code only ever sees [`RuleConfig`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::country::Country;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// On-disk shape of the prefix rule document. Legacy files are a bare
/// array of prefix strings; versioned files are the full object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RuleDocument {
    Legacy(Vec<String>),
    Versioned(RuleConfig),
}

impl RuleDocument {
    /// Normalizes either on-disk shape into the internal representation.
    /// A legacy array becomes a single block-by-default category.
    pub fn into_config(self, country: Country) -> RuleConfig {
        match self {
            RuleDocument::Versioned(config) => config,
            RuleDocument::Legacy(prefixes) => {
                let mut categories = BTreeMap::new();
                categories.insert(
                    "legacy".to_string(),
                    PrefixCategory {
                        description: "Legacy blocked prefixes".to_string(),
                        prefixes,
                        block_by_default: true,
                        never_block: None,
                    },
                );
                RuleConfig {
                    version: "1.0-legacy".to_string(),
                    prefix_rules: PrefixRules {
                        never_block: PrefixList::default(),
                        always_block: AlwaysBlock {
                            categories,
                            prefixes: Vec::new(),
                        },
                    },
                    ..RuleConfig::empty(country)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prefix_rules: PrefixRules,
    /// Toll-free and otherwise legitimate prefixes allowed ahead of any
    /// blocking rule ("numéros verts").
    #[serde(default)]
    pub trusted_prefixes: TrustedPrefixes,
    #[serde(default)]
    pub known_spam_numbers: KnownSpamNumbers,
    #[serde(default)]
    pub whitelist_exceptions: WhitelistExceptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nouveautes_2026: Option<CountryPatterns>,
    #[serde(default)]
    pub detection_algorithms: DetectionAlgorithms,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefixRules {
    #[serde(default)]
    pub never_block: PrefixList,
    #[serde(default)]
    pub always_block: AlwaysBlock,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefixList {
    #[serde(default)]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlwaysBlock {
    /// Named categories (French document shape). BTreeMap keeps category
    /// evaluation order stable across reloads.
    #[serde(default)]
    pub categories: BTreeMap<String, PrefixCategory>,
    /// Flat prefix list (Belgian document shape).
    #[serde(default)]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixCategory {
    #[serde(default)]
    pub description: String,
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub block_by_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub never_block: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustedPrefixes {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnownSpamNumbers {
    #[serde(default)]
    pub entries: Vec<KnownSpamEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownSpamEntry {
    pub number: String,
    pub category: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhitelistExceptions {
    #[serde(default)]
    pub trusted_organizations: Vec<TrustedOrganization>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedOrganization {
    pub name: String,
    #[serde(default)]
    pub specific_numbers: Vec<String>,
}

/// Country-specific heuristic pattern sets (visual spoofing, harassment
/// series). Pattern strings use `#` as a single-digit wildcard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryPatterns {
    #[serde(default)]
    pub visual_spoofing: PatternSection,
    #[serde(default)]
    pub harassment_series: PatternSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSection {
    #[serde(default)]
    pub patterns: Vec<NumberPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberPattern {
    pub pattern: String,
    /// For visual spoofing: the legitimate number shape being imitated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imitates: Option<String>,
}

/// Content-scoring configuration consumed by the message risk scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionAlgorithms {
    #[serde(default)]
    pub patterns: RiskPatterns,
    #[serde(default)]
    pub weighted_words: WeightedWords,
    #[serde(default)]
    pub whitelist: ScoringWhitelist,
    #[serde(default)]
    pub suspicious_characteristics: SuspiciousCharacteristics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskPatterns {
    #[serde(default)]
    pub high_risk: Vec<String>,
    #[serde(default)]
    pub medium_risk: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightedWords {
    #[serde(default)]
    pub high_risk: WordList,
    #[serde(default)]
    pub medium_risk: WordList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordList {
    #[serde(default)]
    pub words: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringWhitelist {
    #[serde(default)]
    pub trusted_senders: Vec<String>,
    #[serde(default)]
    pub trusted_numbers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuspiciousCharacteristics {
    #[serde(default)]
    pub suspicious_numbers: PatternList,
    #[serde(default)]
    pub suspicious_domains: PatternList,
    #[serde(default)]
    pub courier_scam_patterns: PatternList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternList {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Category keyword document (`blocked_words_xx.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockedWordsDocument {
    #[serde(default)]
    pub blocked_words: BlockedWords,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockedWords {
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl RuleConfig {
    pub fn empty(country: Country) -> Self {
        RuleConfig {
            version: String::new(),
            country: country.code().to_string(),
            last_updated: String::new(),
            description: String::new(),
            prefix_rules: PrefixRules::default(),
            trusted_prefixes: TrustedPrefixes::default(),
            known_spam_numbers: KnownSpamNumbers::default(),
            whitelist_exceptions: WhitelistExceptions::default(),
            nouveautes_2026: None,
            detection_algorithms: DetectionAlgorithms::default(),
        }
    }

    /// Built-in rule set shipped with the binary, so screening works with
    /// no configuration files on disk.
    pub fn builtin(country: Country) -> Self {
        match country {
            Country::Fr => builtin_fr(),
            Country::Be => builtin_be(),
        }
    }
}

impl BlockedWordsDocument {
    /// The Belgian keyword set shares the French core; only the prefix
    /// rules differ materially between the two countries.
    pub fn builtin(_country: Country) -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            "urgency".to_string(),
            words(&[
                "urgent",
                "immediat",
                "expire aujourd'hui",
                "derniere chance",
                "dans 24h",
                "action requise",
            ]),
        );
        categories.insert(
            "banking".to_string(),
            words(&[
                "compte bloque",
                "carte bancaire",
                "code secret",
                "verifier votre compte",
                "virement",
                "iban",
            ]),
        );
        categories.insert(
            "phishing".to_string(),
            words(&["cliqu", "lien securise", "http", "www", "confirmer vos donnees", "identifiant"]),
        );
        categories.insert(
            "technical".to_string(),
            words(&["virus", "pirate", "mise a jour", "antivirus", "compte compromis"]),
        );
        categories.insert(
            "gains".to_string(),
            words(&[
                "felicitations",
                "gagne",
                "remporte",
                "prix",
                "cadeau",
                "heritage",
                "million",
                "euro",
                "loterie",
            ]),
        );
        categories.insert(
            "delivery".to_string(),
            words(&["colis", "livraison", "douane", "point relais", "reprogrammer"]),
        );
        categories.insert("call".to_string(), words(&["rappeler", "rappelez", "numero surtaxe"]));
        categories.insert(
            "government".to_string(),
            words(&["impots", "amende", "caf", "secu", "remboursement fiscal", "antai"]),
        );
        BlockedWordsDocument {
            blocked_words: BlockedWords { categories },
        }
    }
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn category(description: &str, prefixes: &[&str]) -> PrefixCategory {
    PrefixCategory {
        description: description.to_string(),
        prefixes: words(prefixes),
        block_by_default: true,
        never_block: None,
    }
}

fn builtin_fr() -> RuleConfig {
    let mut categories = BTreeMap::new();
    categories.insert(
        "SURTAXES_CRITIQUES".to_string(),
        category(
            "Surtaxé critique",
            &["0890", "0891", "0892", "0893", "0894", "0895", "0896", "0897", "0898", "0899"],
        ),
    );
    categories.insert(
        "SURTAXES_ELEVES".to_string(),
        category(
            "Surtaxé élevé",
            &[
                "0810", "0811", "0812", "0813", "0814", "0815", "0816", "0817", "0818", "0819",
                "0820", "0821", "0822", "0823", "0825", "0826", "0827",
            ],
        ),
    );
    categories.insert(
        "ANCIEN_SURTAXE".to_string(),
        category("Ancien surtaxé", &["0803", "0804", "0805", "0806", "0807", "0808", "0809"]),
    );
    categories.insert(
        "ARCEP_DEMARCHAGE".to_string(),
        category(
            "Démarchage ARCEP",
            &[
                "0162", "0163", "0270", "0271", "0377", "0378", "0424", "0425", "0568", "0569",
                "0948", "0949",
            ],
        ),
    );
    categories.insert(
        "ARCEP_09".to_string(),
        category("Démarchage ARCEP 09", &["09475", "09476", "09477", "09478", "09479"]),
    );

    RuleConfig {
        version: "3.0".to_string(),
        country: "FR".to_string(),
        last_updated: "2026-01-15".to_string(),
        description: "Règles de blocage France".to_string(),
        prefix_rules: PrefixRules {
            never_block: PrefixList {
                prefixes: words(&[
                    "15", "17", "18", "112", "114", "115", "116000", "119", "191", "196", "197",
                    "3900", "3901", "3939", "3949", "3975",
                ]),
            },
            always_block: AlwaysBlock {
                categories,
                prefixes: Vec::new(),
            },
        },
        trusted_prefixes: TrustedPrefixes {
            description: "Numéros verts légitimes".to_string(),
            prefixes: words(&["0800", "0801", "0802"]),
        },
        known_spam_numbers: KnownSpamNumbers {
            entries: vec![
                KnownSpamEntry {
                    number: "0162380000".to_string(),
                    category: "Démarchage énergie".to_string(),
                    severity: Severity::High,
                },
                KnownSpamEntry {
                    number: "0948000000".to_string(),
                    category: "Faux support technique".to_string(),
                    severity: Severity::Critical,
                },
            ],
        },
        whitelist_exceptions: WhitelistExceptions {
            trusted_organizations: vec![
                TrustedOrganization {
                    name: "Assurance Maladie".to_string(),
                    specific_numbers: words(&["3646"]),
                },
                TrustedOrganization {
                    name: "Impôts".to_string(),
                    specific_numbers: words(&["0809401401"]),
                },
            ],
        },
        nouveautes_2026: None,
        detection_algorithms: builtin_detection(),
    }
}

fn builtin_be() -> RuleConfig {
    RuleConfig {
        version: "3.0".to_string(),
        country: "BE".to_string(),
        last_updated: "2026-01-15".to_string(),
        description: "Règles de blocage Belgique".to_string(),
        prefix_rules: PrefixRules {
            never_block: PrefixList {
                prefixes: words(&["100", "101", "112", "1712", "1722"]),
            },
            always_block: AlwaysBlock {
                categories: BTreeMap::new(),
                prefixes: words(&[
                    "070", "0900", "0901", "0902", "0903", "0904", "0905", "0906", "0907", "0909",
                ]),
            },
        },
        trusted_prefixes: TrustedPrefixes {
            description: "Numéros verts légitimes".to_string(),
            prefixes: words(&["0800"]),
        },
        known_spam_numbers: KnownSpamNumbers::default(),
        whitelist_exceptions: WhitelistExceptions::default(),
        nouveautes_2026: Some(CountryPatterns {
            visual_spoofing: PatternSection {
                patterns: vec![NumberPattern {
                    // 002 prepended to a Brussels-looking number to imitate 02.
                    pattern: "002#######".to_string(),
                    imitates: Some("02 (Bruxelles)".to_string()),
                }],
            },
            harassment_series: PatternSection {
                patterns: vec![NumberPattern {
                    pattern: "046600####".to_string(),
                    imitates: None,
                }],
            },
        }),
        detection_algorithms: builtin_detection(),
    }
}

fn builtin_detection() -> DetectionAlgorithms {
    DetectionAlgorithms {
        patterns: RiskPatterns {
            high_risk: words(&[
                r"https?://[^\s]+\.(?:tk|ml|ga|cf)",
                r"compte.{0,20}(?:bloque|suspendu)",
                r"code.{0,10}(?:secret|pin|confidentiel)",
            ]),
            medium_risk: words(&[
                r"(?:code|promo|reduction)[\s:]*[a-z0-9]{4,}",
                r"[0-9]{2,}\s*(?:euros?|€)(?:\s+gratuits?)?",
            ]),
        },
        weighted_words: WeightedWords {
            high_risk: WordList {
                words: words(&["compte bloque", "carte bancaire", "code secret", "gagne"]),
            },
            medium_risk: WordList {
                words: words(&[
                    "remboursement",
                    "credit rapide",
                    "offre limitee",
                    "investissement",
                    "bitcoin",
                ]),
            },
        },
        whitelist: ScoringWhitelist {
            trusted_senders: words(&["ameli", "impots.gouv", "doctolib", "sncf connect"]),
            trusted_numbers: words(&["36646", "38900"]),
        },
        suspicious_characteristics: SuspiciousCharacteristics {
            suspicious_numbers: PatternList {
                patterns: words(&[r"^08[0-9]{8}$", r"^09[0-9]{8}$", r"^3[0-9]{4}$"]),
            },
            suspicious_domains: PatternList {
                patterns: words(&[r"bit\.ly", r"tinyurl", r"[a-z0-9-]+\.(?:tk|ml|ga|cf|xyz)"]),
            },
            courier_scam_patterns: PatternList {
                patterns: words(&[
                    r"colis.{0,30}(?:bloque|attente|suspendu)",
                    r"frais de (?:douane|livraison)",
                    r"(?:chronopost|colissimo|dhl|ups)\b.{0,40}(?:http|lien|cliqu)",
                ]),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_document_parses() {
        let json = r#"{
            "version": "3.0",
            "country": "FR",
            "prefix_rules": {
                "never_block": {"prefixes": ["15", "112"]},
                "always_block": {
                    "categories": {
                        "SURTAXES_CRITIQUES": {
                            "description": "Surtaxé critique",
                            "prefixes": ["0890", "0891"],
                            "block_by_default": true
                        }
                    }
                }
            },
            "known_spam_numbers": {
                "entries": [{"number": "0890123456", "category": "Arnaque", "severity": "critical"}]
            },
            "whitelist_exceptions": {
                "trusted_organizations": [{"name": "CAF", "specific_numbers": ["3230"]}]
            }
        }"#;
        let doc: RuleDocument = serde_json::from_str(json).unwrap();
        let config = doc.into_config(Country::Fr);
        assert_eq!(config.version, "3.0");
        assert_eq!(config.prefix_rules.never_block.prefixes.len(), 2);
        let cat = &config.prefix_rules.always_block.categories["SURTAXES_CRITIQUES"];
        assert!(cat.block_by_default);
        assert_eq!(config.known_spam_numbers.entries[0].severity, Severity::Critical);
    }

    #[test]
    fn legacy_array_becomes_single_category() {
        let json = r#"["0890", "0891", "0892"]"#;
        let doc: RuleDocument = serde_json::from_str(json).unwrap();
        let config = doc.into_config(Country::Fr);
        assert_eq!(config.version, "1.0-legacy");
        let cat = &config.prefix_rules.always_block.categories["legacy"];
        assert!(cat.block_by_default);
        assert_eq!(cat.prefixes, vec!["0890", "0891", "0892"]);
    }

    #[test]
    fn severity_rejects_unknown_values() {
        assert!(serde_json::from_str::<Severity>("\"extreme\"").is_err());
        assert_eq!(serde_json::from_str::<Severity>("\"low\"").unwrap(), Severity::Low);
    }

    #[test]
    fn builtin_fr_has_emergency_and_premium_rules() {
        let config = RuleConfig::builtin(Country::Fr);
        assert!(config.prefix_rules.never_block.prefixes.contains(&"112".to_string()));
        assert!(config.prefix_rules.always_block.categories.contains_key("SURTAXES_CRITIQUES"));
    }

    #[test]
    fn blocked_words_document_parses() {
        let json = r#"{
            "blocked_words": {
                "categories": {
                    "urgency": ["urgent", "immediat"],
                    "gains": ["gagne", "euro"]
                }
            }
        }"#;
        let doc: BlockedWordsDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.blocked_words.categories["urgency"].len(), 2);
    }
}
