//! Incoming call screening.
//!
//! The engine walks a fixed ladder of stages and stops at the first
//! decisive one. The ordering is policy, not accident: personal trust
//! signals (contacts, whitelist) always override automated rules, the
//! manual blacklist overrides automatic prefix rules, and automated
//! critical rules override best-effort risk scoring. Every stage is a
//! total function over the canonicalized number; a lookup failure turns
//! into the less disruptive outcome (allow) instead of an error.

use chrono::{DateTime, Datelike, Local, Timelike, Weekday};
use log::{debug, warn};
use std::sync::Arc;

use crate::country::Country;
use crate::lists::{self, ContactsLookup, ListStore};
use crate::number;
use crate::rules::RuleStore;

#[derive(Debug, Clone, Copy)]
pub struct ScreeningPrefs {
    /// Reject calls with no caller id.
    pub block_private_numbers: bool,
    /// Enables the known-spam database, country pattern sets and risk
    /// scoring stages on top of the classic prefix rules.
    pub advanced_mode: bool,
}

impl Default for ScreeningPrefs {
    fn default() -> Self {
        ScreeningPrefs {
            block_private_numbers: false,
            advanced_mode: true,
        }
    }
}

/// Terminal screening decision with the reason surfaced to the user and
/// the evidence behind it (matched prefix, pattern or risk components).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub block: bool,
    pub reason: String,
    pub evidence: Vec<String>,
    /// Set when the risk score lands in the "suspicious but not decisive"
    /// band: the call goes through, the user is asked to judge.
    pub ask_user: bool,
    pub risk_score: u32,
}

impl Decision {
    fn allow(reason: &str) -> Decision {
        Decision {
            block: false,
            reason: reason.to_string(),
            evidence: Vec::new(),
            ask_user: false,
            risk_score: 0,
        }
    }

    fn block(reason: String, evidence: Vec<String>) -> Decision {
        Decision {
            block: true,
            reason,
            evidence,
            ask_user: false,
            risk_score: 0,
        }
    }
}

/// Collaborator recording blocked calls (history, counters,
/// notifications). Failures must not affect the decision.
pub trait BlockLog {
    fn record(&self, number: &str, reason: &str, at: DateTime<Local>);
}

/// Wall-clock seam. The temporal risk heuristic is the only
/// nondeterministic signal in screening, and it lives behind this trait.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Risk-score stage constants.
const SPOOFING_POINTS: u32 = 50;
const HIGH_RISK_HOUR_POINTS: u32 = 15;
const WEEKEND_POINTS: u32 = 10;
const PING_CALL_POINTS: u32 = 40;
const BLOCK_THRESHOLD: u32 = 80;
const ASK_USER_THRESHOLD: u32 = 60;

const PING_PREFIXES_FR: [&str; 3] = ["089", "081", "082"];
const PING_PREFIXES_BE: [&str; 3] = ["070", "090", "002"];

pub struct CallDecisionEngine {
    rules: Arc<RuleStore>,
    clock: Box<dyn Clock>,
}

impl CallDecisionEngine {
    pub fn new(rules: Arc<RuleStore>) -> Self {
        CallDecisionEngine {
            rules,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(rules: Arc<RuleStore>, clock: Box<dyn Clock>) -> Self {
        CallDecisionEngine { rules, clock }
    }

    /// Screens one incoming call. `raw` is the caller id as supplied by
    /// the platform; `is_private` is set when there is none.
    pub fn screen_call(
        &self,
        raw: &str,
        is_private: bool,
        prefs: ScreeningPrefs,
        lists: &ListStore,
        contacts: &dyn ContactsLookup,
        block_log: Option<&dyn BlockLog>,
    ) -> Decision {
        let decision = self.evaluate(raw, is_private, prefs, lists, contacts);
        debug!(
            "screening '{raw}' (private={is_private}): block={} reason='{}'",
            decision.block, decision.reason
        );
        if decision.block {
            if let Some(log) = block_log {
                log.record(raw, &decision.reason, self.clock.now());
            }
        }
        decision
    }

    fn evaluate(
        &self,
        raw: &str,
        is_private: bool,
        prefs: ScreeningPrefs,
        lists: &ListStore,
        contacts: &dyn ContactsLookup,
    ) -> Decision {
        if is_private || raw.trim().is_empty() {
            return if prefs.block_private_numbers {
                Decision::block("Numéro masqué/privé".to_string(), Vec::new())
            } else {
                Decision::allow("Numéro masqué (blocage désactivé)")
            };
        }

        // Explicit international prefixes are trusted; everything else
        // (national and spoofed forms) screens under the device country.
        let country = Country::of_international_prefix(raw).unwrap_or_else(|| lists.country());
        let rules = self.rules.rule_set(country);
        let forms = number::expand_formats(raw);

        // Emergency and other never-block numbers, compared on the
        // literal cleaned form (short codes are never expanded).
        if rules.never_block(&forms) {
            return Decision::allow("Numéro d'urgence");
        }

        // Device contacts. A permission failure must never block a
        // legitimate caller, so the check fails open.
        match lists::is_in_contacts(contacts, raw) {
            Ok(true) => return Decision::allow("Contact"),
            Ok(false) => {}
            Err(e) => {
                warn!("contact check unavailable, allowing by default: {e}");
                return Decision::allow("Vérification contacts impossible");
            }
        }

        if lists.is_whitelisted(raw) {
            return Decision::allow("Liste blanche");
        }

        if rules.is_green_number(&forms) {
            return Decision::allow("Numéro vert légitime");
        }

        if lists.is_blacklisted(raw) {
            return Decision::block("Liste noire manuelle".to_string(), Vec::new());
        }

        let cleaned = number::clean(raw);
        let national = number::national_form(raw, country);
        let international = number::international_form(raw, country);

        if prefs.advanced_mode {
            if rules.is_trusted(&forms) {
                return Decision::allow("Organisation de confiance");
            }
            if let Some(spam) = rules.known_spam(&forms) {
                return Decision::block(
                    format!("Spam connu: {}", spam.category),
                    vec![format!("base: {} ({:?})", spam.number, spam.severity)],
                );
            }
        }

        if let Some(m) = rules.always_block_match(&national, &international) {
            return Decision::block(
                m.reason,
                vec![format!("{}: préfixe {}", m.category, m.matched_prefix)],
            );
        }

        if prefs.advanced_mode {
            if let Some(m) = rules.pattern_match(&[&cleaned, &national, &international]) {
                return Decision::block(
                    m.reason,
                    vec![format!("{}: motif {}", m.category, m.matched_prefix)],
                );
            }

            let (risk, risk_evidence) = self.risk_score(&cleaned, &national, country);
            if risk >= BLOCK_THRESHOLD {
                let mut d = Decision::block("Score de risque élevé".to_string(), risk_evidence);
                d.risk_score = risk;
                return d;
            }
            if risk >= ASK_USER_THRESHOLD {
                let mut d = Decision::allow("Suspect - vérification utilisateur recommandée");
                d.evidence = risk_evidence;
                d.ask_user = true;
                d.risk_score = risk;
                return d;
            }
            let mut d = Decision::allow("Aucune règle de blocage");
            d.risk_score = risk;
            return d;
        }

        Decision::allow("Aucune règle de blocage")
    }

    /// Heuristic risk score for numbers no hard rule matched. The only
    /// place screening consults the clock.
    fn risk_score(&self, cleaned: &str, national: &str, country: Country) -> (u32, Vec<String>) {
        let mut score = 0;
        let mut evidence = Vec::new();

        // Belgian spoofing: 002 prepended to fake a Brussels caller.
        if country == Country::Be && cleaned.starts_with("002") {
            score += SPOOFING_POINTS;
            evidence.push(format!("Usurpation 002 (+{SPOOFING_POINTS})"));
        }

        let now = self.clock.now();
        let hour = now.hour();
        if !(8..20).contains(&hour) {
            score += HIGH_RISK_HOUR_POINTS;
            evidence.push(format!("Heure à risque (+{HIGH_RISK_HOUR_POINTS})"));
        }
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            score += WEEKEND_POINTS;
            evidence.push(format!("Week-end (+{WEEKEND_POINTS})"));
        }

        let ping_prefixes = match country {
            Country::Fr => &PING_PREFIXES_FR,
            Country::Be => &PING_PREFIXES_BE,
        };
        if ping_prefixes.iter().any(|p| national.starts_with(p) || cleaned.starts_with(p)) {
            score += PING_CALL_POINTS;
            evidence.push(format!("Préfixe ping call (+{PING_CALL_POINTS})"));
        }

        (score, evidence)
    }
}
