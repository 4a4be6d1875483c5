//! SMS conversation aggregation.
//!
//! Groups scored messages into per-sender threads for triage display.
//! Grouping is strictly by the raw sender address: the same correspondent
//! reaching out as `+33612345678` and later as `0612345678` produces two
//! conversations. Canonicalizing here would merge legitimate short-code
//! senders that reuse digits, so the raw key stays.

use std::collections::HashMap;

use crate::scorer::{RiskBand, SuspicionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Received,
    Sent,
}

impl Direction {
    /// Maps the platform message-box type code. Everything that is not
    /// an inbox message (sent, draft, outbox, queued) counts as sent.
    pub fn from_type_code(code: i32) -> Direction {
        if code == 1 {
            Direction::Received
        } else {
            Direction::Sent
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub id: i64,
    /// Raw sender address as delivered by the platform.
    pub address: String,
    pub body: String,
    /// Milliseconds since the epoch, platform convention.
    pub timestamp: i64,
    pub direction: Direction,
    /// Present on received messages once scored; sent messages carry none.
    pub suspicion: Option<SuspicionResult>,
}

impl SmsMessage {
    /// Short body excerpt for list rendering.
    pub fn preview(&self) -> String {
        preview_of(&self.body)
    }
}

const PREVIEW_LEN: usize = 50;

fn preview_of(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= PREVIEW_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(PREVIEW_LEN).collect();
    format!("{}...", cut.trim_end())
}

#[derive(Debug, Clone)]
pub struct SmsConversation {
    pub address: String,
    /// Resolved display name, when the address is a known contact.
    pub contact_name: Option<String>,
    /// Newest first.
    pub messages: Vec<SmsMessage>,
    pub max_suspicion_score: u32,
}

impl SmsConversation {
    pub fn last_message(&self) -> Option<&SmsMessage> {
        self.messages.first()
    }

    fn last_timestamp(&self) -> i64 {
        self.last_message().map(|m| m.timestamp).unwrap_or(0)
    }

    /// Conversation-level risk from the worst message. The thresholds
    /// are intentionally one step stricter than per-message bands: a
    /// single critical message taints the whole thread.
    pub fn risk_level(&self) -> RiskBand {
        match self.max_suspicion_score {
            s if s < 30 => RiskBand::Low,
            s if s < 60 => RiskBand::Medium,
            s if s < 80 => RiskBand::High,
            _ => RiskBand::Critical,
        }
    }

    pub fn display_name(&self) -> &str {
        self.contact_name.as_deref().unwrap_or(&self.address)
    }
}

/// Resolves addresses to contact display names. The platform side
/// implements this; `None` means unknown sender.
pub trait ContactNameResolver {
    fn display_name(&self, address: &str) -> Option<String>;
}

/// No-op resolver for contexts without contact access.
pub struct NoContactNames;

impl ContactNameResolver for NoContactNames {
    fn display_name(&self, _address: &str) -> Option<String> {
        None
    }
}

/// Groups messages into conversations: one per raw address, messages
/// newest-first within each, conversations ordered by their latest
/// message descending.
pub fn aggregate(
    messages: Vec<SmsMessage>,
    names: &dyn ContactNameResolver,
) -> Vec<SmsConversation> {
    let mut by_address: HashMap<String, Vec<SmsMessage>> = HashMap::new();
    for message in messages {
        by_address.entry(message.address.clone()).or_default().push(message);
    }

    let mut conversations: Vec<SmsConversation> = by_address
        .into_iter()
        .map(|(address, mut msgs)| {
            msgs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let max_score = msgs
                .iter()
                .filter_map(|m| m.suspicion.as_ref())
                .map(|s| s.score)
                .max()
                .unwrap_or(0);
            SmsConversation {
                contact_name: names.display_name(&address),
                address,
                messages: msgs,
                max_suspicion_score: max_score,
            }
        })
        .collect();

    conversations.sort_by(|a, b| b.last_timestamp().cmp(&a.last_timestamp()));
    conversations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(id: i64, address: &str, body: &str, ts: i64, score: Option<u32>) -> SmsMessage {
        SmsMessage {
            id,
            address: address.to_string(),
            body: body.to_string(),
            timestamp: ts,
            direction: Direction::Received,
            suspicion: score.map(|s| SuspicionResult {
                score: s,
                band: RiskBand::of_score(s),
                words: Vec::new(),
                patterns: Vec::new(),
                explanation: String::new(),
            }),
        }
    }

    #[test]
    fn groups_by_raw_address() {
        let convs = aggregate(
            vec![
                received(1, "+33612345678", "salut", 100, Some(0)),
                received(2, "+33612345678", "re", 200, Some(0)),
                received(3, "38900", "info", 150, Some(0)),
            ],
            &NoContactNames,
        );
        assert_eq!(convs.len(), 2);
    }

    #[test]
    fn number_format_variants_stay_separate() {
        // Same correspondent under two surface forms: grouping is by the
        // raw address, so they remain two threads.
        let convs = aggregate(
            vec![
                received(1, "+33612345678", "a", 100, Some(0)),
                received(2, "0612345678", "b", 200, Some(0)),
            ],
            &NoContactNames,
        );
        assert_eq!(convs.len(), 2);
    }

    #[test]
    fn messages_newest_first_and_conversations_by_latest() {
        let convs = aggregate(
            vec![
                received(1, "A", "old", 100, Some(0)),
                received(2, "A", "new", 300, Some(0)),
                received(3, "B", "mid", 200, Some(0)),
            ],
            &NoContactNames,
        );
        assert_eq!(convs[0].address, "A");
        assert_eq!(convs[0].messages[0].body, "new");
        assert_eq!(convs[0].messages[1].body, "old");
        assert_eq!(convs[1].address, "B");
    }

    #[test]
    fn max_score_is_worst_message() {
        let convs = aggregate(
            vec![
                received(1, "A", "ok", 100, Some(12)),
                received(2, "A", "scam", 200, Some(85)),
                received(3, "A", "unscored", 300, None),
            ],
            &NoContactNames,
        );
        assert_eq!(convs[0].max_suspicion_score, 85);
        assert_eq!(convs[0].risk_level(), RiskBand::Critical);
    }

    #[test]
    fn conversation_risk_thresholds_are_exclusive() {
        let level = |score| SmsConversation {
            address: "A".to_string(),
            contact_name: None,
            messages: Vec::new(),
            max_suspicion_score: score,
        }
        .risk_level();
        assert_eq!(level(29), RiskBand::Low);
        assert_eq!(level(30), RiskBand::Medium);
        assert_eq!(level(59), RiskBand::Medium);
        assert_eq!(level(60), RiskBand::High);
        assert_eq!(level(79), RiskBand::High);
        assert_eq!(level(80), RiskBand::Critical);
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let short = received(1, "A", "petit message", 1, None);
        assert_eq!(short.preview(), "petit message");

        let long = received(2, "A", &"mot ".repeat(30), 1, None);
        let p = long.preview();
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= PREVIEW_LEN + 3);
    }

    #[test]
    fn contact_names_resolved_per_address() {
        struct OneName;
        impl ContactNameResolver for OneName {
            fn display_name(&self, address: &str) -> Option<String> {
                (address == "+33612345678").then(|| "Mamie".to_string())
            }
        }
        let convs = aggregate(
            vec![
                received(1, "+33612345678", "a", 200, Some(0)),
                received(2, "38900", "b", 100, Some(0)),
            ],
            &OneName,
        );
        assert_eq!(convs[0].display_name(), "Mamie");
        assert_eq!(convs[1].display_name(), "38900");
    }
}
