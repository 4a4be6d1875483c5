pub mod backup;
pub mod call_engine;
pub mod config;
pub mod conversation;
pub mod country;
pub mod error;
pub mod lists;
pub mod number;
pub mod rules;
pub mod scorer;

pub use call_engine::{CallDecisionEngine, Decision, ScreeningPrefs};
pub use country::Country;
pub use error::{Result, ScreenError};
pub use lists::ListStore;
pub use rules::RuleStore;
pub use scorer::{MessageRiskScorer, RiskBand, SuspicionResult};
