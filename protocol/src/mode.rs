//! # Session Mode Selection
//!
//! A session runs either against the real decryption service only
//! ([`Mode::Production`]) or with the simulated fallback enabled
//! ([`Mode::Demonstration`]). The mode is decided once, before any workflow
//! action, and then carried explicitly through every mode-sensitive call.
//!
//! ## Priority
//!
//! ```text
//! per-request override  >  persisted preference  >  build-time default  >  Production
//! ```
//!
//! The first signal that is present wins, whatever its value. An explicit
//! `false` override therefore forces production even when the stored
//! preference says otherwise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a session treats slow or failing decryptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Real decryption raced against a deadline, with a locally simulated
    /// result when the service is slow or unreachable.
    Demonstration,
    /// Real decryption only. Plaintext never leaves the encryption boundary.
    Production,
}

impl Mode {
    pub fn is_demonstration(self) -> bool {
        matches!(self, Mode::Demonstration)
    }

    fn from_flag(flag: bool) -> Self {
        if flag {
            Mode::Demonstration
        } else {
            Mode::Production
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Demonstration => write!(f, "demonstration"),
            Mode::Production => write!(f, "production"),
        }
    }
}

/// Parse a textual on/off flag.
///
/// Accepts `true/false`, `1/0`, `yes/no`, `on/off` in any case, with
/// surrounding whitespace. Anything else is treated as "no signal".
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Build-time default, honored only in debug builds.
///
/// Release binaries never start in demonstration mode unless a request or
/// the stored preference asks for it.
pub fn build_time_default() -> Option<bool> {
    if cfg!(debug_assertions) {
        option_env!("HUSHHIRE_DEMO_MODE").and_then(parse_flag)
    } else {
        None
    }
}

/// The raw signals a mode decision is made from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeSelector {
    request_override: Option<bool>,
    persisted_preference: Option<bool>,
    build_default: Option<bool>,
}

impl ModeSelector {
    /// A selector with no signals. Evaluates to production.
    pub fn new() -> Self {
        Self::default()
    }

    /// A selector seeded with the build-time default.
    pub fn with_build_default() -> Self {
        Self {
            build_default: build_time_default(),
            ..Self::default()
        }
    }

    /// Explicit per-request override (e.g. a `--demo` flag or `?demo=` query).
    pub fn request_override(mut self, raw: Option<&str>) -> Self {
        self.request_override = raw.and_then(parse_flag);
        self
    }

    /// Preference persisted for the session (see [`crate::storage::HushDB`]).
    pub fn persisted_preference(mut self, raw: Option<&str>) -> Self {
        self.persisted_preference = raw.and_then(parse_flag);
        self
    }

    /// Overrides the build-time default. Mostly useful in tests.
    pub fn build_default(mut self, flag: Option<bool>) -> Self {
        self.build_default = flag;
        self
    }

    /// Decide the mode. Pure: the same signals always give the same mode.
    pub fn evaluate(&self) -> Mode {
        self.request_override
            .or(self.persisted_preference)
            .or(self.build_default)
            .map(Mode::from_flag)
            .unwrap_or(Mode::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signals_is_production() {
        assert_eq!(ModeSelector::new().evaluate(), Mode::Production);
    }

    #[test]
    fn test_request_override_wins() {
        let selector = ModeSelector::new()
            .request_override(Some("true"))
            .persisted_preference(Some("false"))
            .build_default(Some(false));
        assert_eq!(selector.evaluate(), Mode::Demonstration);

        // An explicit "off" is still a present signal.
        let selector = ModeSelector::new()
            .request_override(Some("false"))
            .persisted_preference(Some("true"));
        assert_eq!(selector.evaluate(), Mode::Production);
    }

    #[test]
    fn test_persisted_preference_beats_build_default() {
        let selector = ModeSelector::new()
            .persisted_preference(Some("1"))
            .build_default(Some(false));
        assert_eq!(selector.evaluate(), Mode::Demonstration);
    }

    #[test]
    fn test_build_default_used_last() {
        let selector = ModeSelector::new().build_default(Some(true));
        assert_eq!(selector.evaluate(), Mode::Demonstration);
    }

    #[test]
    fn test_garbage_signal_is_absent() {
        let selector = ModeSelector::new()
            .request_override(Some("maybe"))
            .persisted_preference(Some("yes"));
        assert_eq!(selector.evaluate(), Mode::Demonstration);
    }

    #[test]
    fn test_parse_flag_variants() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("on"), Some(true));
        assert_eq!(parse_flag("No"), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Demonstration.to_string(), "demonstration");
        assert_eq!(Mode::Production.to_string(), "production");
        assert!(Mode::Demonstration.is_demonstration());
    }
}
