use super::limits::Limits;
use crate::config::MaxRowsConfig;

/// Diagnostic bitmask values
pub mod debug {
    pub const NONE: u32 = 0;
    /// Log when a resultset starts being discarded
    pub const DISCARDING: u32 = 1;
    /// Log every pass/discard decision
    pub const DECISIONS: u32 = 2;
    pub const ALL: u32 = DISCARDING | DECISIONS;
}

/// Filter configuration shared read-only by every session
#[derive(Debug, Clone)]
pub struct FilterInstance {
    name: String,
    limits: Limits,
    debug: u32,
}

impl FilterInstance {
    pub fn new(name: impl Into<String>, limits: Limits, debug: u32) -> Self {
        Self {
            name: name.into(),
            limits,
            debug,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &MaxRowsConfig) -> Self {
        Self::new(name, Limits::from(config), config.debug)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn logs_discarding(&self) -> bool {
        self.debug & debug::DISCARDING != 0
    }

    pub fn logs_decisions(&self) -> bool {
        self.debug & debug::DECISIONS != 0
    }
}
