use std::fmt;

use crate::config::MaxRowsConfig;

/// Row and byte ceilings for a single client-visible reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_rows: u64,
    pub max_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&MaxRowsConfig::default())
    }
}

impl From<&MaxRowsConfig> for Limits {
    fn from(config: &MaxRowsConfig) -> Self {
        Self {
            max_rows: config.max_resultset_rows,
            max_bytes: config.max_resultset_size,
        }
    }
}

/// Which ceiling was crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitExceeded {
    Rows { seen: u64, max: u64 },
    Bytes { seen: u64, max: u64 },
}

impl LimitExceeded {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            LimitExceeded::Rows { .. } => "rows",
            LimitExceeded::Bytes { .. } => "bytes",
        }
    }
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitExceeded::Rows { seen, max } => {
                write!(f, "{} rows exceed max_resultset_rows {}", seen, max)
            }
            LimitExceeded::Bytes { seen, max } => {
                write!(f, "{} bytes exceed max_resultset_size {}", seen, max)
            }
        }
    }
}

impl Limits {
    pub fn check_rows(&self, rows: u64) -> Option<LimitExceeded> {
        (rows > self.max_rows).then_some(LimitExceeded::Rows {
            seen: rows,
            max: self.max_rows,
        })
    }

    pub fn check_bytes(&self, bytes: usize) -> Option<LimitExceeded> {
        let bytes = bytes as u64;
        (bytes > self.max_bytes).then_some(LimitExceeded::Bytes {
            seen: bytes,
            max: self.max_bytes,
        })
    }
}
