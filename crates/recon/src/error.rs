use std::fmt;

use crate::model::Tender;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold, no tenders, etc.).
    ConfigValidation(String),
    /// A `[tenders]` key is not a known tender label.
    UnknownTender(String),
    /// IO error (file read, output write).
    Io(String),
    /// A required column could not be resolved in a tender file.
    MissingColumn { tender: Tender, role: &'static str },
    /// Tender file could not be parsed as a delimited table.
    Malformed { tender: Tender, detail: String },
    /// Tender file had no usable rows after cleaning.
    NoData { tender: Tender },
    /// Every configured tender was skipped; nothing to reconcile.
    NoUsableData,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownTender(label) => write!(f, "unknown tender: '{label}'"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::MissingColumn { tender, role } => {
                write!(f, "tender '{tender}': missing required column '{role}'")
            }
            Self::Malformed { tender, detail } => {
                write!(f, "tender '{tender}': malformed input: {detail}")
            }
            Self::NoData { tender } => {
                write!(f, "tender '{tender}': no usable rows after cleaning")
            }
            Self::NoUsableData => write!(f, "no tender yielded usable data"),
        }
    }
}

impl std::error::Error for ReconError {}
