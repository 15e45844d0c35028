use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::Tender;

pub const DEFAULT_NETTING_THRESHOLD: f64 = 5.0;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Magnitude below which a combined entry group counts as noise.
    #[serde(default = "default_netting_threshold")]
    pub netting_threshold: f64,
    #[serde(default)]
    pub approval_filter: ApprovalFilter,
    /// Tender label → input file path, resolved relative to the config file.
    pub tenders: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: ColumnAliases,
}

fn default_netting_threshold() -> f64 {
    DEFAULT_NETTING_THRESHOLD
}

// ---------------------------------------------------------------------------
// Approval filter
// ---------------------------------------------------------------------------

/// Which responses participate in the run. The ingestor's approval-marker
/// filter applies in both modes (matching the upstream system's behavior);
/// the value is carried into the result metadata so report layers can label
/// the run. See DESIGN.md.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalFilter {
    #[default]
    All,
    AutoApprovedOnly,
}

impl fmt::Display for ApprovalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::AutoApprovedOnly => write!(f, "auto_approved_only"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column aliases
// ---------------------------------------------------------------------------

/// Accepted header aliases per column role, matched case-insensitively by
/// substring. The sales-date column is not alias-driven: any header carrying
/// both "sales" and "date" tokens resolves it.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnAliases {
    #[serde(default = "default_store_id_aliases")]
    pub store_id: Vec<String>,
    #[serde(default = "default_response_aliases")]
    pub response: Vec<String>,
    #[serde(default = "default_approval_aliases")]
    pub approval: Vec<String>,
}

fn default_store_id_aliases() -> Vec<String> {
    vec!["store id".into(), "storeid".into(), "store_id".into()]
}

fn default_response_aliases() -> Vec<String> {
    vec![
        "store response entry".into(),
        "store_response_entry".into(),
        "response entry".into(),
    ]
}

fn default_approval_aliases() -> Vec<String> {
    vec![
        "auto approved date".into(),
        "auto_approved_date".into(),
        "autoapproveddate".into(),
    ]
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            store_id: default_store_id_aliases(),
            response: default_response_aliases(),
            approval: default_approval_aliases(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.netting_threshold.is_finite() || self.netting_threshold <= 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "netting_threshold must be a positive number, got {}",
                self.netting_threshold
            )));
        }

        if self.tenders.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one [tenders] entry is required".into(),
            ));
        }

        for label in self.tenders.keys() {
            if Tender::parse_label(label).is_none() {
                return Err(ReconError::UnknownTender(label.clone()));
            }
        }

        for (role, aliases) in [
            ("store_id", &self.columns.store_id),
            ("response", &self.columns.response),
            ("approval", &self.columns.approval),
        ] {
            if aliases.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "[columns] {role} must list at least one alias"
                )));
            }
        }

        Ok(())
    }

    /// Tender → file path, in tender declaration order. Assumes `validate`
    /// has accepted every label.
    pub fn resolved_tenders(&self) -> BTreeMap<Tender, String> {
        self.tenders
            .iter()
            .filter_map(|(label, file)| Tender::parse_label(label).map(|t| (t, file.clone())))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
