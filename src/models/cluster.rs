use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const SEGMENT_PREFIX: &str = "segment:";

/// Population boundary of one clustering run.
///
/// Cluster ids are only comparable within the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterScope {
    Global,
    Segment(String),
}

impl ClusterScope {
    /// Storage key: `global` or `segment:<label>`.
    pub fn key(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Segment(label) => format!("{SEGMENT_PREFIX}{label}"),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        if key == "global" {
            Some(Self::Global)
        } else {
            key.strip_prefix(SEGMENT_PREFIX)
                .map(|label| Self::Segment(label.to_string()))
        }
    }
}

impl std::fmt::Display for ClusterScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Current cluster label of one subject within one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub document_id: String,
    pub scope: ClusterScope,
    pub cluster_id: u32,
    pub model_version: String,
    pub computed_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_round_trip() {
        for scope in [
            ClusterScope::Global,
            ClusterScope::Segment("Obstetrics / Gynecology".into()),
        ] {
            assert_eq!(ClusterScope::from_key(&scope.key()), Some(scope));
        }
    }

    #[test]
    fn unknown_scope_key() {
        assert_eq!(ClusterScope::from_key("department"), None);
    }
}
