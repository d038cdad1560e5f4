use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Resource types the importer knows how to route.
///
/// Anything else found in a bundle is kept as `Other` so it can be
/// reported and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    Encounter,
    Observation,
    Condition,
    Bundle,
    #[serde(untagged)]
    Other(String),
}

impl ResourceKind {
    /// Returns `true` for kinds that need an active patient to be imported
    pub fn depends_on_patient(&self) -> bool {
        matches!(self, Self::Encounter | Self::Observation | Self::Condition)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Patient => "Patient",
            Self::Encounter => "Encounter",
            Self::Observation => "Observation",
            Self::Condition => "Condition",
            Self::Bundle => "Bundle",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Patient" => Self::Patient,
            "Encounter" => Self::Encounter,
            "Observation" => Self::Observation,
            "Condition" => Self::Condition,
            "Bundle" => Self::Bundle,
            other => Self::Other(other.to_string()),
        })
    }
}
