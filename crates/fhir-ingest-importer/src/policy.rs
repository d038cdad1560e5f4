use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a failing file does to the rest of the run.
///
/// Either way, nothing from the failing file is committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortPolicy {
    /// Stop at the first error, close the store and report the error.
    #[default]
    #[serde(alias = "whole_run")]
    WholeRun,
    /// Record the failure and continue with the next file.
    #[serde(alias = "per_file")]
    PerFile,
}

impl AbortPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WholeRun => "whole-run",
            Self::PerFile => "per-file",
        }
    }
}

impl fmt::Display for AbortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown abort policy '{0}' (expected whole-run or per-file)")]
pub struct ParsePolicyError(String);

impl FromStr for AbortPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "whole-run" => Ok(Self::WholeRun),
            "per-file" => Ok(Self::PerFile),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}
