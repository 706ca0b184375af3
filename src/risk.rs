//! Risk classification.
//!
//! The level is a monotone step function of two counts: identical files and
//! high-confidence matches. The cutoffs are configuration. The named presets
//! reproduce the cutoffs used by earlier detector variants; none of them is
//! authoritative.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cutoffs T1..T4. Every comparison is strict (`>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskThresholds {
    /// T1: identical files above this are CRITICAL.
    pub critical_identical: usize,
    /// T2: high-confidence matches above this are CRITICAL.
    pub critical_high_confidence: usize,
    /// T3: high-confidence matches above this are HIGH.
    pub high_high_confidence: usize,
    /// T4: high-confidence matches above this are MEDIUM.
    pub medium_high_confidence: usize,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskPreset::Enhanced.thresholds()
    }
}

impl RiskThresholds {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.high_high_confidence > self.critical_high_confidence {
            return Err(ConfigError::RiskOrder(format!(
                "high_high_confidence ({}) > critical_high_confidence ({})",
                self.high_high_confidence, self.critical_high_confidence
            )));
        }
        if self.medium_high_confidence > self.high_high_confidence {
            return Err(ConfigError::RiskOrder(format!(
                "medium_high_confidence ({}) > high_high_confidence ({})",
                self.medium_high_confidence, self.high_high_confidence
            )));
        }
        Ok(())
    }

    pub fn classify(&self, identical_count: usize, high_confidence_count: usize) -> RiskLevel {
        if identical_count > self.critical_identical
            || high_confidence_count > self.critical_high_confidence
        {
            RiskLevel::Critical
        } else if identical_count > 0 || high_confidence_count > self.high_high_confidence {
            RiskLevel::High
        } else if high_confidence_count > self.medium_high_confidence {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskPreset {
    /// Local + remote comparison detector: 3 / 10 / 5 / 2.
    Enhanced,
    /// GitHub-wide search detector: 5 / 15 / 8 / 3.
    GithubWide,
    /// Lightweight search variant: any identical file is critical.
    Simple,
}

impl RiskPreset {
    pub fn thresholds(&self) -> RiskThresholds {
        match self {
            RiskPreset::Enhanced => RiskThresholds {
                critical_identical: 3,
                critical_high_confidence: 10,
                high_high_confidence: 5,
                medium_high_confidence: 2,
            },
            RiskPreset::GithubWide => RiskThresholds {
                critical_identical: 5,
                critical_high_confidence: 15,
                high_high_confidence: 8,
                medium_high_confidence: 3,
            },
            RiskPreset::Simple => RiskThresholds {
                critical_identical: 0,
                critical_high_confidence: usize::MAX,
                high_high_confidence: 5,
                medium_high_confidence: 2,
            },
        }
    }
}

impl FromStr for RiskPreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enhanced" => Ok(RiskPreset::Enhanced),
            "github_wide" => Ok(RiskPreset::GithubWide),
            "simple" => Ok(RiskPreset::Simple),
            _ => Err(()),
        }
    }
}
