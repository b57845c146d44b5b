use crate::features::rules::RuleSet;
use crate::features::{default_extractors, DimensionScore, SignalExtractor};
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const MAX_SCORE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Lower bounds, evaluated highest first.
    const THRESHOLDS: [(u32, RiskLevel); 4] = [
        (70, RiskLevel::Critical),
        (50, RiskLevel::High),
        (30, RiskLevel::Medium),
        (15, RiskLevel::Low),
    ];

    pub fn from_score(score: u32) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(min, _)| score >= *min)
            .map(|(_, level)| *level)
            .unwrap_or(RiskLevel::Safe)
    }

    pub fn is_flagged(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Glyph used in log lines and the stats report.
    pub fn marker(self) -> &'static str {
        match self {
            RiskLevel::Safe => "✅",
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🟠",
            RiskLevel::Critical => "🔴",
        }
    }

    pub fn all() -> [RiskLevel; 5] {
        [
            RiskLevel::Safe,
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ]
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::all()
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown risk level: {s}"))
    }
}

/// Immutable outcome of scoring one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: u32,
    pub risk_level: RiskLevel,
    pub is_flagged: bool,
    pub reasons: Vec<String>,
    pub urls_found: BTreeSet<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl Verdict {
    fn from_dimensions(dimensions: &[DimensionScore], analyzed_at: DateTime<Utc>) -> Self {
        let total: u32 = dimensions.iter().map(DimensionScore::points).sum();
        let score = total.min(MAX_SCORE);
        let risk_level = RiskLevel::from_score(score);

        Verdict {
            score,
            risk_level,
            is_flagged: risk_level.is_flagged(),
            reasons: dimensions
                .iter()
                .flat_map(|d| d.findings.iter().map(|f| f.reason.clone()))
                .collect(),
            urls_found: dimensions
                .iter()
                .flat_map(|d| d.urls.iter().cloned())
                .collect(),
            analyzed_at,
        }
    }
}

/// Runs every extractor over a message and folds the results into a
/// [`Verdict`].
pub struct RiskScorer {
    rules: RuleSet,
    extractors: Vec<Box<dyn SignalExtractor>>,
}

impl RiskScorer {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            extractors: default_extractors(),
        }
    }

    pub fn with_trusted_domains(extra_trusted_domains: &[String]) -> Result<Self, regex::Error> {
        Ok(Self::new(RuleSet::compile(extra_trusted_domains)?))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn analyze(&self, message: &Message) -> Vec<DimensionScore> {
        let normalized = message.normalize();
        self.extractors
            .iter()
            .map(|extractor| extractor.extract(&normalized, &self.rules))
            .collect()
    }

    pub fn score(&self, message: &Message) -> Verdict {
        self.score_at(message, Utc::now())
    }

    /// Deterministic variant of [`RiskScorer::score`]: the caller supplies
    /// the timestamp.
    pub fn score_at(&self, message: &Message, analyzed_at: DateTime<Utc>) -> Verdict {
        let dimensions = self.analyze(message);
        for dimension in &dimensions {
            if !dimension.findings.is_empty() {
                log::debug!(
                    "{} {}: +{} ({} findings)",
                    message.id,
                    dimension.dimension,
                    dimension.points(),
                    dimension.findings.len()
                );
            }
        }
        Verdict::from_dimensions(&dimensions, analyzed_at)
    }
}
