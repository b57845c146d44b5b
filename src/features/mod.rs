pub mod attachment;
pub mod body;
pub mod links;
pub mod rules;
pub mod sender;
pub mod subject;

use crate::message::NormalizedMessage;
use rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the independent scoring axes, in aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Sender,
    Subject,
    Body,
    Urls,
    Attachment,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Sender => "sender",
            Dimension::Subject => "subject",
            Dimension::Body => "body",
            Dimension::Urls => "urls",
            Dimension::Attachment => "attachment",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalFinding {
    pub points: u32,
    pub reason: String,
}

impl SignalFinding {
    pub fn new(points: u32, reason: impl Into<String>) -> Self {
        Self {
            points,
            reason: reason.into(),
        }
    }
}

/// Everything one extractor produced for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub findings: Vec<SignalFinding>,
    /// Only populated by the URL dimension.
    pub urls: BTreeSet<String>,
}

impl DimensionScore {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            findings: Vec::new(),
            urls: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, points: u32, reason: impl Into<String>) {
        self.findings.push(SignalFinding::new(points, reason));
    }

    pub fn points(&self) -> u32 {
        self.findings.iter().map(|f| f.points).sum()
    }
}

/// A pure, side-effect free scoring axis.
pub trait SignalExtractor: Send + Sync {
    fn extract(&self, message: &NormalizedMessage, rules: &RuleSet) -> DimensionScore;
    fn dimension(&self) -> Dimension;
}

/// The five extractors in the order their reasons are reported.
pub fn default_extractors() -> Vec<Box<dyn SignalExtractor>> {
    vec![
        Box::new(sender::SenderAnalyzer),
        Box::new(subject::SubjectAnalyzer),
        Box::new(body::BodyAnalyzer),
        Box::new(links::LinkAnalyzer),
        Box::new(attachment::AttachmentContextAnalyzer),
    ]
}

/// Lexicon words found in `text`, in lexicon order.
pub(crate) fn lexicon_hits(text: &str) -> Vec<&'static str> {
    rules::LEXICON
        .iter()
        .copied()
        .filter(|word| text.contains(word))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_extractors_are_in_dimension_order() {
        let dimensions: Vec<Dimension> = default_extractors()
            .iter()
            .map(|e| e.dimension())
            .collect();
        assert_eq!(
            dimensions,
            vec![
                Dimension::Sender,
                Dimension::Subject,
                Dimension::Body,
                Dimension::Urls,
                Dimension::Attachment
            ]
        );
    }

    #[test]
    fn test_dimension_score_sums_points() {
        let mut score = DimensionScore::new(Dimension::Body);
        score.push(15, "a");
        score.push(20, "b");
        assert_eq!(score.points(), 35);
    }

    #[test]
    fn test_lexicon_hits_preserve_order() {
        let hits = lexicon_hits("please confirm your password urgently");
        assert_eq!(hits, vec!["urgent", "password", "confirm"]);
    }
}
