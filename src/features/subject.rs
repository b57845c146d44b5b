use super::rules::{self, RuleSet, Tier};
use super::{lexicon_hits, Dimension, DimensionScore, SignalExtractor};
use crate::message::NormalizedMessage;

pub struct SubjectAnalyzer;

impl SubjectAnalyzer {
    /// At least one cased character and no lower-case ones.
    fn is_shouting(raw_subject: &str) -> bool {
        let mut has_cased = false;
        for c in raw_subject.chars() {
            if c.is_lowercase() {
                return false;
            }
            if c.is_uppercase() {
                has_cased = true;
            }
        }
        has_cased
    }
}

pub(crate) fn pick_tier(tiers: &[Tier], hits: usize) -> Option<&Tier> {
    tiers.iter().find(|tier| hits >= tier.min_hits)
}

impl SignalExtractor for SubjectAnalyzer {
    fn extract(&self, message: &NormalizedMessage, _rules: &RuleSet) -> DimensionScore {
        let mut score = DimensionScore::new(self.dimension());
        let subject = &message.subject;

        let found = lexicon_hits(subject);
        if let Some(tier) = pick_tier(rules::SUBJECT_TIERS, found.len()) {
            let named: Vec<&str> = found.iter().take(tier.named).copied().collect();
            score.push(tier.points, rules::render(tier.reason, &named.join(", ")));
        }

        let glyphs = subject
            .chars()
            .filter(|c| rules::URGENCY_GLYPHS.contains(c))
            .count();
        if glyphs >= rules::URGENCY_GLYPH_RULE.min_hits {
            score.push(
                rules::URGENCY_GLYPH_RULE.points,
                rules::URGENCY_GLYPH_RULE.reason,
            );
        }

        let raw = &message.raw_subject;
        if raw.chars().count() >= rules::SHOUTING_MIN_CHARS && Self::is_shouting(raw) {
            score.push(rules::SHOUTING_SUBJECT.points, rules::SHOUTING_SUBJECT.reason);
        }

        score
    }

    fn dimension(&self) -> Dimension {
        Dimension::Subject
    }
}
