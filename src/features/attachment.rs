use super::rules::{self, RuleSet};
use super::{Dimension, DimensionScore, SignalExtractor};
use crate::message::NormalizedMessage;

/// Attachments paired with document or billing language are a classic
/// malware lure. Only evaluated when the message declares attachments.
pub struct AttachmentContextAnalyzer;

impl SignalExtractor for AttachmentContextAnalyzer {
    fn extract(&self, message: &NormalizedMessage, _rules: &RuleSet) -> DimensionScore {
        let mut score = DimensionScore::new(self.dimension());
        if !message.has_attachments {
            return score;
        }

        let text = format!("{} {}", message.subject, message.body);
        if let Some(token) = rules::ATTACHMENT_TOKENS
            .iter()
            .find(|token| text.contains(*token))
        {
            let tier = rules::ATTACHMENT_CONTEXT;
            score.push(tier.points, rules::render(tier.reason, token));
        }

        score
    }

    fn dimension(&self) -> Dimension {
        Dimension::Attachment
    }
}
