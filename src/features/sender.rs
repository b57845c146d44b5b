use super::rules::{self, RuleSet};
use super::{Dimension, DimensionScore, SignalExtractor};
use crate::domain_utils::DomainUtils;
use crate::message::NormalizedMessage;

/// Checks the sender address and display name for spoofing and throwaway
/// domains.
pub struct SenderAnalyzer;

impl SenderAnalyzer {
    /// Registrable domain of the sender address; empty when the address has
    /// no domain part.
    fn sender_domain(sender_email: &str) -> String {
        DomainUtils::extract_domain(sender_email)
            .and_then(|host| DomainUtils::registrable_domain(&host))
            .unwrap_or_default()
    }
}

impl SignalExtractor for SenderAnalyzer {
    fn extract(&self, message: &NormalizedMessage, rules: &RuleSet) -> DimensionScore {
        let mut score = DimensionScore::new(self.dimension());

        if message.sender_email.is_empty() {
            score.push(rules::MISSING_SENDER.points, rules::MISSING_SENDER.reason);
            return score;
        }

        let domain = Self::sender_domain(&message.sender_email);
        let trusted = rules.is_trusted(&domain);

        if !domain.is_empty() && !trusted {
            if let Some(rule) = rules
                .sender_blacklist
                .iter()
                .find(|rule| rule.regex.is_match(&domain))
            {
                log::debug!("Sender domain {} matched blacklist rule {}", domain, rule.name);
                score.push(rule.points, rule.render(&domain));
            }
        }

        if !message.sender_name.is_empty() && !trusted {
            let claims_brand = rules::BRAND_TOKENS
                .iter()
                .any(|token| message.sender_name.contains(token));
            if claims_brand {
                let mismatch = format!("'{}' sent from domain '{}'", message.sender_name, domain);
                score.push(
                    rules::BRAND_SPOOFING.points,
                    rules::render(rules::BRAND_SPOOFING.reason, &mismatch),
                );
            }
        }

        if rules.sender_digit_run.regex.is_match(&message.sender_email) {
            score.push(
                rules.sender_digit_run.points,
                rules.sender_digit_run.render(&message.sender_email),
            );
        }

        score
    }

    fn dimension(&self) -> Dimension {
        Dimension::Sender
    }
}
