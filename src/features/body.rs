use super::rules::{self, RuleSet};
use super::subject::pick_tier;
use super::{Dimension, DimensionScore, SignalExtractor};
use crate::message::NormalizedMessage;

pub struct BodyAnalyzer;

impl SignalExtractor for BodyAnalyzer {
    fn extract(&self, message: &NormalizedMessage, rules: &RuleSet) -> DimensionScore {
        let mut score = DimensionScore::new(self.dimension());
        let body = &message.body;

        // Occurrences, not distinct words.
        let mut occurrences = 0;
        let mut found_words = Vec::new();
        for word in rules::LEXICON {
            let count = body.matches(word).count();
            if count > 0 {
                occurrences += count;
                found_words.push(*word);
            }
        }

        if let Some(tier) = pick_tier(rules::BODY_TIERS, occurrences) {
            let detail = if tier.named == 0 {
                occurrences.to_string()
            } else {
                found_words
                    .iter()
                    .take(tier.named)
                    .copied()
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            score.push(tier.points, rules::render(tier.reason, &detail));
        }

        if let Some(rule) = rules
            .sensitive_requests
            .iter()
            .find(|rule| rule.regex.is_match(body))
        {
            log::debug!("Body matched sensitive request rule {}", rule.name);
            score.push(rule.points, rule.reason);
        }

        let markers = rules
            .grammar_markers
            .iter()
            .filter(|marker| marker.is_match(body))
            .count();
        if markers >= rules::GRAMMAR_RULE.min_hits {
            score.push(rules::GRAMMAR_RULE.points, rules::GRAMMAR_RULE.reason);
        }

        score
    }

    fn dimension(&self) -> Dimension {
        Dimension::Body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn analyze(body: &str) -> DimensionScore {
        let rules = RuleSet::compile(&[]).unwrap();
        let message = Message::new("t").with_body(body).normalize();
        BodyAnalyzer.extract(&message, &rules)
    }

    #[test]
    fn test_occurrences_are_summed() {
        // "urgent" appears five times: one distinct word, five occurrences.
        let score = analyze("urgent urgent urgent urgent urgent");
        assert_eq!(score.points(), 15);
        assert_eq!(score.findings[0].reason, "Suspicious body: urgent");
    }

    #[test]
    fn test_saturated_body_names_count() {
        let body = "payment ".repeat(10);
        let score = analyze(&body);
        assert_eq!(score.points(), 25);
        assert_eq!(
            score.findings[0].reason,
            "Body is saturated with phishing vocabulary (10x)"
        );
    }

    #[test]
    fn test_sensitive_request_fires_once() {
        let score = analyze("digite sua senha e confirme os dados da conta");
        let sensitive: Vec<_> = score
            .findings
            .iter()
            .filter(|f| f.reason == "Requests sensitive information")
            .collect();
        assert_eq!(sensitive.len(), 1);
        assert_eq!(sensitive[0].points, 20);
    }

    #[test]
    fn test_english_credential_request() {
        let score = analyze("please enter your password below");
        assert!(score
            .findings
            .iter()
            .any(|f| f.reason == "Requests sensitive information"));
    }

    #[test]
    fn test_grammar_markers() {
        let score = analyze("vc precisa ir pra casa");
        assert_eq!(score.points(), 5);
        assert_eq!(score.findings[0].reason, "Possible grammar mistakes");

        // A single marker is not enough.
        assert_eq!(analyze("vc esta bem").points(), 0);
    }

    #[test]
    fn test_empty_body() {
        assert!(analyze("").findings.is_empty());
    }
}
