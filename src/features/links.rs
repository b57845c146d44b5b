use super::rules::{self, RuleSet};
use super::{Dimension, DimensionScore, SignalExtractor};
use crate::domain_utils::DomainUtils;
use crate::message::NormalizedMessage;
use std::collections::BTreeSet;
use url::Url;

#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub url: String,
    pub host: Option<String>,
    pub domain: String,
    pub is_suspicious: bool,
}

/// Scores the URLs embedded in the message body.
pub struct LinkAnalyzer;

impl LinkAnalyzer {
    /// Deduplicated, sorted URLs found in `text`.
    pub fn extract_urls(text: &str, rules: &RuleSet) -> BTreeSet<String> {
        rules
            .url_pattern
            .find_iter(text)
            .map(|m| {
                m.as_str()
                    .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\''])
                    .to_string()
            })
            .collect()
    }

    pub fn analyze_link(url: &str, rules: &RuleSet) -> ExtractedLink {
        let host = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(|h| h.to_lowercase()));
        let domain = host
            .as_deref()
            .and_then(DomainUtils::registrable_domain)
            .unwrap_or_default();

        ExtractedLink {
            url: url.to_string(),
            is_suspicious: Self::is_link_suspicious(url, host.as_deref(), rules),
            host,
            domain,
        }
    }

    fn is_link_suspicious(url: &str, host: Option<&str>, rules: &RuleSet) -> bool {
        if let Some(host) = host {
            if DomainUtils::matches_domain_list(host, rules::URL_SHORTENERS) {
                return true;
            }
            if DomainUtils::is_ipv4(host) {
                return true;
            }
        }

        // Anything before an '@' is discarded by the browser.
        url.contains('@')
            || rules.script_endpoint.is_match(url)
            || url.chars().count() > rules::MAX_URL_LENGTH
    }
}

impl SignalExtractor for LinkAnalyzer {
    fn extract(&self, message: &NormalizedMessage, rules: &RuleSet) -> DimensionScore {
        let mut score = DimensionScore::new(self.dimension());
        let urls = Self::extract_urls(&message.body, rules);

        let mut suspicious = 0;
        for url in &urls {
            let link = Self::analyze_link(url, rules);
            if link.is_suspicious {
                suspicious += 1;
            }

            if link.domain.is_empty() || rules.is_trusted(&link.domain) {
                continue;
            }
            if let Some(rule) = rules
                .lookalike_brands
                .iter()
                .find(|rule| rule.regex.is_match(&link.domain))
            {
                score.push(rule.points, rule.render(&link.domain));
            }
        }

        if suspicious >= rules::SUSPICIOUS_URLS.min_hits {
            score.push(
                rules::SUSPICIOUS_URLS.points,
                rules::render(rules::SUSPICIOUS_URLS.reason, &suspicious.to_string()),
            );
        }

        score.urls = urls;
        score
    }

    fn dimension(&self) -> Dimension {
        Dimension::Urls
    }
}
