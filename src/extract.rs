use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Category of a structured value pulled out of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Email,
    Phone,
    Cpf,
    Cnpj,
    Amount,
    Date,
    Url,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Email => "email",
            DataKind::Phone => "phone",
            DataKind::Cpf => "cpf",
            DataKind::Cnpj => "cnpj",
            DataKind::Amount => "amount",
            DataKind::Date => "date",
            DataKind::Url => "url",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PATTERNS
            .iter()
            .map(|(kind, _)| *kind)
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown data kind: {s}"))
    }
}

const PATTERNS: &[(DataKind, &str)] = &[
    (DataKind::Email, r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
    (
        DataKind::Phone,
        r"(?:\+55\s?)?(?:\(?\d{2}\)?\s?)?(?:9\s?)?\d{4}[-\s]?\d{4}",
    ),
    (DataKind::Cpf, r"\d{3}\.?\d{3}\.?\d{3}[-.]?\d{2}"),
    (DataKind::Cnpj, r"\d{2}\.?\d{3}\.?\d{3}/?\d{4}[-.]?\d{2}"),
    (DataKind::Amount, r"(?:R\$|US\$|€|£|\$)\s*\d[\d.,]*"),
    (DataKind::Date, r"\b(?:\d{2}/\d{2}/\d{4}|\d{4}-\d{2}-\d{2})\b"),
    (DataKind::Url, r#"https?://[^\s<>"{}|\\^`\[\]]+"#),
];

/// Pattern-based extraction of emails, phones, tax ids, amounts, dates and
/// URLs from free text.
pub struct DataExtractor {
    patterns: Vec<(DataKind, Regex)>,
}

impl DataExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = PATTERNS
            .iter()
            .map(|(kind, pattern)| Regex::new(&format!("(?i){pattern}")).map(|re| (*kind, re)))
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { patterns })
    }

    /// Every category with at least one match, values deduplicated.
    pub fn extract_all(&self, text: &str) -> BTreeMap<DataKind, BTreeSet<String>> {
        let mut results = BTreeMap::new();
        if text.trim().is_empty() {
            return results;
        }

        for (kind, regex) in &self.patterns {
            let values: BTreeSet<String> = regex
                .find_iter(text)
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if !values.is_empty() {
                results.insert(*kind, values);
            }
        }

        results
    }

    pub fn extract(&self, kind: DataKind, text: &str) -> BTreeSet<String> {
        self.patterns
            .iter()
            .filter(|(k, _)| *k == kind)
            .flat_map(|(_, regex)| regex.find_iter(text))
            .map(|m| m.as_str().trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> DataExtractor {
        DataExtractor::new().unwrap()
    }

    #[test]
    fn test_extract_all_categories() {
        let text = "Contato: financeiro@empresa.com.br, (11) 98765-4321. \
                    CPF 123.456.789-09, CNPJ 12.345.678/0001-95. \
                    Valor R$ 1.234,56 vence em 20/11/2026. Pague em https://pagar.example/boleto";
        let results = extractor().extract_all(text);

        assert!(results[&DataKind::Email].contains("financeiro@empresa.com.br"));
        assert!(results[&DataKind::Cpf].contains("123.456.789-09"));
        assert!(results[&DataKind::Cnpj].contains("12.345.678/0001-95"));
        assert!(results[&DataKind::Amount].contains("R$ 1.234,56"));
        assert!(results[&DataKind::Date].contains("20/11/2026"));
        assert!(results[&DataKind::Url].contains("https://pagar.example/boleto"));
        assert!(results.contains_key(&DataKind::Phone));
    }

    #[test]
    fn test_values_are_deduplicated() {
        let found = extractor().extract(DataKind::Email, "a@b.com and a@b.com and c@d.org");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_empty_text() {
        assert!(extractor().extract_all("   ").is_empty());
    }

    #[test]
    fn test_kind_names_round_trip() {
        for (kind, _) in PATTERNS {
            assert_eq!(kind.as_str().parse::<DataKind>(), Ok(*kind));
        }
    }
}
