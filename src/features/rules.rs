//! Declarative rule tables for the signal extractors.
//!
//! Every heuristic is data: a pattern, the points it is worth and the reason
//! template (`{}` is replaced by the offending value). Extractors walk these
//! tables; adding a rule never touches control flow.

use crate::domain_utils::DomainUtils;
use regex::Regex;

/// A scored rule before compilation.
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    pub name: &'static str,
    pub pattern: &'static str,
    pub points: u32,
    pub reason: &'static str,
}

/// A count-based tier: fires when a hit count reaches `min_hits`.
#[derive(Debug, Clone, Copy)]
pub struct Tier {
    pub min_hits: usize,
    pub points: u32,
    /// How many matched words are named in the reason.
    pub named: usize,
    pub reason: &'static str,
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub name: &'static str,
    pub regex: Regex,
    pub points: u32,
    pub reason: &'static str,
}

impl PatternRule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            name: spec.name,
            regex: Regex::new(spec.pattern)?,
            points: spec.points,
            reason: spec.reason,
        })
    }

    pub fn render(&self, value: &str) -> String {
        render(self.reason, value)
    }
}

pub fn render(template: &str, value: &str) -> String {
    template.replacen("{}", value, 1)
}

/// Suspicious vocabulary shared by the subject and body extractors.
pub const LEXICON: &[&str] = &[
    // urgency
    "urgente", "urgent", "imediato", "immediate", "ação requerida",
    "action required", "expire", "expira", "suspens", "bloqueado",
    "blocked", "limited", "limitado", "verify", "verificar",
    "sua conta esta bloqueada",
    // financial
    "senha", "password", "cartão", "card", "banco", "bank",
    "conta", "account", "pix", "transferência", "transfer",
    "pagamento", "payment", "fatura", "invoice", "boleto",
    "prêmio", "prize", "ganhou", "winner", "lottery", "loteria",
    "herança", "inheritance", "milhões", "millions", "voce ganhou", "pague agora",
    // threats
    "encerrar", "cancelar", "cancel", "desativar", "deactivate",
    "unauthorized", "não autorizado", "suspicious activity",
    "atividade suspeita", "security alert", "alerta de segurança",
    // calls to action
    "clique aqui", "click here", "acesse agora", "access now",
    "atualize", "update", "confirme", "confirm", "validate",
    "validar", "reset", "redefinir",
];

pub const TRUSTED_DOMAINS: &[&str] = &[
    "google.com", "gmail.com", "microsoft.com", "outlook.com",
    "apple.com", "amazon.com", "facebook.com", "instagram.com",
    "twitter.com", "linkedin.com", "github.com", "netflix.com",
    "spotify.com", "paypal.com", "mercadolivre.com.br",
    "nubank.com.br", "itau.com.br", "bradesco.com.br",
    "santander.com.br", "bb.com.br", "caixa.gov.br",
];

/// Tokens in a display name that claim a trusted institution.
pub const BRAND_TOKENS: &[&str] = &[
    "banco", "bank", "nubank", "itau", "bradesco", "paypal", "microsoft", "apple", "google",
];

pub const SENDER_BLACKLIST: &[RuleSpec] = &[
    RuleSpec { name: "suspicious_tld", pattern: r"\.(tk|ml|ga|cf|gq)$", points: 25, reason: "Suspicious sender domain: {}" },
    RuleSpec { name: "secure_token", pattern: r"-secure", points: 25, reason: "Suspicious sender domain: {}" },
    RuleSpec { name: "login_token", pattern: r"-login", points: 25, reason: "Suspicious sender domain: {}" },
    RuleSpec { name: "verify_token", pattern: r"-verify", points: 25, reason: "Suspicious sender domain: {}" },
    RuleSpec { name: "update_token", pattern: r"-update", points: 25, reason: "Suspicious sender domain: {}" },
    RuleSpec { name: "account_subdomain_chain", pattern: r"account.*\..*\.", points: 25, reason: "Suspicious sender domain: {}" },
    RuleSpec { name: "digit_run", pattern: r"\d{5,}", points: 25, reason: "Suspicious sender domain: {}" },
];

pub const MISSING_SENDER: RuleSpec = RuleSpec {
    name: "missing_sender",
    pattern: "",
    points: 20,
    reason: "No visible sender address",
};

pub const BRAND_SPOOFING: RuleSpec = RuleSpec {
    name: "brand_spoofing",
    pattern: "",
    points: 30,
    reason: "Possible spoofing: {}",
};

pub const SENDER_DIGIT_RUN: RuleSpec = RuleSpec {
    name: "sender_digit_run",
    pattern: r"\d{5,}",
    points: 10,
    reason: "Sender address contains many digits",
};

/// Distinct lexicon hits in the subject, highest tier first.
pub const SUBJECT_TIERS: &[Tier] = &[
    Tier { min_hits: 3, points: 25, named: 3, reason: "Highly suspicious subject: {}" },
    Tier { min_hits: 1, points: 10, named: 2, reason: "Alert words in subject: {}" },
];

pub const URGENCY_GLYPHS: &[char] = &['!', '?', '🚨', '⚠', '🔴', '❗'];

pub const URGENCY_GLYPH_RULE: Tier = Tier {
    min_hits: 3,
    points: 10,
    named: 0,
    reason: "Excessive urgency characters in subject",
};

/// Subjects shorter than this are never treated as shouting.
pub const SHOUTING_MIN_CHARS: usize = 11;

pub const SHOUTING_SUBJECT: RuleSpec = RuleSpec {
    name: "shouting_subject",
    pattern: "",
    points: 10,
    reason: "Subject is entirely upper-case",
};

/// Summed lexicon occurrences in the body, highest tier first. The top tier
/// names the count, the lower one names words.
pub const BODY_TIERS: &[Tier] = &[
    Tier { min_hits: 10, points: 25, named: 0, reason: "Body is saturated with phishing vocabulary ({}x)" },
    Tier { min_hits: 5, points: 15, named: 3, reason: "Suspicious body: {}" },
];

pub const SENSITIVE_REQUESTS: &[RuleSpec] = &[
    RuleSpec { name: "asks_for_credentials_pt", pattern: r"(digite|informe|envie).*(senha|password|cpf|cartão|card)", points: 20, reason: "Requests sensitive information" },
    RuleSpec { name: "asks_for_credentials_en", pattern: r"(enter|type|send|provide).*(password|card number|social security|ssn)", points: 20, reason: "Requests sensitive information" },
    RuleSpec { name: "asks_to_confirm_account", pattern: r"(confirm|verificar).*(dados|account|conta)", points: 20, reason: "Requests sensitive information" },
    RuleSpec { name: "asks_to_click_and_verify", pattern: r"(clique|click).*(link|botão|button).*(verificar|confirm)", points: 20, reason: "Requests sensitive information" },
];

pub const GRAMMAR_MARKERS: &[(&str, &str)] = &[
    ("voce_without_accent", r"voce\s"),
    ("vc_abbreviation", r"\bvc\b"),
    ("pra_contraction", r"pra\s"),
    ("ta_contraction", r"tá\s"),
    ("agente_for_a_gente", r"agente\s(?:$|[^d]|d$|d[^e])"),
];

pub const GRAMMAR_RULE: Tier = Tier {
    min_hits: 2,
    points: 5,
    named: 0,
    reason: "Possible grammar mistakes",
};

pub const URL_PATTERN: &str = r#"https?://[^\s<>"{}|\\^`\[\]]+"#;

pub const URL_SHORTENERS: &[&str] = &[
    "bit.ly", "tinyurl.com", "goo.gl", "t.co", "ow.ly", "is.gd", "v.gd",
    "tiny.cc", "rb.gy", "cutt.ly", "shorturl.at", "short.link",
];

pub const SCRIPT_ENDPOINT: &str = r"\.(php|aspx?)\?";

pub const MAX_URL_LENGTH: usize = 100;

pub const LOOKALIKE_BRANDS: &[RuleSpec] = &[
    RuleSpec { name: "google", pattern: r"g[o0][o0]g[l1]e", points: 20, reason: "URL imitates Google: {}" },
    RuleSpec { name: "facebook", pattern: r"faceb[o0][o0]k", points: 20, reason: "URL imitates Facebook: {}" },
    RuleSpec { name: "amazon", pattern: r"amaz[o0]n", points: 20, reason: "URL imitates Amazon: {}" },
    RuleSpec { name: "microsoft", pattern: r"micr[o0]s[o0]ft", points: 20, reason: "URL imitates Microsoft: {}" },
    RuleSpec { name: "paypal", pattern: r"payp[a4][l1i]", points: 20, reason: "URL imitates PayPal: {}" },
    RuleSpec { name: "netflix", pattern: r"netf[l1]ix", points: 20, reason: "URL imitates Netflix: {}" },
    RuleSpec { name: "apple", pattern: r"app[l1]e", points: 20, reason: "URL imitates Apple: {}" },
    RuleSpec { name: "bank", pattern: r"bank", points: 20, reason: "URL imitates a bank: {}" },
    RuleSpec { name: "secure", pattern: r"secure", points: 20, reason: "URL poses as a secure page: {}" },
    RuleSpec { name: "login", pattern: r"login", points: 20, reason: "URL poses as a login page: {}" },
];

pub const SUSPICIOUS_URLS: Tier = Tier {
    min_hits: 1,
    points: 15,
    named: 0,
    reason: "Suspicious URLs found: {}",
};

pub const ATTACHMENT_TOKENS: &[&str] = &[
    "invoice", "receipt", "contract", "statement", "spreadsheet",
    "fatura", "nota fiscal", "boleto", "comprovante", "documento",
    "contrato", "extrato", "planilha", "pdf", "excel",
];

pub const ATTACHMENT_CONTEXT: Tier = Tier {
    min_hits: 1,
    points: 15,
    named: 1,
    reason: "Attachment in suspicious context: '{}'",
};

/// Compiled form of every table above, built once per scorer.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub trusted_domains: Vec<String>,
    pub sender_blacklist: Vec<PatternRule>,
    pub sender_digit_run: PatternRule,
    pub sensitive_requests: Vec<PatternRule>,
    pub grammar_markers: Vec<Regex>,
    pub url_pattern: Regex,
    pub script_endpoint: Regex,
    pub lookalike_brands: Vec<PatternRule>,
}

impl RuleSet {
    pub fn compile(extra_trusted_domains: &[String]) -> Result<Self, regex::Error> {
        let mut trusted_domains: Vec<String> =
            TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect();
        for domain in extra_trusted_domains {
            let domain = DomainUtils::canonicalize_domain(domain);
            if !domain.is_empty() && !trusted_domains.contains(&domain) {
                trusted_domains.push(domain);
            }
        }

        Ok(Self {
            trusted_domains,
            sender_blacklist: compile_all(SENDER_BLACKLIST)?,
            sender_digit_run: PatternRule::compile(&SENDER_DIGIT_RUN)?,
            sensitive_requests: compile_all(SENSITIVE_REQUESTS)?,
            grammar_markers: GRAMMAR_MARKERS
                .iter()
                .map(|(_, pattern)| Regex::new(pattern))
                .collect::<Result<_, _>>()?,
            url_pattern: Regex::new(URL_PATTERN)?,
            script_endpoint: Regex::new(SCRIPT_ENDPOINT)?,
            lookalike_brands: compile_all(LOOKALIKE_BRANDS)?,
        })
    }

    pub fn is_trusted(&self, domain: &str) -> bool {
        !domain.is_empty() && DomainUtils::matches_domain_list(domain, &self.trusted_domains)
    }
}

fn compile_all(specs: &[RuleSpec]) -> Result<Vec<PatternRule>, regex::Error> {
    specs.iter().map(PatternRule::compile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_compile() {
        let rules = RuleSet::compile(&[]).unwrap();
        assert_eq!(rules.sender_blacklist.len(), SENDER_BLACKLIST.len());
        assert_eq!(rules.lookalike_brands.len(), LOOKALIKE_BRANDS.len());
        assert_eq!(rules.grammar_markers.len(), GRAMMAR_MARKERS.len());
    }

    #[test]
    fn test_sender_blacklist_table() {
        let rules = RuleSet::compile(&[]).unwrap();
        let cases = [
            ("free-prizes.tk", Some("suspicious_tld")),
            ("paypal-secure.net", Some("secure_token")),
            ("bank-login.com", Some("login_token")),
            ("mail-verify.org", Some("verify_token")),
            ("app-update.io", Some("update_token")),
            ("shop12345.com", Some("digit_run")),
            ("example.com", None),
            ("newsletter.org", None),
        ];

        for (domain, expected) in cases {
            let hit = rules
                .sender_blacklist
                .iter()
                .find(|rule| rule.regex.is_match(domain))
                .map(|rule| rule.name);
            assert_eq!(hit, expected, "domain {domain}");
        }
    }

    #[test]
    fn test_lookalike_table() {
        let rules = RuleSet::compile(&[]).unwrap();
        let cases = [
            ("g00gle.com", Some("google")),
            ("faceb0ok-help.com", Some("facebook")),
            ("amaz0n.shop", Some("amazon")),
            ("micros0ft.net", Some("microsoft")),
            ("paypai.com", Some("paypal")),
            ("netf1ix.tv", Some("netflix")),
            ("app1e-id.com", Some("apple")),
            ("mybank.xyz", Some("bank")),
            ("example.org", None),
        ];

        for (domain, expected) in cases {
            let hit = rules
                .lookalike_brands
                .iter()
                .find(|rule| rule.regex.is_match(domain))
                .map(|rule| rule.name);
            assert_eq!(hit, expected, "domain {domain}");
        }
    }

    #[test]
    fn test_grammar_marker_skips_agente_de() {
        let rules = RuleSet::compile(&[]).unwrap();
        let agente = &rules.grammar_markers[4];
        assert!(agente.is_match("agente vai resolver"));
        assert!(agente.is_match("fala com agente "));
        assert!(agente.is_match("agente d"));
        assert!(!agente.is_match("agente deve pagar"));
        assert!(!agente.is_match("agente de viagens"));
    }

    #[test]
    fn test_extra_trusted_domains() {
        let rules = RuleSet::compile(&["Corp.Example.com".to_string()]).unwrap();
        assert!(rules.is_trusted("corp.example.com"));
        assert!(rules.is_trusted("google.com"));
        assert!(!rules.is_trusted("example.com"));
        assert!(!rules.is_trusted(""));
    }

    #[test]
    fn test_render() {
        assert_eq!(render("Suspicious sender domain: {}", "x.tk"), "Suspicious sender domain: x.tk");
        assert_eq!(render("No visible sender address", "ignored"), "No visible sender address");
    }
}
