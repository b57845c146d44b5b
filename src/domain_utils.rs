/// Minimal domain hierarchy utilities
pub struct DomainUtils;

impl DomainUtils {
    /// Extract domain from email address
    pub fn extract_domain(email: &str) -> Option<String> {
        let (_, domain) = email.rsplit_once('@')?;
        let domain = domain.trim().trim_end_matches('.');
        if domain.is_empty() {
            None
        } else {
            Some(domain.to_lowercase())
        }
    }

    /// Check if domain matches any in list (with hierarchy support)
    pub fn matches_domain_list<S: AsRef<str>>(domain: &str, domain_list: &[S]) -> bool {
        let domain_lower = domain.to_lowercase();

        domain_list.iter().any(|pattern| {
            let pattern_lower = pattern.as_ref().to_lowercase();
            domain_lower == pattern_lower || domain_lower.ends_with(&format!(".{pattern_lower}"))
        })
    }

    /// Canonicalize domain (remove www prefix)
    pub fn canonicalize_domain(domain: &str) -> String {
        let domain_lower = domain.trim().trim_end_matches('.').to_lowercase();
        if let Some(stripped) = domain_lower.strip_prefix("www.") {
            stripped.to_string()
        } else {
            domain_lower
        }
    }

    pub fn is_ipv4(host: &str) -> bool {
        host.parse::<std::net::Ipv4Addr>().is_ok()
    }

    /// Registrable domain per the public suffix list: the label directly
    /// under the suffix plus the suffix, e.g. `mail.example.co.uk` ->
    /// `example.co.uk`.
    ///
    /// IPv4 hosts, single-label hosts and bare suffixes are returned as-is.
    pub fn registrable_domain(host: &str) -> Option<String> {
        let host = Self::canonicalize_domain(host);
        if host.is_empty() {
            return None;
        }
        if Self::is_ipv4(&host) {
            return Some(host);
        }

        match psl::domain_str(&host) {
            Some(domain) => Some(domain.to_string()),
            None => Some(host),
        }
    }
}
