//! Compiled-in domain lists.
//!
//! These keep the proxy routing sensibly when no special list is configured
//! or every configured source is unreachable.

use super::{DomainSet, normalize};

/// General special-domain list, embedded at compile time.
pub const SPECIAL_LIST: &str = include_str!("special.txt");

/// Country/TLD list, embedded at compile time.
pub const TLDN_LIST: &str = include_str!("tldn.txt");

/// Upstreams of the built-in fallback rules.
pub const FALLBACK_UPSTREAMS: &[&str] = &["tls://8.8.8.8", "https://dns.google/dns-query"];

/// Domains of the built-in fallback rules. Always appended after user rules.
pub const FALLBACK_DOMAINS: &[&str] = &[
    "google.com",
    "googleapis.com",
    "gstatic.com",
    "youtube.com",
    "github.com",
    "githubusercontent.com",
];

/// The embedded special and TLD lists merged into one set.
pub fn special_domains() -> DomainSet {
    let mut domains = normalize(SPECIAL_LIST, None);
    let tldn = normalize(TLDN_LIST, Some(&domains));
    domains.extend(tldn);
    domains
}

pub fn fallback_domains() -> DomainSet {
    FALLBACK_DOMAINS.iter().copied().collect()
}

pub fn fallback_upstreams() -> Vec<String> {
    FALLBACK_UPSTREAMS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::scan;

    #[test]
    fn embedded_lists_are_clean() {
        let special = scan(SPECIAL_LIST, None);
        let tldn = scan(TLDN_LIST, None);

        assert_eq!(special.invalid, 0);
        assert_eq!(tldn.invalid, 0);
        assert!(special.domains.len() > 0);
        assert!(tldn.domains.len() > 0);
    }

    #[test]
    fn special_domains_is_union_of_both_lists() {
        let merged = special_domains();

        assert!(merged.contains("google.com"));
        assert!(merged.contains("jp"));
        assert_eq!(
            merged.len(),
            normalize(SPECIAL_LIST, None).len() + normalize(TLDN_LIST, None).len()
        );
    }

    #[test]
    fn fallback_domains_are_canonical() {
        let domains = fallback_domains();

        assert_eq!(domains, normalize(&FALLBACK_DOMAINS.join("\n"), None));
    }
}
