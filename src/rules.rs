//! Routing rule compilation.
//!
//! Produces the ordered upstream directives handed to the resolution engine.
//! The engine evaluates directives first-match-wins, so emission order is the
//! priority order:
//! 1. special rules (`[/domain/]upstream`)
//! 2. bypass overrides (`[/domain/]#`)
//! 3. built-in fallback rules

use std::fmt;

use serde::Serialize;

use crate::list::{DomainSet, builtin, scan};
use crate::stats::CompileStats;

/// Where a directive sends matching queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Upstream(String),
    /// Back to the default upstreams.
    Bypass,
}

/// Priority class of a directive. Variants are declared in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Precedence {
    Special,
    Bypass,
    Fallback,
}

/// One routing rule for a domain and its subdomains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub domain: String,
    pub target: Target,
    pub precedence: Precedence,
}

impl Directive {
    fn upstream(domain: &str, upstream: &str, precedence: Precedence) -> Self {
        Self {
            domain: domain.to_string(),
            target: Target::Upstream(upstream.to_string()),
            precedence,
        }
    }

    fn bypass(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            target: Target::Bypass,
            precedence: Precedence::Bypass,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Upstream(upstream) => write!(f, "[/{}/]{}", self.domain, upstream),
            Target::Bypass => write!(f, "[/{}/]#", self.domain),
        }
    }
}

/// Inputs of [`compile`].
#[derive(Debug, Clone, Copy)]
pub struct RuleSources<'a> {
    pub special: &'a DomainSet,
    pub special_upstreams: &'a [String],
    pub bypass: &'a DomainSet,
    pub fallback_upstreams: &'a [String],
    pub fallback: &'a DomainSet,
}

/// Compiled directives in emission order.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub directives: Vec<Directive>,
    pub stats: CompileStats,
}

impl CompiledRules {
    /// Render the directives in the engine's upstream syntax.
    pub fn to_upstreams(&self) -> Vec<String> {
        self.directives.iter().map(ToString::to_string).collect()
    }
}

/// Compile routing directives.
///
/// Domains are emitted in sorted order within each upstream so the output is
/// reproducible across runs.
pub fn compile(sources: RuleSources<'_>) -> CompiledRules {
    let special = sources.special.sorted();
    let fallback = sources.fallback.sorted();
    let mut directives = Vec::with_capacity(
        special.len() * sources.special_upstreams.len()
            + fallback.len() * sources.fallback_upstreams.len(),
    );

    for upstream in sources.special_upstreams {
        directives.extend(
            special
                .iter()
                .map(|domain| Directive::upstream(domain, upstream, Precedence::Special)),
        );
    }
    let special_rules = directives.len();

    // Only strict subdomains of a special domain; an exact match emits nothing.
    directives.extend(
        sources
            .bypass
            .sorted()
            .into_iter()
            .filter(|domain| sources.special.has_parent_of(domain))
            .map(Directive::bypass),
    );
    let bypass_rules = directives.len() - special_rules;

    for upstream in sources.fallback_upstreams {
        directives.extend(
            fallback
                .iter()
                .map(|domain| Directive::upstream(domain, upstream, Precedence::Fallback)),
        );
    }
    let fallback_rules = directives.len() - special_rules - bypass_rules;

    CompiledRules {
        directives,
        stats: CompileStats {
            special_domains: sources.special.len(),
            bypass_domains: sources.bypass.len(),
            fallback_domains: sources.fallback.len(),
            special_rules,
            bypass_rules,
            fallback_rules,
        },
    }
}

/// Merged special domain set and whether it came from the built-in lists.
#[derive(Debug, Clone)]
pub struct SpecialDomains {
    pub domains: DomainSet,
    pub builtin: bool,
    /// Entries dropped for failing hostname validation.
    pub invalid: usize,
}

/// Merge the texts of every successfully fetched special list.
///
/// With no texts at all (nothing configured, or every source failed) the
/// built-in special and TLD lists are used instead. Each text is scanned
/// against the accumulated set so overlapping lists are merged cheaply.
pub fn merge_special_lists<S: AsRef<str>>(texts: &[S]) -> SpecialDomains {
    if texts.is_empty() {
        return SpecialDomains {
            domains: builtin::special_domains(),
            builtin: true,
            invalid: 0,
        };
    }

    let mut domains = DomainSet::new();
    let mut invalid = 0;
    for text in texts {
        let scanned = scan(text.as_ref(), Some(&domains));
        invalid += scanned.invalid;
        domains.extend(scanned.domains);
    }
    SpecialDomains {
        domains,
        builtin: false,
        invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(domains: &[&str]) -> DomainSet {
        domains.iter().copied().collect()
    }

    fn upstreams(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn compile_simple(special: &DomainSet, bypass: &DomainSet, up: &[String]) -> CompiledRules {
        let empty = DomainSet::new();
        compile(RuleSources {
            special,
            special_upstreams: up,
            bypass,
            fallback_upstreams: &[],
            fallback: &empty,
        })
    }

    #[test]
    fn special_rule_format() {
        let rules = compile_simple(
            &set(&["example.com"]),
            &DomainSet::new(),
            &upstreams(&["tls://8.8.8.8"]),
        );

        assert_eq!(rules.to_upstreams(), vec!["[/example.com/]tls://8.8.8.8"]);
    }

    #[test]
    fn bypass_for_subdomain_of_special() {
        let rules = compile_simple(
            &set(&["example.com"]),
            &set(&["api.example.com"]),
            &upstreams(&["tls://8.8.8.8"]),
        );

        assert_eq!(
            rules.to_upstreams(),
            vec!["[/example.com/]tls://8.8.8.8", "[/api.example.com/]#"]
        );
        assert_eq!(rules.stats.bypass_rules, 1);
    }

    #[test]
    fn unrelated_bypass_emits_nothing() {
        let rules = compile_simple(
            &set(&["example.com"]),
            &set(&["other.org", "notexample.com"]),
            &upstreams(&["tls://8.8.8.8"]),
        );

        assert!(rules.directives.iter().all(|d| d.target != Target::Bypass));
        assert_eq!(rules.stats.bypass_rules, 0);
    }

    #[test]
    fn exact_match_bypass_is_a_no_op() {
        let rules = compile_simple(
            &set(&["example.com"]),
            &set(&["example.com"]),
            &upstreams(&["tls://8.8.8.8"]),
        );

        assert_eq!(rules.directives.len(), 1);
    }

    #[test]
    fn every_upstream_gets_every_domain() {
        let rules = compile_simple(
            &set(&["b.com", "a.com"]),
            &DomainSet::new(),
            &upstreams(&["tls://1.1.1.1", "https://dns.google/dns-query"]),
        );

        assert_eq!(
            rules.to_upstreams(),
            vec![
                "[/a.com/]tls://1.1.1.1",
                "[/b.com/]tls://1.1.1.1",
                "[/a.com/]https://dns.google/dns-query",
                "[/b.com/]https://dns.google/dns-query",
            ]
        );
    }

    #[test]
    fn emission_order_is_special_bypass_fallback() {
        let special = set(&["example.com", "example.org"]);
        let bypass = set(&["cdn.example.org", "api.example.com"]);
        let fallback = set(&["google.com"]);
        let special_up = upstreams(&["tls://8.8.8.8"]);
        let fallback_up = upstreams(&["tls://9.9.9.9"]);

        let rules = compile(RuleSources {
            special: &special,
            special_upstreams: &special_up,
            bypass: &bypass,
            fallback_upstreams: &fallback_up,
            fallback: &fallback,
        });

        let order: Vec<Precedence> = rules.directives.iter().map(|d| d.precedence).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(
            rules.to_upstreams(),
            vec![
                "[/example.com/]tls://8.8.8.8",
                "[/example.org/]tls://8.8.8.8",
                "[/api.example.com/]#",
                "[/cdn.example.org/]#",
                "[/google.com/]tls://9.9.9.9",
            ]
        );
        assert_eq!(rules.stats.total_rules(), 5);
    }

    #[test]
    fn fallback_rules_are_unconditional() {
        let empty = DomainSet::new();
        let fallback = set(&["google.com"]);
        let fallback_up = upstreams(&["tls://9.9.9.9"]);

        let rules = compile(RuleSources {
            special: &empty,
            special_upstreams: &[],
            bypass: &empty,
            fallback_upstreams: &fallback_up,
            fallback: &fallback,
        });

        assert_eq!(rules.to_upstreams(), vec!["[/google.com/]tls://9.9.9.9"]);
        assert_eq!(rules.stats.fallback_rules, 1);
    }

    #[test]
    fn no_special_lists_uses_builtin() {
        let merged = merge_special_lists::<String>(&[]);

        assert!(merged.builtin);
        assert!(!merged.domains.is_empty());
        assert_eq!(merged.domains, builtin::special_domains());
    }

    #[test]
    fn configured_lists_are_merged() {
        let merged = merge_special_lists(&["a.com\nb.com", "b.com\nserver=/c.com/1.1.1.1\nx_y.com"]);

        assert!(!merged.builtin);
        assert_eq!(merged.invalid, 1);
        assert_eq!(merged.domains.sorted(), vec!["a.com", "b.com", "c.com"]);
    }

    #[test]
    fn fetched_but_empty_list_does_not_fall_back() {
        let merged = merge_special_lists(&["# nothing here"]);

        assert!(!merged.builtin);
        assert!(merged.domains.is_empty());
    }
}
