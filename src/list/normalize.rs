//! Turning raw list text into canonical domains.
//!
//! Accepts plain one-domain-per-line lists (with `#` comments, wildcard-ish
//! leading dots and root trailing dots) as well as dnsmasq-style
//! `server=/domain/...` and `ipset=/domain/...` lines.

use tracing::debug;

use super::DomainSet;

/// Longest hostname, without the trailing root dot.
const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Result of scanning one list.
#[derive(Debug, Default)]
pub struct ListScan {
    pub domains: DomainSet,
    /// Physical lines read.
    pub lines: usize,
    /// Candidates dropped by the exclusion set.
    pub excluded: usize,
    /// Candidates dropped for failing hostname validation.
    pub invalid: usize,
}

/// Parse `text` into a set of canonical domains.
///
/// Candidates already present in `exclude` are skipped before validation, so
/// re-ingesting a list that overlaps an accumulated set is cheap and quiet.
pub fn normalize(text: &str, exclude: Option<&DomainSet>) -> DomainSet {
    scan(text, exclude).domains
}

/// Like [`normalize`], but also reports line and rejection counts.
pub fn scan(text: &str, exclude: Option<&DomainSet>) -> ListScan {
    let mut result = ListScan::default();

    for line in text.lines() {
        result.lines += 1;

        let Some(candidate) = canonicalize_line(line) else {
            continue;
        };

        if exclude.is_some_and(|set| set.contains(&candidate)) {
            result.excluded += 1;
            continue;
        }

        if !is_valid_hostname(&candidate) {
            debug!(domain = %candidate, "domain skipped: invalid hostname");
            result.invalid += 1;
            continue;
        }

        result.domains.insert(candidate);
    }

    debug!(
        lines = result.lines,
        domains = result.domains.len(),
        excluded = result.excluded,
        invalid = result.invalid,
        "list scanned"
    );
    result
}

/// Reduce one physical line to a lowercase domain candidate.
///
/// Returns `None` for blank lines, comments and lines that reduce to
/// nothing. The candidate is not yet validated.
pub fn canonicalize_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }

    let mut candidate = trim_dots(line);
    if let Some(domain) = directive_domain(candidate) {
        candidate = trim_dots(domain);
    }

    if candidate.is_empty() {
        return None;
    }
    Some(candidate.to_ascii_lowercase())
}

fn trim_dots(s: &str) -> &str {
    s.trim_start_matches('.').trim_end_matches('.')
}

/// Extract `domain` from `server=/domain/...` or `ipset=/domain/...`.
///
/// The domain is everything between the first and the last `/`. Lines
/// without a closing `/` are not directives.
fn directive_domain(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("server=/")
        .or_else(|| line.strip_prefix("ipset=/"))?;
    let end = rest.rfind('/')?;
    Some(&rest[..end])
}

/// RFC 1123 hostname check. Accepts names with or without the root dot.
pub fn is_valid_hostname(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(&first), Some(&last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first != b'-'
                && last != b'-'
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}
