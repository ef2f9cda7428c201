//! Duplicate-free collection of canonical domain names.

use rustc_hash::FxHashSet;

/// A set of canonical domains.
///
/// Membership is a hash lookup. Iteration order is unspecified; use
/// [`DomainSet::sorted`] wherever output order must be reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    domains: FxHashSet<String>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a domain. Returns `false` if it was already present.
    ///
    /// The caller is responsible for passing a canonical name; see
    /// [`crate::list::normalize`].
    pub fn insert(&mut self, domain: String) -> bool {
        self.domains.insert(domain)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    /// Union `other` into this set.
    pub fn extend(&mut self, other: DomainSet) {
        self.domains.extend(other.domains);
    }

    /// Check whether `domain` is a strict subdomain of any member.
    ///
    /// Walks the parent suffixes of `domain` ("a.b.example.com" checks
    /// "b.example.com", "example.com", "com"), so the cost is proportional to
    /// the label count rather than the set size. An exact member is not its
    /// own subdomain.
    pub fn has_parent_of(&self, domain: &str) -> bool {
        let mut current = domain;

        while let Some(pos) = current.find('.') {
            current = &current[pos + 1..];
            if self.domains.contains(current) {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// Members in lexicographic order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.iter().collect();
        domains.sort_unstable();
        domains
    }
}

impl FromIterator<String> for DomainSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            domains: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for DomainSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_owned).collect()
    }
}
