//! Summary statistics for a configuration pass.

use serde::Serialize;

/// Counts gathered while compiling routing rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompileStats {
    pub special_domains: usize,
    pub bypass_domains: usize,
    pub fallback_domains: usize,
    pub special_rules: usize,
    pub bypass_rules: usize,
    pub fallback_rules: usize,
}

impl CompileStats {
    pub fn total_rules(&self) -> usize {
        self.special_rules + self.bypass_rules + self.fallback_rules
    }
}

/// Counts gathered while fetching and scanning list sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub lines: usize,
    pub invalid: usize,
}

impl IngestStats {
    /// A source fetched with `lines` lines, validated elsewhere.
    pub fn record_fetch(&mut self, lines: usize) {
        self.sources_ok += 1;
        self.lines += lines;
    }

    pub fn record_scan(&mut self, scan: &crate::list::ListScan) {
        self.record_fetch(scan.lines);
        self.invalid += scan.invalid;
    }

    pub fn record_failure(&mut self) {
        self.sources_failed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::scan;

    #[test]
    fn total_rules_sums_all_classes() {
        let stats = CompileStats {
            special_rules: 4,
            bypass_rules: 1,
            fallback_rules: 12,
            ..Default::default()
        };

        assert_eq!(stats.total_rules(), 17);
    }

    #[test]
    fn ingest_accumulates_scans() {
        let mut stats = IngestStats::default();

        stats.record_scan(&scan("a.com\nbad_x.com\n", None));
        stats.record_scan(&scan("b.com", None));
        stats.record_failure();

        assert_eq!(stats.sources_ok, 2);
        assert_eq!(stats.sources_failed, 1);
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.invalid, 1);
    }

    #[test]
    fn record_fetch_counts_like_scan() {
        let text = "a.com\nb.com\nc.com\n";
        let mut fetched = IngestStats::default();
        let mut scanned = IngestStats::default();

        fetched.record_fetch(text.lines().count());
        scanned.record_scan(&scan(text, None));

        assert_eq!(fetched.sources_ok, 1);
        assert_eq!(fetched.lines, 3);
        assert_eq!(fetched.invalid, 0);
        assert_eq!(fetched, scanned);
    }
}
