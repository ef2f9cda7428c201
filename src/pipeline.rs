//! Configuration pass orchestration.
//!
//! Fetch → normalize → merge → compile → assemble. Per-source failures are
//! logged and skipped; the pass itself only fails if the HTTP client cannot
//! be built.

use tracing::{info, warn};

use crate::config::{EngineConfig, PipelineConfig};
use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::list::{DomainSet, builtin, scan};
use crate::rules::{RuleSources, compile, merge_special_lists};
use crate::stats::{CompileStats, IngestStats};

/// Output of one configuration pass.
#[derive(Debug, Clone)]
pub struct Build {
    pub engine: EngineConfig,
    pub stats: CompileStats,
    pub special_ingest: IngestStats,
    pub bypass_ingest: IngestStats,
    /// The special set came from the built-in lists.
    pub builtin_special: bool,
}

/// Run a full configuration pass.
pub async fn build(config: &PipelineConfig) -> Result<Build, FetchError> {
    let fetcher = Fetcher::new(config.fetch_config())?;

    let (special_texts, mut special_ingest) = fetch_texts(&fetcher, &config.special_lists).await;
    let special = merge_special_lists(&special_texts);
    special_ingest.invalid = special.invalid;
    if special.builtin {
        info!("using built-in special list");
    }

    let (bypass, bypass_ingest) = fetch_bypass(&fetcher, &config.bypass_lists).await;

    let fallback = builtin::fallback_domains();
    let fallback_upstreams = builtin::fallback_upstreams();
    let rules = compile(RuleSources {
        special: &special.domains,
        special_upstreams: &config.special_upstreams,
        bypass: &bypass,
        fallback_upstreams: &fallback_upstreams,
        fallback: &fallback,
    });

    if !config.bypass_lists.is_empty() {
        info!("{} bypass rules configured, totally", rules.stats.bypass_rules);
    }

    let engine = EngineConfig::assemble(config, rules.to_upstreams());
    info!(
        special_domains = rules.stats.special_domains,
        invalid_special = special_ingest.invalid,
        invalid_bypass = bypass_ingest.invalid,
        "speclist length: {}",
        rules.stats.special_domains
    );
    info!(
        special_rules = rules.stats.special_rules,
        bypass_rules = rules.stats.bypass_rules,
        fallback_rules = rules.stats.fallback_rules,
        "upstream rule count: {}",
        engine.upstreams.len()
    );

    Ok(Build {
        engine,
        stats: rules.stats,
        special_ingest,
        bypass_ingest,
        builtin_special: special.builtin,
    })
}

/// Fetch every source, keeping the decoded text of those that succeed.
///
/// `invalid` stays zero; the merge scans the texts and reports it.
async fn fetch_texts(fetcher: &Fetcher, sources: &[String]) -> (Vec<String>, IngestStats) {
    let mut texts = Vec::with_capacity(sources.len());
    let mut stats = IngestStats::default();

    for (source, result) in sources.iter().zip(fetcher.fetch_all(sources).await) {
        match result {
            Ok(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                let lines = text.lines().count();
                stats.record_fetch(lines);
                info!(source = %source, "{lines} lines special list fetched");
                texts.push(text);
            }
            Err(e) => {
                stats.record_failure();
                warn!(source = %source, error = %e, "list fetch failed; skipped");
            }
        }
    }

    (texts, stats)
}

async fn fetch_bypass(fetcher: &Fetcher, sources: &[String]) -> (DomainSet, IngestStats) {
    let mut domains = DomainSet::new();
    let mut stats = IngestStats::default();

    for (source, result) in sources.iter().zip(fetcher.fetch_all(sources).await) {
        match result {
            Ok(data) => {
                let scanned = scan(&String::from_utf8_lossy(&data), None);
                info!(source = %source, "{} lines bypass list fetched", scanned.lines);
                stats.record_scan(&scanned);
                domains.extend(scanned.domains);
            }
            Err(e) => {
                stats.record_failure();
                warn!(source = %source, error = %e, "list fetch failed; skipped");
            }
        }
    }

    (domains, stats)
}
