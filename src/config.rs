//! Configuration assembled once per run.
//!
//! [`PipelineConfig`] is what the command line asks for; [`EngineConfig`] is
//! what the resolution engine receives. Neither is mutated after it is
//! built.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::list::is_valid_hostname;

pub const DEFAULT_LISTEN: &str = ":5300";

pub const DEFAULT_UPSTREAMS: &[&str] = &[
    "tls://dns.pub",
    "tls://223.6.6.6",
    "https://doh.pub/dns-query",
    "https://dns.alidns.com/dns-query",
];

pub const DEFAULT_SPECIAL_UPSTREAMS: &[&str] = &[
    "tls://8.8.8.8",
    "tls://162.159.36.1",
    "https://dns.google/dns-query",
    "https://dns11.quad9.net/dns-query",
    "https://doh.opendns.com/dns-query",
    "https://cloudflare-dns.com/dns-query",
];

pub const DEFAULT_FALLBACKS: &[&str] = &["tls://d.rubyfish.cn", "https://i.233py.com/dns-query"];

pub const DEFAULT_BOOTSTRAP: &[&str] = &[
    "tls://223.5.5.5",
    "tls://1.0.0.1",
    "tls://101.101.101.101",
    "114.114.115.115",
];

/// Engine cache size when caching is on.
pub const CACHE_SIZE_BYTES: usize = 4 * 1024 * 1024;

/// Minimum cache TTL forced by fastest-address mode, in seconds.
pub const FASTEST_ADDR_MIN_TTL: u32 = 600;

/// Retry budget for one remote list.
pub const FETCH_ATTEMPTS: u32 = 5;

/// Tuning for list downloads.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Bootstrap resolver endpoints used to resolve list hosts.
    pub bootstrap: Vec<String>,
    pub attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    /// Per-server wait for a bootstrap answer.
    pub bootstrap_timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            bootstrap: Vec::new(),
            attempts: FETCH_ATTEMPTS,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            bootstrap_timeout: Duration::from_secs(3),
            insecure: false,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ListenAddrError {
    #[error("missing port in listen address {0:?}")]
    MissingPort(String),

    #[error("invalid port {port:?} in listen address {addr:?}")]
    InvalidPort { addr: String, port: String },

    #[error("too many colons in listen address {0:?}")]
    TooManyColons(String),

    #[error("unbalanced brackets in listen address {0:?}")]
    UnbalancedBrackets(String),

    #[error("invalid host {host:?} in listen address {addr:?}")]
    InvalidHost { addr: String, host: String },
}

/// Listen address given as `host:port`.
///
/// IPv6 hosts must be bracketed. An empty host, or a host name rather than
/// an IP literal, binds every interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenAddr {
    pub ip: IpAddr,
    pub port: u16,
}

impl FromStr for ListenAddr {
    type Err = ListenAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = split_host_port(s)?;

        let port = port.parse::<u16>().map_err(|_| ListenAddrError::InvalidPort {
            addr: s.to_string(),
            port: port.to_string(),
        })?;

        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) if host.is_empty() || is_valid_hostname(host) => {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            }
            Err(_) => {
                return Err(ListenAddrError::InvalidHost {
                    addr: s.to_string(),
                    host: host.to_string(),
                });
            }
        };

        Ok(Self { ip, port })
    }
}

/// Split `host:port` or `[host]:port`, rejecting stray colons and brackets.
fn split_host_port(s: &str) -> Result<(&str, &str), ListenAddrError> {
    if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| ListenAddrError::UnbalancedBrackets(s.to_string()))?;
        if host.contains(['[', ']']) || after.contains(['[', ']']) {
            return Err(ListenAddrError::UnbalancedBrackets(s.to_string()));
        }
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| ListenAddrError::MissingPort(s.to_string()))?;
        if port.contains(':') {
            return Err(ListenAddrError::TooManyColons(s.to_string()));
        }
        if host.parse::<Ipv6Addr>().is_err() {
            return Err(ListenAddrError::InvalidHost {
                addr: s.to_string(),
                host: host.to_string(),
            });
        }
        return Ok((host, port));
    }

    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| ListenAddrError::MissingPort(s.to_string()))?;
    if host.contains(':') {
        return Err(ListenAddrError::TooManyColons(s.to_string()));
    }
    if s.contains(['[', ']']) {
        return Err(ListenAddrError::UnbalancedBrackets(s.to_string()));
    }
    Ok((host, port))
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// Engine switches passed through untouched, apart from the cache
/// adjustments made by [`EngineConfig::assemble`].
#[derive(Debug, Clone, Default)]
pub struct EngineFlags {
    pub edns_addr: Option<String>,
    pub cache: bool,
    pub insecure: bool,
    pub ipv6_disabled: bool,
    pub refuse_any: bool,
    pub fastest_addr: bool,
    pub verbose: bool,
    pub log_output: Option<PathBuf>,
}

/// Everything one configuration pass needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub listen: ListenAddr,
    pub upstreams: Vec<String>,
    pub special_upstreams: Vec<String>,
    pub fallbacks: Vec<String>,
    pub bootstrap: Vec<String>,
    pub special_lists: Vec<String>,
    pub bypass_lists: Vec<String>,
    pub flags: EngineFlags,
}

impl PipelineConfig {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            bootstrap: self.bootstrap.clone(),
            insecure: self.flags.insecure,
            ..FetchConfig::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            listen: ListenAddr {
                ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 5300,
            },
            upstreams: owned(DEFAULT_UPSTREAMS),
            special_upstreams: owned(DEFAULT_SPECIAL_UPSTREAMS),
            fallbacks: owned(DEFAULT_FALLBACKS),
            bootstrap: owned(DEFAULT_BOOTSTRAP),
            special_lists: Vec::new(),
            bypass_lists: Vec::new(),
            flags: EngineFlags::default(),
        }
    }
}

/// Configuration handed to the resolution engine.
///
/// `upstreams` holds the plain default upstreams followed by the compiled
/// routing directives, in priority order.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    pub listen_addrs: Vec<IpAddr>,
    pub listen_ports: Vec<u16>,
    pub upstreams: Vec<String>,
    pub fallbacks: Vec<String>,
    pub bootstrap_dns: Vec<String>,
    pub all_servers: bool,
    pub enable_edns_subnet: bool,
    pub edns_addr: Option<String>,
    pub tls_min_version: f64,
    pub cache: bool,
    pub cache_size_bytes: usize,
    pub cache_min_ttl: u32,
    pub insecure: bool,
    pub refuse_any: bool,
    pub ipv6_disabled: bool,
    pub fastest_address: bool,
    pub verbose: bool,
    pub log_output: Option<PathBuf>,
}

impl EngineConfig {
    /// Build the engine configuration from the run options and the compiled
    /// directives.
    ///
    /// Fastest-address mode needs the cache, with a floor on its TTL.
    pub fn assemble(config: &PipelineConfig, directives: Vec<String>) -> Self {
        let flags = &config.flags;
        let cache = flags.cache || flags.fastest_addr;

        let mut upstreams = config.upstreams.clone();
        upstreams.extend(directives);

        Self {
            listen_addrs: vec![config.listen.ip],
            listen_ports: vec![config.listen.port],
            upstreams,
            fallbacks: config.fallbacks.clone(),
            bootstrap_dns: config.bootstrap.clone(),
            all_servers: true,
            enable_edns_subnet: true,
            edns_addr: flags.edns_addr.clone(),
            tls_min_version: 1.2,
            cache,
            cache_size_bytes: if cache { CACHE_SIZE_BYTES } else { 0 },
            cache_min_ttl: if flags.fastest_addr {
                FASTEST_ADDR_MIN_TTL
            } else {
                0
            },
            insecure: flags.insecure,
            refuse_any: flags.refuse_any,
            ipv6_disabled: flags.ipv6_disabled,
            fastest_address: flags.fastest_addr,
            verbose: flags.verbose,
            log_output: flags.log_output.clone(),
        }
    }
}
