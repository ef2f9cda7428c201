//! Host name resolution for list downloads through bootstrap servers.
//!
//! Remote lists are fetched before the proxy is up, and often while the
//! system resolver *is* the proxy, so list hosts are resolved by querying the
//! configured bootstrap servers directly over UDP.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::dns::{DnsQuery, DnsResponse, QTYPE_A, QTYPE_AAAA};
use crate::error::ResolveError;

const DNS_PORT: u16 = 53;
const MAX_RESPONSE_SIZE: usize = 4096;

/// Turn a bootstrap endpoint into the socket address to query.
///
/// Accepts `1.1.1.1`, `1.1.1.1:5353`, `[2606:4700::1111]:53`, `2606:4700::1111`
/// and scheme-prefixed forms such as `tls://1.0.0.1`. Scheme-prefixed
/// endpoints are queried over plain DNS on port 53 of the same address.
/// Host names return `None`: they would need resolving themselves.
pub fn parse_endpoint(endpoint: &str) -> Option<SocketAddr> {
    let endpoint = endpoint.trim();
    let (scheme, rest) = match endpoint.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, endpoint),
    };
    let authority = rest.split('/').next().unwrap_or(rest);

    if let Ok(ip) = authority.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, DNS_PORT));
    }
    let addr = authority.parse::<SocketAddr>().ok()?;
    match scheme {
        Some(_) => Some(SocketAddr::new(addr.ip(), DNS_PORT)),
        None => Some(addr),
    }
}

/// Resolver that asks the bootstrap servers in order until one answers.
#[derive(Debug, Clone)]
pub struct BootstrapResolver {
    servers: Arc<[SocketAddr]>,
    timeout: Duration,
}

impl BootstrapResolver {
    /// Build a resolver from endpoint strings, skipping unusable ones.
    ///
    /// Returns `None` when no endpoint is usable.
    pub fn from_endpoints<S: AsRef<str>>(endpoints: &[S], timeout: Duration) -> Option<Self> {
        let servers: Vec<SocketAddr> = endpoints
            .iter()
            .filter_map(|endpoint| {
                let endpoint = endpoint.as_ref();
                let addr = parse_endpoint(endpoint);
                if addr.is_none() {
                    warn!(endpoint, "bootstrap endpoint is not an IP address, skipped");
                }
                addr
            })
            .collect();

        if servers.is_empty() {
            return None;
        }
        Some(Self {
            servers: servers.into(),
            timeout,
        })
    }

    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// Resolve `host` to its addresses.
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        for &server in self.servers.iter() {
            match query_server(server, host, self.timeout).await {
                Ok(addrs) if !addrs.is_empty() => {
                    debug!(host, %server, count = addrs.len(), "bootstrap lookup answered");
                    return Ok(addrs);
                }
                Ok(_) => debug!(host, %server, "bootstrap server returned no addresses"),
                Err(e) => debug!(host, %server, error = %e, "bootstrap lookup failed"),
            }
        }

        Err(ResolveError::NoAnswer(host.to_string()))
    }
}

impl Resolve for BootstrapResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let ips = resolver.lookup(name.as_str()).await?;
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Ask one server for A then AAAA records of `host`.
///
/// Each record type has its own deadline; a server that answers only one of
/// them still yields those addresses.
async fn query_server(
    server: SocketAddr,
    host: &str,
    timeout: Duration,
) -> Result<Vec<IpAddr>, ResolveError> {
    let local = if server.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(server).await?;

    let mut addrs = Vec::new();
    let mut timed_out = false;
    let mut buf = [0u8; MAX_RESPONSE_SIZE];

    for qtype in [QTYPE_A, QTYPE_AAAA] {
        let id: u16 = rand::random();
        socket.send(&DnsQuery::new(id, host, qtype).to_bytes()).await?;

        match timeout_at(Instant::now() + timeout, recv_answer(&socket, &mut buf, id)).await {
            Ok(found) => addrs.extend(found?),
            Err(_) => {
                debug!(host, %server, qtype, "bootstrap query timed out");
                timed_out = true;
            }
        }
    }

    if addrs.is_empty() && timed_out {
        return Err(ResolveError::Timeout(server));
    }
    Ok(addrs)
}

/// Wait for the response carrying transaction `id`.
async fn recv_answer(
    socket: &UdpSocket,
    buf: &mut [u8],
    id: u16,
) -> Result<Vec<IpAddr>, ResolveError> {
    loop {
        let len = socket.recv(buf).await?;
        // Stray datagrams with another ID are ignored until the deadline
        if let Some(found) = DnsResponse::parse_addresses(&buf[..len], id) {
            return Ok(found);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dns::DnsRecord;

    #[test]
    fn parse_endpoint_forms() {
        let cases = [
            ("114.114.115.115", "114.114.115.115:53"),
            ("1.1.1.1:5353", "1.1.1.1:5353"),
            ("tls://1.0.0.1", "1.0.0.1:53"),
            ("tls://223.5.5.5:853", "223.5.5.5:53"),
            ("https://1.1.1.1/dns-query", "1.1.1.1:53"),
            ("2606:4700::1111", "[2606:4700::1111]:53"),
            ("[::1]:5300", "[::1]:5300"),
        ];

        for (endpoint, expected) in cases {
            assert_eq!(
                parse_endpoint(endpoint),
                Some(expected.parse().unwrap()),
                "{endpoint}"
            );
        }
    }

    #[test]
    fn parse_endpoint_rejects_hostnames() {
        assert_eq!(parse_endpoint("tls://dns.pub"), None);
        assert_eq!(parse_endpoint("dns.google:53"), None);
        assert_eq!(parse_endpoint(""), None);
    }

    #[test]
    fn from_endpoints_keeps_usable_servers() {
        let resolver = BootstrapResolver::from_endpoints(
            &["tls://223.5.5.5", "tls://dns.pub", "114.114.115.115"],
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(resolver.servers().len(), 2);
    }

    #[test]
    fn from_endpoints_none_when_nothing_usable() {
        let resolver =
            BootstrapResolver::from_endpoints(&["tls://dns.pub"], Duration::from_secs(1));

        assert!(resolver.is_none());
    }

    /// Answer A queries with `ip`. AAAA queries get an empty answer, or no
    /// reply at all when `drop_aaaa` is set.
    pub(crate) async fn spawn_dns_server(ip: IpAddr, drop_aaaa: bool) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Some(query) = DnsQuery::parse(&buf[..len]) else {
                    continue;
                };
                let answers = if query.qtype == QTYPE_A {
                    vec![DnsRecord::address(&query.domain, ip, 60)]
                } else if drop_aaaa {
                    continue;
                } else {
                    vec![]
                };
                let response = DnsResponse {
                    query,
                    rcode: 0,
                    answers,
                };
                let _ = socket.send_to(&response.to_bytes(), peer).await;
            }
        });

        addr
    }

    #[tokio::test]
    async fn lookup_queries_bootstrap_server() {
        let expected: IpAddr = "10.1.2.3".parse().unwrap();
        let server = spawn_dns_server(expected, false).await;
        let resolver =
            BootstrapResolver::from_endpoints(&[server.to_string()], Duration::from_secs(2))
                .unwrap();

        let addrs = resolver.lookup("lists.example.com").await.unwrap();

        assert_eq!(addrs, vec![expected]);
    }

    #[tokio::test]
    async fn lookup_keeps_a_records_when_aaaa_is_lost() {
        let expected: IpAddr = "10.1.2.3".parse().unwrap();
        let server = spawn_dns_server(expected, true).await;
        let resolver =
            BootstrapResolver::from_endpoints(&[server.to_string()], Duration::from_millis(300))
                .unwrap();

        let addrs = resolver.lookup("lists.example.com").await.unwrap();

        assert_eq!(addrs, vec![expected]);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server = silent.local_addr().unwrap();

        let result = query_server(server, "example.org", Duration::from_millis(50)).await;

        assert!(matches!(result, Err(ResolveError::Timeout(addr)) if addr == server));
        drop(silent);
    }

    #[tokio::test]
    async fn lookup_short_circuits_ip_literals() {
        let resolver =
            BootstrapResolver::from_endpoints(&["127.0.0.1:9"], Duration::from_millis(50))
                .unwrap();

        let addrs = resolver.lookup("192.0.2.7").await.unwrap();

        assert_eq!(addrs, vec!["192.0.2.7".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn lookup_falls_through_dead_servers() {
        let expected: IpAddr = "10.9.9.9".parse().unwrap();
        let live = spawn_dns_server(expected, false).await;
        // Bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dead = silent.local_addr().unwrap();
        let resolver = BootstrapResolver::from_endpoints(
            &[dead.to_string(), live.to_string()],
            Duration::from_millis(200),
        )
        .unwrap();

        let addrs = resolver.lookup("example.org").await.unwrap();

        assert_eq!(addrs, vec![expected]);
        drop(silent);
    }
}
