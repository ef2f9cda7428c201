//! DNS message encoding and parsing for bootstrap lookups.
//!
//! Covers a single-question query and the A/AAAA records of its answer,
//! which is all that resolving a list host needs.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const HEADER_LEN: usize = 12;

pub const QTYPE_A: u16 = 1;
pub const QTYPE_AAAA: u16 = 28;
pub const QCLASS_IN: u16 = 1;

const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_RECURSION_DESIRED: u16 = 0x0100;
const FLAG_RECURSION_AVAILABLE: u16 = 0x0080;
const RCODE_MASK: u16 = 0x000F;

/// A single-question DNS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub id: u16,
    pub domain: String,
    pub qtype: u16,
}

impl DnsQuery {
    pub fn new(id: u16, domain: &str, qtype: u16) -> Self {
        Self {
            id,
            domain: domain.trim_end_matches('.').to_ascii_lowercase(),
            qtype,
        }
    }

    /// Encode as a recursive query.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.domain.len() + 6);

        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&FLAG_RECURSION_DESIRED.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ANCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

        encode_domain(&mut data, &self.domain);
        data.extend_from_slice(&self.qtype.to_be_bytes());
        data.extend_from_slice(&QCLASS_IN.to_be_bytes());
        data
    }

    /// Parse a single-question query from raw bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN + 1 {
            return None;
        }

        let id = u16::from_be_bytes([data[0], data[1]]);

        let mut pos = HEADER_LEN;
        let mut labels = Vec::new();

        while pos < data.len() {
            let label_len = data[pos] as usize;
            if label_len == 0 {
                pos += 1;
                break;
            }
            pos += 1;
            if pos + label_len > data.len() {
                return None;
            }
            labels.push(std::str::from_utf8(&data[pos..pos + label_len]).ok()?);
            pos += label_len;
        }

        if labels.is_empty() || pos + 4 > data.len() {
            return None;
        }
        let qtype = u16::from_be_bytes([data[pos], data[pos + 1]]);

        Some(Self::new(id, &labels.join("."), qtype))
    }
}

/// A resource record of a response.
#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: u16,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl DnsRecord {
    pub fn address(name: &str, ip: IpAddr, ttl: u32) -> Self {
        let (rtype, rdata) = match ip {
            IpAddr::V4(v4) => (QTYPE_A, v4.octets().to_vec()),
            IpAddr::V6(v6) => (QTYPE_AAAA, v6.octets().to_vec()),
        };
        Self {
            name: name.to_string(),
            rtype,
            ttl,
            rdata,
        }
    }
}

/// A DNS response to a [`DnsQuery`].
#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub query: DnsQuery,
    pub rcode: u16,
    pub answers: Vec<DnsRecord>,
}

impl DnsResponse {
    /// Encode the response to wire format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(512);
        let flags = FLAG_RESPONSE
            | FLAG_RECURSION_DESIRED
            | FLAG_RECURSION_AVAILABLE
            | (self.rcode & RCODE_MASK);

        data.extend_from_slice(&self.query.id.to_be_bytes());
        data.extend_from_slice(&flags.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        data.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

        encode_domain(&mut data, &self.query.domain);
        data.extend_from_slice(&self.query.qtype.to_be_bytes());
        data.extend_from_slice(&QCLASS_IN.to_be_bytes());

        for a in &self.answers {
            if a.name == self.query.domain {
                data.extend_from_slice(&[0xC0, 0x0C]); // Pointer to offset 12
            } else {
                encode_domain(&mut data, &a.name);
            }
            data.extend_from_slice(&a.rtype.to_be_bytes());
            data.extend_from_slice(&QCLASS_IN.to_be_bytes());
            data.extend_from_slice(&a.ttl.to_be_bytes());
            data.extend_from_slice(&(a.rdata.len() as u16).to_be_bytes());
            data.extend_from_slice(&a.rdata);
        }

        data
    }

    /// Extract the A and AAAA addresses from the answer section.
    ///
    /// Returns `None` when the packet is malformed, is not a response, or does
    /// not carry transaction `id`. An error rcode yields an empty list.
    pub fn parse_addresses(response: &[u8], id: u16) -> Option<Vec<IpAddr>> {
        if response.len() < HEADER_LEN {
            return None;
        }

        let flags = u16::from_be_bytes([response[2], response[3]]);
        if u16::from_be_bytes([response[0], response[1]]) != id || flags & FLAG_RESPONSE == 0 {
            return None;
        }
        if flags & RCODE_MASK != 0 {
            return Some(Vec::new());
        }

        let qdcount = u16::from_be_bytes([response[4], response[5]]) as usize;
        let ancount = u16::from_be_bytes([response[6], response[7]]) as usize;

        let mut pos = HEADER_LEN;
        for _ in 0..qdcount {
            pos = skip_name(response, pos)? + 4; // QTYPE + QCLASS
        }

        let mut addrs = Vec::with_capacity(ancount);
        for _ in 0..ancount {
            pos = skip_name(response, pos)?;
            if pos + 10 > response.len() {
                return None;
            }

            let rtype = u16::from_be_bytes([response[pos], response[pos + 1]]);
            let rdlength = u16::from_be_bytes([response[pos + 8], response[pos + 9]]) as usize;
            pos += 10;
            let rdata = response.get(pos..pos + rdlength)?;
            pos += rdlength;

            match (rtype, rdata.len()) {
                (QTYPE_A, 4) => {
                    let octets: [u8; 4] = rdata.try_into().ok()?;
                    addrs.push(IpAddr::V4(Ipv4Addr::from(octets)));
                }
                (QTYPE_AAAA, 16) => {
                    let octets: [u8; 16] = rdata.try_into().ok()?;
                    addrs.push(IpAddr::V6(Ipv6Addr::from(octets)));
                }
                // CNAME and friends; the recursive server already chased them
                _ => {}
            }
        }

        Some(addrs)
    }
}

fn encode_domain(buf: &mut Vec<u8>, domain: &str) {
    for label in domain.split('.').filter(|l| !l.is_empty()) {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
}

/// Return the offset just past the (possibly compressed) name at `pos`.
fn skip_name(data: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let b = *data.get(pos)?;
        if b == 0 {
            return Some(pos + 1);
        }
        if b >= 0xC0 {
            data.get(pos + 1)?;
            return Some(pos + 2);
        }
        pos += 1 + b as usize;
    }
}
