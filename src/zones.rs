//! Zone-suffix routing of domains to upstream WHOIS servers.

use crate::errors::ProxyError;
use std::{collections::HashMap, fmt, str::FromStr};
use tracing::debug;

/// A `host:port` pair of an upstream WHOIS server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpstreamAddr {
    pub host: String,
    pub port: u16,
}

impl UpstreamAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl FromStr for UpstreamAddr {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ProxyError::Config(format!("upstream {:?} is not host:port", s)))?;

        if host.is_empty() {
            return Err(ProxyError::Config(format!("upstream {:?} has no host", s)));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| ProxyError::Config(format!("upstream {:?} has an invalid port", s)))?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Picks the upstream WHOIS server for a normalized domain.
///
/// The table is built once and never changes, so a resolver can be shared
/// between connections behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct ZoneResolver {
    zones: HashMap<String, UpstreamAddr>,
    default: UpstreamAddr,
}

impl ZoneResolver {
    pub fn new(zones: HashMap<String, UpstreamAddr>, default: UpstreamAddr) -> Self {
        Self { zones, default }
    }

    /// Parse a zone table given as `zone -> "host:port"` strings.
    pub fn from_strings(
        zones: &HashMap<String, String>,
        default: &str,
    ) -> Result<Self, ProxyError> {
        let default = default.parse::<UpstreamAddr>()?;
        let zones = zones
            .iter()
            .map(|(zone, addr)| Ok((zone.clone(), addr.parse::<UpstreamAddr>()?)))
            .collect::<Result<HashMap<_, _>, ProxyError>>()?;

        Ok(Self::new(zones, default))
    }

    pub fn default_upstream(&self) -> &UpstreamAddr {
        &self.default
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Every right-anchored suffix of `fqdn` except `fqdn` itself, most
    /// specific first: `super.site.beget.ru` gives
    /// `[site.beget.ru, beget.ru, ru]`.
    pub fn candidate_zones(fqdn: &str) -> Vec<&str> {
        let mut zones = Vec::new();
        let mut rest = fqdn;
        while let Some((_, suffix)) = rest.split_once('.') {
            zones.push(suffix);
            rest = suffix;
        }
        zones
    }

    /// Longest configured zone wins, the default upstream covers the rest.
    pub fn resolve(&self, fqdn: &str) -> Result<&UpstreamAddr, ProxyError> {
        let candidates = Self::candidate_zones(fqdn);
        debug!(domain = fqdn, zones = ?candidates, "candidate zones");

        if candidates.is_empty() {
            return Err(ProxyError::NoZoneMatch(fqdn.to_string()));
        }

        Ok(candidates
            .into_iter()
            .find_map(|zone| self.zones.get(zone))
            .unwrap_or(&self.default))
    }
}
