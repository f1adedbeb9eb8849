//! User-specified selection predicates for the stream pipeline.
//!
//! Split across two granularities: [`FilterSet::coarse_match`] eliminates whole files against
//! an [`InputDescriptor`] before they are ever opened, and [`FilterSet::fine_match`] is applied
//! to each decoded [`BgpElem`] after the fact. Every predicate is OR'd within itself and AND'd
//! against the others.

use crate::error::ParserError;
use crate::error::ParserError::FilterError;
use crate::models::{BgpElem, ElemType};
use crate::stream::input_descriptor::InputDescriptor;
use crate::stream::record::DumpType;
use ipnet::IpNet;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel meaning "no upper bound" for a time interval, matching the C `UINT32_MAX` idiom.
pub const FOREVER: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub begin: u32,
    pub end: u32,
}

impl Interval {
    fn contains(&self, ts: u32) -> bool {
        ts >= self.begin && ts <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMatchType {
    Exact,
    IncludeSuper,
    IncludeSub,
    IncludeSuperSub,
}

fn same_family(a: &IpNet, b: &IpNet) -> bool {
    matches!(
        (a, b),
        (IpNet::V4(_), IpNet::V4(_)) | (IpNet::V6(_), IpNet::V6(_))
    )
}

fn prefix_match(match_prefix: &IpNet, input_prefix: &IpNet, t: PrefixMatchType) -> bool {
    let exact = input_prefix.eq(match_prefix);
    if exact {
        return true;
    }
    if !same_family(match_prefix, input_prefix) {
        return false;
    }
    match t {
        PrefixMatchType::Exact => false,
        PrefixMatchType::IncludeSuper => {
            match_prefix.addr() >= input_prefix.addr() && match_prefix.broadcast() <= input_prefix.broadcast()
        }
        PrefixMatchType::IncludeSub => {
            match_prefix.addr() <= input_prefix.addr() && match_prefix.broadcast() >= input_prefix.broadcast()
        }
        PrefixMatchType::IncludeSuperSub => {
            (match_prefix.addr() >= input_prefix.addr() && match_prefix.broadcast() <= input_prefix.broadcast())
                || (match_prefix.addr() <= input_prefix.addr() && match_prefix.broadcast() >= input_prefix.broadcast())
        }
    }
}

/// Parses a duration specifier of the form `\d+[smhdw]?` into a number of seconds.
fn parse_duration_secs(spec: &str) -> Result<u32, ParserError> {
    let spec = spec.trim();
    let (digits, unit) = match spec.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&spec[..spec.len() - 1], c),
        _ => (spec, 's'),
    };
    let n: u32 = digits
        .parse()
        .map_err(|_| FilterError(format!("invalid duration: {spec}")))?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => return Err(FilterError(format!("unknown duration unit in: {spec}"))),
    };
    Ok(n.saturating_mul(multiplier))
}

fn now_unix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Mutable collection of predicates, frozen once the coordinator starts.
#[derive(Debug, Default, Clone)]
pub struct FilterSet {
    intervals: Vec<Interval>,
    collectors: HashSet<String>,
    projects: HashSet<String>,
    peer_asns: HashSet<u32>,
    prefixes: Vec<(IpNet, PrefixMatchType)>,
    elem_types: HashSet<ElemType>,
    rib_period: Option<u32>,
    last_rib_emit: HashMap<String, u32>,
    frozen: bool,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_mutable(&self) -> Result<(), ParserError> {
        if self.frozen {
            return Err(ParserError::InvalidState(
                "filter set is frozen after start()".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_interval(&mut self, begin: u32, end: u32) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        if begin > end {
            return Err(FilterError("interval begin must not exceed end".to_string()));
        }
        self.intervals.push(Interval { begin, end });
        Ok(())
    }

    /// Adds an interval covering the last `spec` (e.g. `"1h"`, `"3600"`) up to [`FOREVER`], for
    /// following a live archive from just behind the present moment.
    pub fn add_recent(&mut self, spec: &str) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        let secs = parse_duration_secs(spec)?;
        let begin = now_unix().saturating_sub(secs);
        self.intervals.push(Interval { begin, end: FOREVER });
        Ok(())
    }

    pub fn add_rib_period(&mut self, seconds: u32) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        self.rib_period = Some(seconds);
        Ok(())
    }

    pub fn add_collector(&mut self, name: impl Into<String>) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        self.collectors.insert(name.into());
        Ok(())
    }

    pub fn add_project(&mut self, name: impl Into<String>) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        self.projects.insert(name.into());
        Ok(())
    }

    pub fn add_peer_asn(&mut self, asn: u32) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        self.peer_asns.insert(asn);
        Ok(())
    }

    pub fn add_prefix(&mut self, prefix: &str, match_type: PrefixMatchType) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        let net = IpNet::from_str(prefix).map_err(|e| FilterError(format!("invalid prefix {prefix}: {e}")))?;
        self.prefixes.push((net, match_type));
        Ok(())
    }

    pub fn add_elem_type(&mut self, elem_type: ElemType) -> Result<(), ParserError> {
        self.ensure_mutable()?;
        self.elem_types.insert(elem_type);
        Ok(())
    }

    /// `Err(NoInterval)` iff no time interval has been configured, per the requirement that a
    /// coordinator cannot start without one.
    pub fn validate(&self) -> Result<(), ParserError> {
        if self.intervals.is_empty() {
            return Err(ParserError::NoInterval);
        }
        Ok(())
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    fn interval_admits(&self, ts: u32) -> bool {
        self.intervals.iter().any(|i| i.contains(ts))
    }

    /// Cheap pre-decode check: eliminates a whole file by collector, project, declared
    /// timestamp, and RIB-period deduplication, without opening it.
    pub fn coarse_match(&mut self, descriptor: &InputDescriptor) -> bool {
        if !self.interval_admits(descriptor.file_timestamp) {
            return false;
        }
        if !self.collectors.is_empty() && !self.collectors.contains(&descriptor.collector) {
            return false;
        }
        if !self.projects.is_empty() && !self.projects.contains(&descriptor.project) {
            return false;
        }
        if descriptor.dump_type == DumpType::Rib {
            if let Some(period) = self.rib_period {
                if let Some(&last) = self.last_rib_emit.get(&descriptor.collector) {
                    if descriptor.file_timestamp.saturating_sub(last) < period {
                        return false;
                    }
                }
                self.last_rib_emit
                    .insert(descriptor.collector.clone(), descriptor.file_timestamp);
            }
        }
        true
    }

    /// Post-decode check applied to one element at a time.
    pub fn fine_match(&self, elem: &BgpElem) -> bool {
        if !self.interval_admits(elem.timestamp) {
            return false;
        }
        if !self.peer_asns.is_empty() && !self.peer_asns.contains(&elem.peer_asn.to_u32()) {
            return false;
        }
        if !self.elem_types.is_empty() && !self.elem_types.contains(&elem.elem_type) {
            return false;
        }
        if !self.prefixes.is_empty()
            && !self
                .prefixes
                .iter()
                .any(|(net, mt)| prefix_match(net, &elem.prefix.prefix, *mt))
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_interval() {
        let fs = FilterSet::new();
        assert!(matches!(fs.validate(), Err(ParserError::NoInterval)));
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration_secs("90").unwrap(), 90);
        assert_eq!(parse_duration_secs("2m").unwrap(), 120);
        assert_eq!(parse_duration_secs("1h").unwrap(), 3600);
        assert_eq!(parse_duration_secs("1d").unwrap(), 86400);
        assert_eq!(parse_duration_secs("1w").unwrap(), 604800);
        assert!(parse_duration_secs("1x").is_err());
    }

    #[test]
    fn rib_period_deduplicates_within_window() {
        let mut fs = FilterSet::new();
        fs.add_interval(0, FOREVER).unwrap();
        fs.add_rib_period(3600).unwrap();
        let d1 = InputDescriptor::new("u", DumpType::Rib, "rrc00", "riperis", 1000, 1000);
        let d2 = InputDescriptor::new("u", DumpType::Rib, "rrc00", "riperis", 1800, 1800);
        let d3 = InputDescriptor::new("u", DumpType::Rib, "rrc00", "riperis", 5000, 5000);
        assert!(fs.coarse_match(&d1));
        assert!(!fs.coarse_match(&d2));
        assert!(fs.coarse_match(&d3));
    }

    #[test]
    fn frozen_filter_set_rejects_mutation() {
        let mut fs = FilterSet::new();
        fs.freeze();
        assert!(matches!(
            fs.add_collector("rrc00"),
            Err(ParserError::InvalidState(_))
        ));
    }
}
