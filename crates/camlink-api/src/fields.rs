// ── Field bags and the candidate-key resolver ──
//
// Every wire codec flattens a response into a `FieldBag`: string keys
// (dotted paths, `[i]` indices, `@attr` for XML attributes) mapped to
// scalar values. Canonical fields are then pulled out by trying an ordered
// list of candidate keys, exact matches first, case-insensitive second.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

use crate::units;

/// A scalar decoded from a device response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    /// Whitespace-only text counts as absent.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) if *n >= 0.0 && n.fract() == 0.0 => format!("{n:.0}").parse().ok(),
            Self::Number(_) | Self::Bool(_) => None,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<u64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                        .and_then(|f| format!("{f:.0}").parse().ok())
                })
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) => Some(*n != 0.0),
            Self::Text(s) => parse_flag(s),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s.trim()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{n:.0}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Flat key -> scalar map produced by a wire codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldBag {
    entries: BTreeMap<String, FieldValue>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Insert only if the key is not present yet.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.entries.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another bag in; keys already present are kept.
    pub fn merge(&mut self, other: FieldBag) {
        for (key, value) in other.entries {
            self.entries.entry(key).or_insert(value);
        }
    }

    /// Merge another bag in under `prefix.`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: FieldBag) {
        for (key, value) in other.entries {
            self.entries
                .entry(format!("{prefix}.{key}"))
                .or_insert(value);
        }
    }
}

impl AsRef<FieldBag> for FieldBag {
    fn as_ref(&self) -> &FieldBag {
        self
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

// ── Resolver ────────────────────────────────────────────────────────

/// First non-blank value among `candidates`.
///
/// Pass one tries every candidate by exact key; pass two retries them
/// case-insensitively. An exact match on a later candidate therefore
/// beats a case-insensitive match on an earlier one.
pub fn lookup<'a>(bag: &'a FieldBag, candidates: &[&str]) -> Option<&'a FieldValue> {
    for key in candidates {
        if let Some(value) = bag.get(key).filter(|v| !v.is_blank()) {
            return Some(value);
        }
    }
    for key in candidates {
        let found = bag
            .iter()
            .filter(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_blank())
            .map(|(_, v)| v)
            .next();
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Resolve to text, or `default` when nothing matches.
pub fn resolve(bag: &FieldBag, candidates: &[&str], default: &str) -> String {
    lookup_text(bag, candidates).unwrap_or_else(|| default.to_owned())
}

pub fn lookup_text(bag: &FieldBag, candidates: &[&str]) -> Option<String> {
    lookup(bag, candidates).map(ToString::to_string)
}

pub fn lookup_u64(bag: &FieldBag, candidates: &[&str]) -> Option<u64> {
    lookup(bag, candidates).and_then(FieldValue::as_u64)
}

pub fn lookup_bool(bag: &FieldBag, candidates: &[&str]) -> Option<bool> {
    lookup(bag, candidates).and_then(FieldValue::as_bool)
}

/// Trimmed text, or `default`.
pub fn resolve_text(bag: &FieldBag, candidates: &[&str], default: &str) -> String {
    lookup_text(bag, candidates).map_or_else(|| default.to_owned(), |v| v.trim().to_owned())
}

/// Unsigned integer, or `default` when absent or unparseable.
pub fn resolve_u64(bag: &FieldBag, candidates: &[&str], default: u64) -> u64 {
    lookup_u64(bag, candidates).unwrap_or(default)
}

/// Boolean in any spelling [`parse_flag`] accepts, or `default`.
pub fn resolve_bool(bag: &FieldBag, candidates: &[&str], default: bool) -> bool {
    lookup_bool(bag, candidates).unwrap_or(default)
}

/// Interpret the usual device spellings of a boolean.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enable" | "enabled" => Some(true),
        "false" | "0" | "no" | "off" | "disable" | "disabled" => Some(false),
        _ => None,
    }
}

// ── Change detection ────────────────────────────────────────────────

/// How a current value is compared against a desired one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Trimmed, case-insensitive text.
    Text,
    /// IP addresses compared parsed, falling back to text.
    Address,
    /// Subnet masks compared as prefix lengths (mask or prefix on either side).
    Mask,
    /// Boolean spellings compared as booleans.
    Flag,
}

/// One field a write wants to set, and where to find its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredField {
    pub name: &'static str,
    /// Candidate keys in the current-config bag. The first is also the
    /// key vendors write back to.
    pub keys: Vec<String>,
    pub desired: String,
    pub comparison: Comparison,
}

impl DesiredField {
    pub fn new(
        name: &'static str,
        keys: &[&str],
        desired: impl Into<String>,
        comparison: Comparison,
    ) -> Self {
        Self {
            name,
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            desired: desired.into(),
            comparison,
        }
    }

    pub fn primary_key(&self) -> &str {
        self.keys.first().map_or("", String::as_str)
    }
}

/// A field whose current value differs from the desired one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub key: String,
    pub current: Option<String>,
    pub desired: String,
}

/// Whether `field` needs writing. Absent current values always do.
pub fn has_changed(bag: &FieldBag, field: &DesiredField) -> bool {
    let keys: Vec<&str> = field.keys.iter().map(String::as_str).collect();
    let Some(current) = lookup_text(bag, &keys) else {
        return true;
    };
    !values_match(&current, &field.desired, field.comparison)
}

/// Every field in `fields` that needs writing, in input order.
pub fn diff(bag: &FieldBag, fields: &[DesiredField]) -> Vec<FieldChange> {
    fields
        .iter()
        .filter(|f| has_changed(bag, f))
        .map(|f| {
            let keys: Vec<&str> = f.keys.iter().map(String::as_str).collect();
            FieldChange {
                field: f.name.to_owned(),
                key: f.primary_key().to_owned(),
                current: lookup_text(bag, &keys),
                desired: f.desired.clone(),
            }
        })
        .collect()
}

fn values_match(current: &str, desired: &str, comparison: Comparison) -> bool {
    let (current, desired) = (current.trim(), desired.trim());
    match comparison {
        Comparison::Text => current.eq_ignore_ascii_case(desired),
        Comparison::Address => match (current.parse::<IpAddr>(), desired.parse::<IpAddr>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => current.eq_ignore_ascii_case(desired),
        },
        Comparison::Mask => {
            units::mask_to_prefix_length(current) == units::mask_to_prefix_length(desired)
        }
        Comparison::Flag => match (parse_flag(current), parse_flag(desired)) {
            (Some(a), Some(b)) => a == b,
            _ => current.eq_ignore_ascii_case(desired),
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn bag(pairs: &[(&str, &str)]) -> FieldBag {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn exact_match_on_later_candidate_beats_case_insensitive_earlier() {
        let b = bag(&[("IPADDRESS", "10.0.0.1"), ("ip", "10.0.0.2")]);
        assert_eq!(resolve(&b, &["ipAddress", "ip"], "-"), "10.0.0.2");
    }

    #[test]
    fn case_insensitive_match_used_when_no_exact() {
        let b = bag(&[("IPADDRESS", "10.0.0.1")]);
        assert_eq!(resolve(&b, &["ipAddress", "ip"], "-"), "10.0.0.1");
    }

    #[test]
    fn blank_values_are_skipped() {
        let b = bag(&[("model", "   "), ("deviceModel", "DS-2CD2043")]);
        assert_eq!(resolve(&b, &["model", "deviceModel"], "Unknown"), "DS-2CD2043");
        assert_eq!(resolve(&FieldBag::new(), &["model"], "Unknown"), "Unknown");
    }

    #[test]
    fn earlier_candidate_wins_when_both_present() {
        let b = bag(&[("SubnetMask", "255.255.0.0"), ("mask", "255.255.255.0")]);
        assert_eq!(
            resolve_text(&b, &["mask", "SubnetMask"], ""),
            "255.255.255.0"
        );
        assert_eq!(resolve_u64(&b, &["missing"], 7), 7);
        assert!(resolve_bool(&bag(&[("DhcpEnable", "on")]), &["DhcpEnable"], false));
    }

    #[test]
    fn exact_pass_runs_before_case_insensitive_pass() {
        let b = bag(&[("mask", "255.255.0.0"), ("SubnetMask", "255.255.255.0")]);
        let candidates = ["subnetMask", "mask", "SubnetMask"];
        assert_eq!(resolve(&b, &candidates, ""), "255.255.0.0");

        let only_variant = bag(&[("SubnetMask", "255.255.255.0")]);
        assert_eq!(resolve(&only_variant, &candidates, ""), "255.255.255.0");
        assert_eq!(resolve(&only_variant, &["subnetmask"], ""), "255.255.255.0");
    }

    #[test]
    fn numbers_display_without_fraction() {
        let mut b = FieldBag::new();
        b.insert("prefix", FieldValue::Number(24.0));
        b.insert("fps", FieldValue::Number(12.5));
        assert_eq!(resolve(&b, &["prefix"], ""), "24");
        assert_eq!(resolve(&b, &["fps"], ""), "12.5");
        assert_eq!(lookup_u64(&b, &["prefix"]), Some(24));
        assert_eq!(lookup_u64(&b, &["fps"]), None);
    }

    #[test]
    fn merge_keeps_existing_keys() {
        let mut a = bag(&[("k", "first")]);
        a.merge(bag(&[("k", "second"), ("other", "x")]));
        assert_eq!(resolve(&a, &["k"], ""), "first");
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn mask_comparison_accepts_prefix_on_either_side() {
        let b = bag(&[("prefixLength", "24")]);
        let same = DesiredField::new("mask", &["prefixLength"], "255.255.255.0", Comparison::Mask);
        let other = DesiredField::new("mask", &["prefixLength"], "255.255.0.0", Comparison::Mask);
        assert!(!has_changed(&b, &same));
        assert!(has_changed(&b, &other));
    }

    #[test]
    fn flags_and_addresses_compare_semantically() {
        let b = bag(&[("enabled", "1"), ("ip", "10.0.0.5")]);
        assert!(!has_changed(
            &b,
            &DesiredField::new("on", &["enabled"], "true", Comparison::Flag)
        ));
        assert!(!has_changed(
            &b,
            &DesiredField::new("ip", &["ip"], " 10.0.0.5 ", Comparison::Address)
        ));
    }

    #[test]
    fn diff_reports_missing_and_changed_fields() {
        let b = bag(&[("ip", "10.0.0.5"), ("gw", "10.0.0.1")]);
        let fields = vec![
            DesiredField::new("ip", &["ip"], "10.0.0.5", Comparison::Address),
            DesiredField::new("gateway", &["gw"], "10.0.0.254", Comparison::Address),
            DesiredField::new("dns1", &["dns"], "8.8.8.8", Comparison::Address),
        ];
        let changes = diff(&b, &fields);
        assert_eq!(
            changes,
            vec![
                FieldChange {
                    field: "gateway".into(),
                    key: "gw".into(),
                    current: Some("10.0.0.1".into()),
                    desired: "10.0.0.254".into(),
                },
                FieldChange {
                    field: "dns1".into(),
                    key: "dns".into(),
                    current: None,
                    desired: "8.8.8.8".into(),
                },
            ]
        );
    }
}
