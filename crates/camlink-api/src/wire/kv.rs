// ── Key/value line codec ──
//
// CGI endpoints answer with `key=value` lines, often under a common
// prefix (`table.`, `root.`) that carries no information.

use crate::fields::{FieldBag, FieldValue};

/// Parse `key=value` lines. Lines without `=` are ignored; keys lose
/// `strip_prefix` when present.
pub fn parse(body: &str, strip_prefix: Option<&str>) -> FieldBag {
    let mut bag = FieldBag::new();
    for line in body.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let key = strip_prefix
            .and_then(|p| key.strip_prefix(p))
            .unwrap_or(key);
        if key.is_empty() {
            continue;
        }
        bag.insert(key, FieldValue::Text(value.trim().to_owned()));
    }
    bag
}

/// Body reports an error rather than data (`Error`, `Error: ...`,
/// `# Error: ...`).
pub fn error_message(body: &str) -> Option<String> {
    let first = body.lines().map(str::trim).find(|l| !l.is_empty())?;
    let rest = first.trim_start_matches('#').trim_start();
    if rest.get(..5).is_some_and(|head| head.eq_ignore_ascii_case("error")) {
        let detail = rest[5..].trim_start_matches(':').trim();
        return Some(if detail.is_empty() {
            "Error".to_owned()
        } else {
            detail.to_owned()
        });
    }
    None
}

/// Whether a write endpoint acknowledged with `OK`.
pub fn is_ok(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case("ok")
}
