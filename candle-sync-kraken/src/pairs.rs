//! Pair-key resolution.
//!
//! Kraken answers an OHLC request for `ETHUSD` under its own asset code
//! (`XETHZUSD`). These helpers normalize both spellings to a common form and
//! locate the payload in the `result` object.

use serde_json::{Map, Value};

/// Quote currencies, longest spelling first within each family.
pub const KNOWN_QUOTE_SUFFIXES: &[&str] = &[
    "ZUSDT", "USDT", "ZUSDC", "USDC", "ZUSD", "USD", "ZEUR", "EUR", "ZGBP", "GBP", "ZJPY", "JPY",
    "ZCAD", "CAD", "ZCHF", "CHF", "ZETH", "ETH", "ZBTC", "BTC", "XXBT", "XBT",
];

/// Uppercase and strip leading `X`/`Z` asset-class markers.
///
/// Codes of three characters or fewer are never trimmed.
#[must_use]
pub fn normalize_asset_code(code: &str) -> String {
    let mut code = code.trim().to_ascii_uppercase();
    while code.len() > 3 && (code.starts_with('X') || code.starts_with('Z')) {
        code.remove(0);
    }
    code
}

/// Split a pair into base and quote.
///
/// The longest known quote suffix that leaves a non-empty base wins;
/// otherwise the last three characters are taken as the quote.
#[must_use]
pub fn split_pair(pair: &str) -> (String, String) {
    let upper = pair.trim().to_ascii_uppercase();
    let mut suffixes: Vec<&str> = KNOWN_QUOTE_SUFFIXES.to_vec();
    suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for suffix in suffixes {
        match upper.strip_suffix(suffix) {
            Some(base) if !base.is_empty() => return (base.to_string(), suffix.to_string()),
            _ => {}
        }
    }
    if upper.len() > 3 {
        let (base, quote) = upper.split_at(upper.len() - 3);
        (base.to_string(), quote.to_string())
    } else {
        (upper, String::new())
    }
}

/// Canonical comparison form of a pair: both assets normalized.
#[must_use]
pub fn normalize_pair_key(pair: &str) -> String {
    let upper = pair.trim().to_ascii_uppercase();
    if upper.len() < 6 {
        return upper;
    }
    let (base, quote) = split_pair(&upper);
    format!(
        "{}{}",
        normalize_asset_code(&base),
        normalize_asset_code(&quote)
    )
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

fn base_variants(base: &str) -> Vec<String> {
    let core = base.split('.').next().unwrap_or(base);
    let mut out = Vec::new();
    for v in [
        core.to_string(),
        format!("X{core}"),
        format!("Z{core}"),
        format!("XX{core}"),
        base.to_string(),
        format!("X{base}"),
        format!("Z{base}"),
    ] {
        push_unique(&mut out, v);
    }
    if base.len() > 3 && (base.starts_with('X') || base.starts_with('Z')) {
        let trimmed = &base[1..];
        for v in [
            trimmed.to_string(),
            format!("X{trimmed}"),
            format!("Z{trimmed}"),
        ] {
            push_unique(&mut out, v);
        }
    }
    out
}

fn quote_variants(quote: &str) -> Vec<String> {
    let mut out = Vec::new();
    push_unique(&mut out, quote.to_string());
    push_unique(&mut out, format!("Z{quote}"));
    if quote.len() > 3 && (quote.starts_with('X') || quote.starts_with('Z')) {
        let trimmed = &quote[1..];
        push_unique(&mut out, trimmed.to_string());
        push_unique(&mut out, format!("Z{trimmed}"));
    }
    out
}

/// Result keys Kraken may use for `pair`, most likely first.
///
/// The requested spelling always comes first.
#[must_use]
pub fn candidate_keys(pair: &str) -> Vec<String> {
    let upper = pair.trim().to_ascii_uppercase();
    let (base, quote) = split_pair(&upper);
    let mut out = vec![upper];
    for b in base_variants(&base) {
        for q in quote_variants(&quote) {
            push_unique(&mut out, format!("{b}{q}"));
        }
    }
    out
}

/// Locate the row array of `pair` inside a `result` object.
///
/// The `last` marker is never a candidate. Exact candidate keys are tried
/// first, then any key that normalizes to the same pair.
#[must_use]
pub fn resolve_payload<'a>(result: &'a Map<String, Value>, pair: &str) -> Option<&'a Value> {
    let target = normalize_pair_key(pair);
    for key in candidate_keys(pair) {
        if key.eq_ignore_ascii_case("last") {
            continue;
        }
        if normalize_pair_key(&key) != target {
            continue;
        }
        if let Some(value) = result.get(&key) {
            return Some(value);
        }
    }
    result
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case("last"))
        .find(|(key, _)| normalize_pair_key(key) == target)
        .map(|(_, value)| value)
}
