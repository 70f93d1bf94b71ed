//! OHLC response decoding and error classification.

use candle_sync_core::{Candle, FetchPage, SyncError};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::pairs::resolve_payload;

/// Raw `{error, result}` envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<Map<String, Value>>,
}

/// Map one upstream error string into the taxonomy.
///
/// Throttling and service-side failures may clear on retry; anything else
/// (bad pair, bad arguments, auth) will fail the same way again.
#[must_use]
pub fn classify_api_error(message: &str) -> SyncError {
    let lower = message.to_ascii_lowercase();
    if lower.starts_with("eapi:rate limit exceeded") || lower.starts_with("egeneral:too many requests")
    {
        return SyncError::throttled(None);
    }
    if lower.starts_with("eservice:") || lower.starts_with("egeneral:internal error") {
        return SyncError::transient(format!("kraken: {message}"));
    }
    SyncError::permanent(format!("kraken: {message}"))
}

/// Map a non-success HTTP status.
#[must_use]
pub fn classify_status(status: u16, retry_after_ms: Option<u64>, body: &str) -> SyncError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        429 => SyncError::throttled(retry_after_ms),
        500..=599 => SyncError::transient(format!("HTTP {status}: {snippet}")),
        _ => SyncError::permanent(format!("HTTP {status}: {snippet}")),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `[time, open, high, low, close, vwap, volume, count]`; the last three may
/// be null or absent.
fn parse_row(row: &Value, pair: &str, timeframe_minutes: u32) -> Option<Candle> {
    let cells = row.as_array()?;
    let time = as_i64(cells.first()?)?;
    let open = as_f64(cells.get(1)?)?;
    let high = as_f64(cells.get(2)?)?;
    let low = as_f64(cells.get(3)?)?;
    let close = as_f64(cells.get(4)?)?;
    let vwap = cells.get(5).and_then(as_f64).unwrap_or(0.0);
    let volume = cells.get(6).and_then(as_f64).unwrap_or(0.0);
    let trade_count = cells
        .get(7)
        .and_then(as_i64)
        .and_then(|c| u64::try_from(c).ok())
        .unwrap_or(0);
    let candle = Candle {
        pair: pair.to_string(),
        timeframe_minutes,
        time,
        open,
        high,
        low,
        close,
        vwap,
        volume,
        trade_count,
    };
    candle.is_aligned().then_some(candle)
}

/// Decode a successful response body into a page of `pair` candles.
///
/// Rows carry the requested pair, whatever key Kraken answered under.
/// Malformed and off-grid rows are dropped. A `last` of zero or none means
/// no continuation.
///
/// # Errors
/// An undecodable body is `TransientFetch`; entries of the `error` array are
/// classified with [`classify_api_error`]; a result that holds other pairs
/// but not `pair` is `PermanentFetch`.
pub fn parse_ohlc(body: &str, pair: &str, timeframe_minutes: u32) -> Result<FetchPage, SyncError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| SyncError::transient(format!("undecodable kraken response: {e}")))?;

    // `W...` entries are warnings.
    if let Some(first) = envelope.error.iter().find(|e| e.starts_with('E')) {
        return Err(classify_api_error(first));
    }

    let Some(result) = envelope.result else {
        return Ok(FetchPage::empty());
    };
    let continuation = result.get("last").and_then(as_i64).filter(|&t| t > 0);

    let Some(payload) = resolve_payload(&result, pair) else {
        let keys: Vec<&str> = result
            .keys()
            .map(String::as_str)
            .filter(|k| !k.eq_ignore_ascii_case("last"))
            .take(5)
            .collect();
        if keys.is_empty() {
            return Ok(FetchPage::new(Vec::new(), continuation));
        }
        return Err(SyncError::permanent(format!(
            "kraken returned no rows for {pair}; keys: {}",
            keys.join(", ")
        )));
    };

    let raw = payload.as_array().map_or(&[][..], Vec::as_slice);
    let mut rows: Vec<Candle> = Vec::with_capacity(raw.len());
    for row in raw {
        match parse_row(row, pair, timeframe_minutes) {
            Some(candle) => rows.push(candle),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(pair, row = %row, "skipping malformed ohlc row");
            }
        }
    }
    rows.sort_by_key(|c| c.time);
    rows.dedup_by_key(|c| c.time);
    Ok(FetchPage::new(rows, continuation))
}
