//! Provenance-based freshness evaluation.

use std::time::Duration;

use sw_core::DEFAULT_TTL;

use crate::store::CachedEntry;

/// Outcome of evaluating a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within the TTL.
    Fresh { age_ms: u64 },
    /// At or past the TTL.
    Stale { age_ms: u64 },
    /// Nothing cached.
    Missing,
    /// Cached, but the provenance stamp is absent or unreadable.
    Unstamped,
}

impl Freshness {
    /// Whether the entry may be served.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}

/// Decides whether a cached entry is still valid under a fixed TTL.
///
/// Total: malformed stamps are reported as [`Freshness::Unstamped`],
/// never as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessEvaluator {
    ttl: Duration,
}

impl Default for FreshnessEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FreshnessEvaluator {
    /// Create an evaluator with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Classify a lookup result at `now_millis`.
    pub fn evaluate(&self, entry: Option<&CachedEntry>, now_millis: u64) -> Freshness {
        let Some(entry) = entry else {
            return Freshness::Missing;
        };
        let Some(fetched_on) = entry.fetched_on().and_then(parse_timestamp) else {
            return Freshness::Unstamped;
        };

        let age_ms = now_millis.saturating_sub(fetched_on as u64);
        let expires_at = fetched_on + self.ttl.as_millis() as f64;

        if expires_at > now_millis as f64 {
            Freshness::Fresh { age_ms }
        } else {
            Freshness::Stale { age_ms }
        }
    }

    /// True iff an entry exists, carries a readable stamp `t`, and `t + ttl > now`.
    pub fn is_valid(&self, entry: Option<&CachedEntry>, now_millis: u64) -> bool {
        self.evaluate(entry, now_millis).is_fresh()
    }
}

/// Parse a provenance stamp. Non-numeric and non-finite values are rejected.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderName;
    use http::HeaderValue;
    use sw_core::{header_names, ApiResponse};

    const HOUR: u64 = 60 * 60 * 1000;
    const NOW: u64 = 1_700_000_000_000;

    fn entry_with_stamp(raw: &'static str) -> CachedEntry {
        CachedEntry::new(ApiResponse::ok("{}").with_header(
            HeaderName::from_static(header_names::X_SW_API_FETCHED_ON),
            HeaderValue::from_static(raw),
        ))
    }

    #[test]
    fn test_missing_entry() {
        let evaluator = FreshnessEvaluator::default();
        assert_eq!(evaluator.evaluate(None, NOW), Freshness::Missing);
        assert!(!evaluator.is_valid(None, NOW));
    }

    #[test]
    fn test_unstamped_entry() {
        let evaluator = FreshnessEvaluator::default();
        let entry = CachedEntry::new(ApiResponse::ok("{}"));

        assert_eq!(evaluator.evaluate(Some(&entry), NOW), Freshness::Unstamped);
    }

    #[test]
    fn test_malformed_stamps_are_invalid() {
        let evaluator = FreshnessEvaluator::default();

        for raw in ["", "abc", "NaN", "inf", "12abc", "0x10"] {
            let entry = entry_with_stamp(raw);
            assert_eq!(
                evaluator.evaluate(Some(&entry), NOW),
                Freshness::Unstamped,
                "stamp {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_ttl_boundary() {
        let evaluator = FreshnessEvaluator::new(Duration::from_millis(2 * HOUR));
        let entry = CachedEntry::stamped(ApiResponse::ok("{}"), NOW);

        assert!(evaluator.is_valid(Some(&entry), NOW));
        assert!(evaluator.is_valid(Some(&entry), NOW + 2 * HOUR - 1));
        assert!(!evaluator.is_valid(Some(&entry), NOW + 2 * HOUR));
        assert!(!evaluator.is_valid(Some(&entry), NOW + 2 * HOUR + 1));
    }

    #[test]
    fn test_age_reporting() {
        let evaluator = FreshnessEvaluator::default();
        let entry = CachedEntry::stamped(ApiResponse::ok("{}"), NOW - HOUR / 2);

        assert_eq!(
            evaluator.evaluate(Some(&entry), NOW),
            Freshness::Fresh { age_ms: HOUR / 2 }
        );

        let old = CachedEntry::stamped(ApiResponse::ok("{}"), NOW - 3 * HOUR);
        assert_eq!(
            evaluator.evaluate(Some(&old), NOW),
            Freshness::Stale { age_ms: 3 * HOUR }
        );
    }

    #[test]
    fn test_fractional_and_padded_stamps() {
        let evaluator = FreshnessEvaluator::new(Duration::from_millis(HOUR));

        let entry = entry_with_stamp(" 1700000000000.5 ");
        assert!(evaluator.is_valid(Some(&entry), NOW));
    }

    #[test]
    fn test_future_stamp_is_fresh() {
        let evaluator = FreshnessEvaluator::default();
        let entry = CachedEntry::stamped(ApiResponse::ok("{}"), NOW + HOUR);

        assert_eq!(evaluator.evaluate(Some(&entry), NOW), Freshness::Fresh { age_ms: 0 });
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1700000000000"), Some(1_700_000_000_000.0));
        assert_eq!(parse_timestamp("abc"), None);
        assert_eq!(parse_timestamp("-inf"), None);
    }
}
