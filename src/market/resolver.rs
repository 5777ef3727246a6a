//! Active session tracking with bounded refresh and a per-session benchmark cache

use super::{session_slug, session_window_start, BenchmarkSource, MarketSession, SessionLookup};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Resolves the current market window and caches it between refreshes
pub struct SessionResolver {
    lookup: Arc<dyn SessionLookup>,
    benchmarks: Arc<dyn BenchmarkSource>,
    slug_prefix: String,
    window_secs: i64,
    refresh_interval: Duration,
    cached: Option<MarketSession>,
    last_refresh: Option<DateTime<Utc>>,
}

impl SessionResolver {
    pub fn new(
        lookup: Arc<dyn SessionLookup>,
        benchmarks: Arc<dyn BenchmarkSource>,
        slug_prefix: impl Into<String>,
        window_secs: i64,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            lookup,
            benchmarks,
            slug_prefix: slug_prefix.into(),
            window_secs,
            refresh_interval,
            cached: None,
            last_refresh: None,
        }
    }

    pub fn current_session_id(&self, now: DateTime<Utc>) -> i64 {
        session_window_start(now.timestamp(), self.window_secs)
    }

    pub fn next_session_id(&self, now: DateTime<Utc>) -> i64 {
        self.current_session_id(now) + self.window_secs
    }

    /// Try the current window, then the next one
    pub async fn resolve_active(&self, now: DateTime<Utc>) -> anyhow::Result<Option<MarketSession>> {
        for window_start in [self.current_session_id(now), self.next_session_id(now)] {
            let slug = session_slug(&self.slug_prefix, window_start);
            if let Some(session) = self.lookup.fetch_session(&slug, window_start, now).await? {
                if session.remaining_secs(now) > 0 {
                    return Ok(Some(session));
                }
            }
        }
        Ok(None)
    }

    /// Return the active session as of `now`
    ///
    /// Network lookups only happen when the refresh interval has elapsed, no
    /// session is cached, or the cached session has ended. Between refreshes
    /// the cached session is returned and remaining time is computed locally.
    /// A failed lookup keeps a still-open cached session.
    pub async fn poll(&mut self, now: DateTime<Utc>) -> Option<MarketSession> {
        if let Some(session) = &self.cached {
            if session.remaining_secs(now) <= 0 {
                tracing::info!(slug = %session.slug, "Session ended, forcing refresh");
                self.cached = None;
            }
        }

        let due = match (&self.cached, self.last_refresh) {
            (None, _) | (_, None) => true,
            (Some(_), Some(last)) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed >= self.refresh_interval)
                .unwrap_or(false),
        };

        if due {
            self.refresh(now).await;
        }

        self.cached.clone()
    }

    async fn refresh(&mut self, now: DateTime<Utc>) {
        self.last_refresh = Some(now);

        match self.resolve_active(now).await {
            Ok(Some(mut session)) => {
                match &self.cached {
                    Some(previous) if previous.slug == session.slug => {
                        session.benchmark = previous.benchmark;
                    }
                    _ => {
                        tracing::info!(
                            slug = %session.slug,
                            remaining = session.remaining_secs(now),
                            "Found active market"
                        );
                    }
                }
                self.cached = Some(session);
            }
            Ok(None) => {
                if self.cached.take().is_some() {
                    tracing::warn!("No active market in current or next window");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Market lookup failed");
            }
        }

        if let Some(session) = self.cached.as_mut() {
            if session.benchmark.is_none() {
                match self.benchmarks.fetch_benchmark(session).await {
                    Ok(Some(price)) => {
                        tracing::info!(slug = %session.slug, benchmark = %price, "Benchmark price fixed");
                        session.benchmark = Some(price);
                    }
                    Ok(None) => {
                        tracing::debug!(slug = %session.slug, "Benchmark not published yet");
                    }
                    Err(e) => {
                        tracing::warn!(slug = %session.slug, error = %e, "Benchmark lookup failed");
                    }
                }
            }
        }
    }

    /// Drop the cached session and its benchmark
    pub fn reset(&mut self) {
        self.cached = None;
        self.last_refresh = None;
    }

    pub fn session(&self) -> Option<&MarketSession> {
        self.cached.as_ref()
    }

    pub fn benchmark(&self) -> Option<Decimal> {
        self.cached.as_ref().and_then(|s| s.benchmark)
    }

    /// Remaining seconds of the cached session, computed locally
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.cached.as_ref().map(|s| s.remaining_secs(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    const WINDOW: i64 = 900;
    const T0: i64 = 1_767_638_700;

    #[derive(Default)]
    struct ScriptedLookup {
        sessions: Mutex<HashMap<String, MarketSession>>,
        calls: Mutex<Vec<String>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl SessionLookup for ScriptedLookup {
        async fn fetch_session(
            &self,
            slug: &str,
            _window_start: i64,
            now: DateTime<Utc>,
        ) -> anyhow::Result<Option<MarketSession>> {
            self.calls.lock().push(slug.to_string());
            if *self.fail.lock() {
                anyhow::bail!("connection reset");
            }
            Ok(self
                .sessions
                .lock()
                .get(slug)
                .filter(|s| s.remaining_secs(now) > 0)
                .cloned())
        }
    }

    #[derive(Default)]
    struct ScriptedBenchmark {
        price: Mutex<Option<Decimal>>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl BenchmarkSource for ScriptedBenchmark {
        async fn fetch_benchmark(&self, _session: &MarketSession) -> anyhow::Result<Option<Decimal>> {
            *self.calls.lock() += 1;
            Ok(*self.price.lock())
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    fn session(window_start: i64) -> MarketSession {
        MarketSession {
            slug: session_slug("btc-updown-15m", window_start),
            window_start,
            start_time: at(window_start),
            end_time: at(window_start + WINDOW),
            up_token: format!("up-{window_start}"),
            down_token: format!("down-{window_start}"),
            condition_id: None,
            up_price: None,
            down_price: None,
            benchmark: None,
        }
    }

    fn resolver(
        lookup: Arc<ScriptedLookup>,
        bench: Arc<ScriptedBenchmark>,
    ) -> SessionResolver {
        SessionResolver::new(lookup, bench, "btc-updown-15m", WINDOW, Duration::from_secs(5))
    }

    #[test]
    fn test_session_ids() {
        let r = resolver(Arc::default(), Arc::default());
        assert_eq!(r.current_session_id(at(T0 + 450)), T0);
        assert_eq!(r.next_session_id(at(T0 + 450)), T0 + WINDOW);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_window() {
        let lookup = Arc::new(ScriptedLookup::default());
        lookup
            .sessions
            .lock()
            .insert(session(T0 + WINDOW).slug.clone(), session(T0 + WINDOW));

        let r = resolver(lookup.clone(), Arc::default());
        let found = r.resolve_active(at(T0 + 10)).await.unwrap().unwrap();
        assert_eq!(found.window_start, T0 + WINDOW);
        assert_eq!(lookup.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_caches_between_refreshes() {
        let lookup = Arc::new(ScriptedLookup::default());
        lookup.sessions.lock().insert(session(T0).slug.clone(), session(T0));
        let bench = Arc::new(ScriptedBenchmark::default());
        *bench.price.lock() = Some(dec!(97000));

        let mut r = resolver(lookup.clone(), bench.clone());
        let s = r.poll(at(T0 + 100)).await.unwrap();
        assert_eq!(s.benchmark, Some(dec!(97000)));
        assert_eq!(lookup.calls.lock().len(), 1);

        // Within the refresh interval: no I/O, remaining computed locally
        r.poll(at(T0 + 103)).await.unwrap();
        assert_eq!(lookup.calls.lock().len(), 1);
        assert_eq!(r.remaining(at(T0 + 103)), Some(WINDOW - 103));

        // Refresh keeps the cached benchmark and does not re-fetch it
        r.poll(at(T0 + 106)).await.unwrap();
        assert_eq!(lookup.calls.lock().len(), 2);
        assert_eq!(*bench.calls.lock(), 1);
        assert_eq!(r.benchmark(), Some(dec!(97000)));
    }

    #[tokio::test]
    async fn test_missing_benchmark_retried_on_refresh() {
        let lookup = Arc::new(ScriptedLookup::default());
        lookup.sessions.lock().insert(session(T0).slug.clone(), session(T0));
        let bench = Arc::new(ScriptedBenchmark::default());

        let mut r = resolver(lookup, bench.clone());
        assert!(r.poll(at(T0 + 1)).await.unwrap().benchmark.is_none());
        r.poll(at(T0 + 2)).await;
        assert_eq!(*bench.calls.lock(), 1);

        *bench.price.lock() = Some(dec!(96500));
        let s = r.poll(at(T0 + 7)).await.unwrap();
        assert_eq!(s.benchmark, Some(dec!(96500)));
        assert_eq!(*bench.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_rollover_resets_benchmark() {
        let lookup = Arc::new(ScriptedLookup::default());
        lookup.sessions.lock().insert(session(T0).slug.clone(), session(T0));
        lookup
            .sessions
            .lock()
            .insert(session(T0 + WINDOW).slug.clone(), session(T0 + WINDOW));
        let bench = Arc::new(ScriptedBenchmark::default());
        *bench.price.lock() = Some(dec!(97000));

        let mut r = resolver(lookup, bench.clone());
        r.poll(at(T0 + 890)).await.unwrap();
        *bench.price.lock() = None;

        // Cached session ends: refresh is forced immediately
        let next = r.poll(at(T0 + WINDOW + 1)).await.unwrap();
        assert_eq!(next.window_start, T0 + WINDOW);
        assert!(next.benchmark.is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_open_session() {
        let lookup = Arc::new(ScriptedLookup::default());
        lookup.sessions.lock().insert(session(T0).slug.clone(), session(T0));
        let mut r = resolver(lookup.clone(), Arc::default());

        r.poll(at(T0 + 10)).await.unwrap();
        *lookup.fail.lock() = true;
        let s = r.poll(at(T0 + 20)).await;
        assert_eq!(s.map(|s| s.window_start), Some(T0));
    }

    #[tokio::test]
    async fn test_no_session_when_windows_absent() {
        let lookup = Arc::new(ScriptedLookup::default());
        let mut r = resolver(lookup, Arc::default());
        assert!(r.poll(at(T0)).await.is_none());
        assert!(r.remaining(at(T0)).is_none());
    }
}
