//! One fetch/loading/error capability shared by every page-level query, with a TTL cache in
//! front of the content API.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

use crate::storage::{current_epoch, MemoryStorage, Storage};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool { matches!(self, LoadState::Loading) }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadState<U> {
        match self {
            LoadState::Loading => LoadState::Loading,
            LoadState::Ready(v) => LoadState::Ready(f(v)),
            LoadState::Failed(e) => LoadState::Failed(e),
        }
    }
}

impl<T> From<Result<T>> for LoadState<T> {
    fn from(r: Result<T>) -> Self {
        match r {
            Ok(v) => LoadState::Ready(v),
            Err(e) => LoadState::Failed(format!("{e:#}")),
        }
    }
}

/// Caches successful payloads as JSON under caller-chosen keys.
pub struct Loader<S: Storage = MemoryStorage> {
    storage: S,
    ttl_secs: i64,
}

impl<S: Storage> Loader<S> {
    pub fn new(storage: S, ttl_secs: i64) -> Self { Self { storage, ttl_secs } }

    pub fn storage(&self) -> &S { &self.storage }

    /// Cached value if fresh, else `fetch` with write-through. Cache read/write failures are
    /// logged and otherwise ignored.
    pub async fn try_load<T, F, Fut>(&self, key: &str, refresh: bool, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let now = current_epoch();
        if !refresh {
            match self.storage.get_cache(key, now).await {
                Ok(Some(payload)) => match serde_json::from_str::<T>(&payload) {
                    Ok(v) => {
                        tracing::debug!(key, "cache hit");
                        return Ok(v);
                    }
                    Err(e) => tracing::warn!(key, error = %e, "discarding undecodable cache entry"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(key, error = %e, "cache read failed"),
            }
        }
        let value = fetch().await?;
        match serde_json::to_string(&value) {
            Ok(payload) => {
                if let Err(e) = self.storage.put_cache(key, &payload, now.saturating_add(self.ttl_secs)).await {
                    tracing::warn!(key, error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "value not cacheable"),
        }
        Ok(value)
    }

    /// Same as [`Loader::try_load`], folded into a [`LoadState`].
    pub async fn load<T, F, Fut>(&self, key: &str, refresh: bool, fetch: F) -> LoadState<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let state: LoadState<T> = self.try_load(key, refresh, fetch).await.into();
        if let LoadState::Failed(e) = &state {
            tracing::warn!(key, error = %e, "load failed");
        }
        state
    }

    pub async fn invalidate(&self, prefix: Option<&str>) -> Result<u64> {
        self.storage.clear_cache_prefix(prefix).await
    }
}

/// `<scope>|<normalized query>|<params as json>`
pub fn cache_key(scope: &str, groq: &str, params: &[(&str, serde_json::Value)]) -> String {
    let params: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}|{}|{}", scope, norm_query(groq), params.join("&"))
}

fn norm_query(q: &str) -> String {
    let t = q.trim();
    let mut o = String::with_capacity(t.len());
    let mut s = false;
    for c in t.chars() {
        if c.is_whitespace() {
            if !s { o.push(' '); s = true; }
        } else {
            o.push(c); s = false;
        }
    }
    o
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let loader = Loader::new(MemoryStorage::new(), 60);
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let v: Vec<String> = loader
                .try_load("services|q|", false, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["web".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(v, vec!["web"]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_bypasses_cache() {
        let loader = Loader::new(MemoryStorage::new(), 60);
        let calls = AtomicUsize::new(0);
        for refresh in [false, true] {
            let _: u32 = loader
                .try_load("k", refresh, || async {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) as u32)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_become_failed_state_and_are_not_cached() {
        let loader = Loader::new(MemoryStorage::new(), 60);
        let state: LoadState<u32> = loader.load("k", false, || async { Err(anyhow!("503 from API")) }).await;
        assert_eq!(state.error(), Some("503 from API"));
        assert!(loader.storage().is_empty());

        let state: LoadState<u32> = loader.load("k", false, || async { Ok(7) }).await;
        assert_eq!(state.data(), Some(&7));
    }

    #[tokio::test]
    async fn zero_ttl_never_hits() {
        let loader = Loader::new(MemoryStorage::new(), 0);
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let _: u8 = loader.try_load("k", false, || async { calls.fetch_add(1, Ordering::SeqCst); Ok(1) }).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn huge_ttl_saturates() {
        let loader = Loader::new(MemoryStorage::new(), i64::MAX);
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let v: u8 = loader.try_load("k", false, || async { calls.fetch_add(1, Ordering::SeqCst); Ok(1) }).await.unwrap();
            assert_eq!(v, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keys_normalize_whitespace_and_include_params() {
        let k = cache_key("project", "  *[slug == $slug]\n   {  title }", &[("slug", serde_json::json!("a"))]);
        assert_eq!(k, "project|*[slug == $slug] { title }|slug=\"a\"");
    }

    #[test]
    fn load_state_helpers() {
        let s: LoadState<u8> = LoadState::Loading;
        assert!(s.is_loading());
        assert_eq!(LoadState::Ready(2).map(|v: u8| v * 2), LoadState::Ready(4));
    }
}
