//! Liveness-guarded views
//!
//! A display fetch captures a [`LiveToken`] when it starts. When it finishes,
//! its result is applied to the [`ViewCell`] only if the token is still live.
//! A token dies when its [`ViewScope`] is closed or dropped, or when the
//! scope is invalidated (the viewed participant changed), so a slow response
//! can never overwrite newer state.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct ScopeState {
    closed: AtomicBool,
    generation: AtomicU64,
}

/// Owner of the tokens handed to in-flight fetches
#[derive(Debug, Default)]
pub struct ViewScope {
    state: Arc<ScopeState>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a fetch starting now
    pub fn token(&self) -> LiveToken {
        LiveToken {
            state: self.state.clone(),
            generation: self.state.generation.load(Ordering::SeqCst),
        }
    }

    /// Kill every token issued so far; the scope stays open for new ones
    pub fn invalidate(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Kill every token, past and future
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.close();
    }
}

/// Captured at invocation time by a fetch
#[derive(Debug, Clone)]
pub struct LiveToken {
    state: Arc<ScopeState>,
    generation: u64,
}

impl LiveToken {
    pub fn is_live(&self) -> bool {
        !self.state.closed.load(Ordering::SeqCst)
            && self.state.generation.load(Ordering::SeqCst) == self.generation
    }
}

/// Shared slot a view renders from
#[derive(Debug)]
pub struct ViewCell<T> {
    value: Arc<RwLock<Option<T>>>,
}

impl<T> Clone for ViewCell<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl<T> Default for ViewCell<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(RwLock::new(None)),
        }
    }
}

impl<T: Clone> ViewCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<T> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store `value` if `token` is live; returns whether it was stored
    pub fn apply(&self, token: &LiveToken, value: T) -> bool {
        let mut slot = self.value.write().unwrap_or_else(PoisonError::into_inner);
        // checked under the lock so a close cannot interleave with the write
        if !token.is_live() {
            debug!("Discarding result of a stale fetch");
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Run `fetch` and apply its output with a token taken before it started
    pub async fn load<F>(&self, scope: &ViewScope, fetch: F) -> bool
    where
        F: Future<Output = T>,
    {
        let token = scope.token();
        let value = fetch.await;
        self.apply(&token, value)
    }

    pub fn clear(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn test_apply_while_live() {
        let scope = ViewScope::new();
        let cell = ViewCell::new();
        assert!(cell.apply(&scope.token(), 7u64));
        assert_eq!(cell.get(), Some(7));
    }

    #[test]
    fn test_closed_scope_discards() {
        let scope = ViewScope::new();
        let cell = ViewCell::new();
        let token = scope.token();
        scope.close();
        assert!(!cell.apply(&token, 1u64));
        assert_eq!(cell.get(), None);
        assert!(!scope.token().is_live());
    }

    #[test]
    fn test_invalidate_kills_older_tokens_only() {
        let scope = ViewScope::new();
        let cell = ViewCell::new();
        let old = scope.token();
        scope.invalidate();
        let new = scope.token();

        assert!(!cell.apply(&old, "old"));
        assert!(cell.apply(&new, "new"));
        assert_eq!(cell.get(), Some("new"));
    }

    #[test]
    fn test_dropped_scope_kills_tokens() {
        let token = ViewScope::new().token();
        assert!(!token.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_during_fetch() {
        let cell: ViewCell<u64> = ViewCell::new();
        let scope = ViewScope::new();
        let token = scope.token();
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn({
            let cell = cell.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let applied = cell.apply(&token, 42);
                let _ = tx.send(applied);
            }
        });

        drop(scope);
        task.await.unwrap();
        assert!(!rx.await.unwrap());
        assert_eq!(cell.get(), None);
    }

    #[tokio::test]
    async fn test_load() {
        let scope = ViewScope::new();
        let cell = ViewCell::new();
        assert!(cell.load(&scope, async { vec![1, 2] }).await);
        assert_eq!(cell.get(), Some(vec![1, 2]));
        cell.clear();
        assert_eq!(cell.get(), None);
    }
}
