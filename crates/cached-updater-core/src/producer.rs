//! The producer contract and the value/error pair it yields.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CacheError, CacheResult, ProducerError};

/// Value and error produced by one call to a [`Producer`].
///
/// Both halves are optional and independent: a producer may hand back a
/// partial value together with the error that cut it short. The refreshing
/// cache stores the pair as-is, but a stored error also deactivates it, so
/// readers of `get` are sent to the producer instead. The stored pair stays
/// visible through `RefreshingCache::snapshot`.
pub struct Snapshot<T> {
    value: Option<Arc<T>>,
    error: Option<Arc<ProducerError>>,
}

impl<T> Snapshot<T> {
    /// A successful production.
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            error: None,
        }
    }

    /// A failed production with no value.
    pub fn failed(error: ProducerError) -> Self {
        Self {
            value: None,
            error: Some(Arc::new(error)),
        }
    }

    /// A value accompanied by the error the producer reported alongside it.
    pub fn partial(value: T, error: ProducerError) -> Self {
        Self {
            value: Some(Arc::new(value)),
            error: Some(Arc::new(error)),
        }
    }

    /// Neither value nor error.
    pub fn empty() -> Self {
        Self {
            value: None,
            error: None,
        }
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&Arc<ProducerError>> {
        self.error.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Collapses the pair into a `Result`.
    ///
    /// An error wins over a value; a snapshot with neither maps to
    /// [`CacheError::Empty`].
    pub fn into_result(self) -> CacheResult<Arc<T>> {
        match (self.value, self.error) {
            (_, Some(err)) => Err(CacheError::Producer(err)),
            (Some(value), None) => Ok(value),
            (None, None) => Err(CacheError::Empty),
        }
    }

    /// Splits the snapshot into its two halves.
    pub fn into_parts(self) -> (Option<Arc<T>>, Option<Arc<ProducerError>>) {
        (self.value, self.error)
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Result<T, ProducerError>> for Snapshot<T> {
    fn from(result: Result<T, ProducerError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::failed(err),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("value", &self.value)
            .field("error", &self.error)
            .finish()
    }
}

/// Source of the single document held by a [`crate::RefreshingCache`].
///
/// The cache calls `produce` sequentially from its refresh task, but the
/// read path falls back to calling it directly while the cache is inactive,
/// so implementations must tolerate concurrent invocation.
#[async_trait]
pub trait Producer: Send + Sync {
    type Output: Send + Sync + 'static;

    async fn produce(&self) -> Snapshot<Self::Output>;
}

#[async_trait]
impl<P: Producer + ?Sized> Producer for Arc<P> {
    type Output = P::Output;

    async fn produce(&self) -> Snapshot<Self::Output> {
        (**self).produce().await
    }
}

/// Producer backed by an async closure.
pub struct FnProducer<F> {
    f: F,
}

impl<F> FnProducer<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut, T> Producer for FnProducer<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Snapshot<T>> + Send,
    T: Send + Sync + 'static,
{
    type Output = T;

    async fn produce(&self) -> Snapshot<T> {
        (self.f)().await
    }
}

impl<F> fmt::Debug for FnProducer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProducer").finish_non_exhaustive()
    }
}
