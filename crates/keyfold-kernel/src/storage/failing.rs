//! Object backend wrapper that injects failures.
//!
//! Lets tests drive the partial-failure paths (a put that dies, a sweep
//! where some deletes fail) without a misbehaving real store.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::traits::{ListPage, ListRequest, ObjectBackend, ObjectMeta, StorageError};

/// When a wrapped operation should fail.
#[derive(Debug, Clone, Default)]
pub enum FailurePolicy {
    /// Passthrough.
    #[default]
    Never,
    /// Fail every put.
    Puts,
    /// Fail deletes of keys containing any of these substrings.
    DeletesMatching(Vec<String>),
}

pub struct FailingBackend<B: ObjectBackend> {
    inner: B,
    policy: Mutex<FailurePolicy>,
}

impl<B: ObjectBackend> FailingBackend<B> {
    pub fn new(inner: B, policy: FailurePolicy) -> Self {
        Self {
            inner,
            policy: Mutex::new(policy),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn set_policy(&self, policy: FailurePolicy) {
        match self.policy.lock() {
            Ok(mut guard) => *guard = policy,
            Err(poisoned) => *poisoned.into_inner() = policy,
        }
    }

    fn policy(&self) -> FailurePolicy {
        match self.policy.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn injected(op: &str, key: &str) -> StorageError {
        StorageError::Backend(format!("injected {op} failure for {key}"))
    }
}

#[async_trait]
impl<B: ObjectBackend> ObjectBackend for FailingBackend<B> {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<ObjectMeta, StorageError> {
        if matches!(self.policy(), FailurePolicy::Puts) {
            return Err(Self::injected("put", key));
        }
        self.inner.put_object(key, data).await
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        self.inner.head_object(key).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        if let FailurePolicy::DeletesMatching(needles) = self.policy() {
            if needles.iter().any(|n| key.contains(n.as_str())) {
                return Err(Self::injected("delete", key));
            }
        }
        self.inner.delete_object(key).await
    }

    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError> {
        self.inner.list_objects(request).await
    }

    fn locator(&self, key: &str) -> String {
        self.inner.locator(key)
    }
}
