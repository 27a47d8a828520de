//! Wake-lock capability
//!
//! The wake lock is a single OS resource preventing screen/CPU sleep while
//! held. Only the lifecycle controller requests and releases it, gated by
//! (keep-awake-while-idle policy OR the streaming flag). The controller
//! tracks the held handle in an `Option`, which makes both request and
//! release idempotent.

use async_trait::async_trait;

use crate::error::ControllerResult;

/// A held wake lock. Dropping the handle without calling `release` is
/// implementation-defined; the controller always releases explicitly.
#[async_trait]
pub trait WakeLockHandle: Send + Sync {
    /// Release the lock
    async fn release(&self);
}

/// Capability that acquires the OS wake lock
#[async_trait]
pub trait WakeLockProvider: Send + Sync {
    /// Request the wake lock. May fail (e.g. tab not visible); failures are
    /// logged and retried on the next recovery event.
    async fn request(&self) -> ControllerResult<Box<dyn WakeLockHandle>>;
}
