//! Platform abstraction for scheduling engine work.
//!
//! The engine never runs deferred work on its own. It queues microtasks and
//! asks the host, through [`RuntimeScheduler`], to run a checkpoint; the host
//! answers by calling [`Engine::run_microtasks`](crate::Engine::run_microtasks).

/// Receives checkpoint requests from the runtime.
///
/// Implementations must be safe to share across threads even though the
/// engine itself is single-threaded, so that a host event loop can observe
/// requests from elsewhere.
pub trait RuntimeScheduler: Send + Sync {
    /// Called when the microtask queue goes from empty to non-empty.
    fn request_checkpoint(&self);
}
