//! Process-wide context (`spec.md` §4.1).
//!
//! A `Context` does not own any I/O itself — `compio`'s `io_uring` runtime is
//! the actual executor — but it is the one place an application configures
//! how many worker threads the runtime should target and how many sockets it
//! is willing to track at once, and it is the handle that coordinates
//! cooperative shutdown across every socket created from it.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::ZLinkError;

/// Context option identifiers, mirroring `spec.md` §4.1's recognized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextOption {
    /// Number of `io_uring` worker threads the context targets.
    IoThreads,
    /// Upper bound on the number of live sockets this context will track.
    MaxSockets,
    /// Default `MaxMsgSize` applied to sockets that don't override it.
    MaxMsgSize,
}

/// Context configuration, set at construction and adjustable via `set`.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Worker thread count hint (`IO_THREADS`). Default: `1`.
    pub io_threads: i64,
    /// Bounded socket table size (`MAX_SOCKETS`). Default: `1023`, matching
    /// libzmq's historical default so callers porting tuning values land on
    /// a familiar number.
    pub max_sockets: i64,
    /// Thread name prefix applied to spawned worker threads, for
    /// introspection in `top`/`ps`/tracing output.
    pub thread_name_prefix: String,
    /// Default max message size applied to sockets that don't set their own.
    pub max_msgsz: i64,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            io_threads: 1,
            max_sockets: 1023,
            thread_name_prefix: "zlink-io".to_string(),
            max_msgsz: -1,
        }
    }
}

/// Process-wide context: worker pool sizing and the bounded live-socket
/// table every socket registers itself against at construction.
///
/// Cloning a `Context` is cheap — it shares the same inner state — so
/// sockets typically hold an owned clone rather than a reference.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    options: std::sync::Mutex<ContextOptions>,
    live_sockets: AtomicUsize,
    terminating: AtomicBool,
    max_msgsz_override: AtomicI64,
}

impl Context {
    /// Create a context with default options (`spec.md` §4.1 defaults).
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    /// Create a context with explicit options.
    #[must_use]
    pub fn with_options(options: ContextOptions) -> Self {
        let max_msgsz = options.max_msgsz;
        Self {
            inner: Arc::new(Inner {
                options: std::sync::Mutex::new(options),
                live_sockets: AtomicUsize::new(0),
                terminating: AtomicBool::new(false),
                max_msgsz_override: AtomicI64::new(max_msgsz),
            }),
        }
    }

    /// Register a newly created socket against the live-socket table.
    ///
    /// Returns [`ZLinkError::ContextTerminated`] if the context has started
    /// shutting down, and an invalid-argument error if `MAX_SOCKETS` would
    /// be exceeded.
    pub fn register_socket(&self) -> Result<(), ZLinkError> {
        if self.inner.terminating.load(Ordering::Acquire) {
            return Err(ZLinkError::ContextTerminated);
        }

        let max_sockets = self.inner.options.lock().unwrap().max_sockets;
        let prev = self.inner.live_sockets.fetch_add(1, Ordering::AcqRel);
        if max_sockets >= 0 && prev as i64 >= max_sockets {
            self.inner.live_sockets.fetch_sub(1, Ordering::AcqRel);
            return Err(ZLinkError::InvalidArgument(format!(
                "context socket table full (MAX_SOCKETS = {max_sockets})"
            )));
        }
        Ok(())
    }

    /// Deregister a socket, freeing its slot in the live-socket table.
    ///
    /// Idempotent-safe to call at most once per successful
    /// `register_socket` — sockets call this from their `Drop`/`close`.
    pub fn deregister_socket(&self) {
        self.inner.live_sockets.fetch_sub(1, Ordering::AcqRel);
    }

    /// Number of sockets currently registered against this context.
    #[must_use]
    pub fn socket_count(&self) -> usize {
        self.inner.live_sockets.load(Ordering::Acquire)
    }

    /// Set a context option at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ZLinkError::InvalidArgument`] for an out-of-range value.
    pub fn set(&self, option: ContextOption, value: i64) -> Result<(), ZLinkError> {
        match option {
            ContextOption::IoThreads => {
                if value < 0 {
                    return Err(ZLinkError::InvalidArgument(
                        "IO_THREADS must be >= 0".to_string(),
                    ));
                }
                self.inner.options.lock().unwrap().io_threads = value;
            }
            ContextOption::MaxSockets => {
                if value < 1 {
                    return Err(ZLinkError::InvalidArgument(
                        "MAX_SOCKETS must be >= 1".to_string(),
                    ));
                }
                self.inner.options.lock().unwrap().max_sockets = value;
            }
            ContextOption::MaxMsgSize => {
                self.inner.options.lock().unwrap().max_msgsz = value;
                self.inner.max_msgsz_override.store(value, Ordering::Release);
            }
        }
        Ok(())
    }

    /// Read a context option's current value.
    #[must_use]
    pub fn get(&self, option: ContextOption) -> i64 {
        let options = self.inner.options.lock().unwrap();
        match option {
            ContextOption::IoThreads => options.io_threads,
            ContextOption::MaxSockets => options.max_sockets,
            ContextOption::MaxMsgSize => options.max_msgsz,
        }
    }

    /// Begin cooperative shutdown: new sockets are refused, but existing
    /// sockets are left to close themselves (`spec.md` §4.1's distinction
    /// between `shutdown` and `term`).
    pub fn shutdown(&self) {
        self.inner.terminating.store(true, Ordering::Release);
    }

    /// Whether the context is terminating (either via `shutdown` or `term`).
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.inner.terminating.load(Ordering::Acquire)
    }

    /// Terminate the context, blocking until every registered socket has
    /// deregistered itself. Mirrors libzmq's `zmq_ctx_term` semantics: after
    /// this returns, creating further sockets against this context fails.
    pub async fn term(&self) {
        self.shutdown();
        while self.socket_count() > 0 {
            compio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("sockets", &self.socket_count())
            .field("terminating", &self.is_terminating())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_deregisters_sockets() {
        let ctx = Context::new();
        assert_eq!(ctx.socket_count(), 0);
        ctx.register_socket().unwrap();
        ctx.register_socket().unwrap();
        assert_eq!(ctx.socket_count(), 2);
        ctx.deregister_socket();
        assert_eq!(ctx.socket_count(), 1);
    }

    #[test]
    fn enforces_max_sockets() {
        let ctx = Context::with_options(ContextOptions {
            max_sockets: 1,
            ..ContextOptions::default()
        });
        ctx.register_socket().unwrap();
        assert!(ctx.register_socket().is_err());
    }

    #[test]
    fn shutdown_refuses_new_sockets() {
        let ctx = Context::new();
        ctx.shutdown();
        assert!(matches!(
            ctx.register_socket(),
            Err(ZLinkError::ContextTerminated)
        ));
    }

    #[compio::test]
    async fn term_waits_for_sockets_to_drain() {
        let ctx = Context::new();
        ctx.register_socket().unwrap();

        let ctx2 = ctx.clone();
        let waiter = compio::runtime::spawn(async move {
            ctx2.term().await;
        });

        compio::time::sleep(std::time::Duration::from_millis(5)).await;
        ctx.deregister_socket();
        waiter.await.unwrap();
        assert!(ctx.is_terminating());
    }
}
