use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// Shared cancellation flag for one batch.
///
/// Workers never react to signals directly; they poll this token at the
/// external process boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Conventional exit status after SIGINT.
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Trip the token and let the coordinator unwind.
    Cancel,
    /// Teardown is taking too long; leave immediately.
    ForceExit,
}

/// What the `n`th interrupt (1-based) should do.
pub fn interrupt_action(n: usize) -> InterruptAction {
    if n <= 1 {
        InterruptAction::Cancel
    } else {
        InterruptAction::ForceExit
    }
}

/// Trips `token` on the first Ctrl-C / SIGINT and exits the process with
/// [`EXIT_CANCELLED`] on the second, so a stuck teardown can be abandoned.
///
/// The listener runs on its own thread with a single-threaded runtime, so it
/// is the only place in the process that observes the signal.
pub fn cancel_on_interrupt(token: CancelToken) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "building interrupt listener runtime")?;

    std::thread::Builder::new()
        .name("interrupt-listener".into())
        .spawn(move || {
            rt.block_on(async {
                let mut seen = 0;
                loop {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        debug!("interrupt listener unavailable: {err}");
                        return;
                    }
                    seen += 1;
                    match interrupt_action(seen) {
                        InterruptAction::Cancel => {
                            warn!("caught interrupt, terminating outstanding work (interrupt again to force quit)");
                            token.cancel();
                        }
                        InterruptAction::ForceExit => {
                            error!("second interrupt, exiting without waiting for workers");
                            std::process::exit(EXIT_CANCELLED);
                        }
                    }
                }
            });
        })
        .with_context(|| "spawning interrupt listener")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, InterruptAction, interrupt_action};

    #[test]
    fn clones_share_state() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn second_interrupt_forces_exit() {
        assert_eq!(interrupt_action(1), InterruptAction::Cancel);
        assert_eq!(interrupt_action(2), InterruptAction::ForceExit);
        assert_eq!(interrupt_action(5), InterruptAction::ForceExit);
    }
}
