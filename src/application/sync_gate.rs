//! Single-flight gate for the sync-mutating operation family
//!
//! At most one replay into the target system runs at a time. Acquisition is
//! non-blocking: a contended caller gets `None`/`false` immediately and must
//! report a conflict instead of queueing.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

#[derive(Debug, Default)]
pub struct SyncGate {
    held: AtomicBool,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate without blocking; `false` if it is already held
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the gate. Releasing a free gate is a no-op.
    pub fn release(&self) {
        if self.held.swap(false, Ordering::AcqRel) {
            debug!("Sync gate released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Scoped acquisition: the gate is released when the guard drops,
    /// on every exit path of the guarded section.
    pub fn try_lock(&self) -> Option<SyncGateGuard<'_>> {
        if self.try_acquire() {
            debug!("Sync gate acquired");
            Some(SyncGateGuard { gate: self })
        } else {
            None
        }
    }
}

/// Proof of gate ownership; releases the gate on drop
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct SyncGateGuard<'a> {
    gate: &'a SyncGate,
}

impl Drop for SyncGateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    #[test]
    fn second_acquire_fails_until_release() {
        let gate = SyncGate::new();
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        gate.release();
        assert!(gate.try_acquire());
    }

    #[test]
    fn release_is_idempotent() {
        let gate = SyncGate::new();
        gate.release();
        assert!(!gate.is_held());
        assert!(gate.try_acquire());
        gate.release();
        gate.release();
        assert!(!gate.is_held());
    }

    #[test]
    fn guard_releases_on_drop() {
        let gate = SyncGate::new();
        {
            let _guard = gate.try_lock().unwrap();
            assert!(gate.is_held());
            assert!(gate.try_lock().is_none());
        }
        assert!(!gate.is_held());
    }

    #[test]
    fn guard_releases_on_panic() {
        let gate = Arc::new(SyncGate::new());
        let inner = Arc::clone(&gate);
        let result = std::thread::spawn(move || {
            let _guard = inner.try_lock().unwrap();
            panic!("replay blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!gate.is_held());
    }

    #[test]
    fn exactly_one_of_many_racers_wins() {
        let gate = Arc::new(SyncGate::new());
        let barrier = Arc::new(Barrier::new(16));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    barrier.wait();
                    if gate.try_acquire() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(gate.is_held());
    }
}
