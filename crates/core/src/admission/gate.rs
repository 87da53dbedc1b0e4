//! Lock-free admission gate.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Snapshot of the gate for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    /// Slots currently occupied.
    pub occupancy: usize,
    /// Maximum number of slots.
    pub capacity: usize,
}

/// Shared counter bounding the number of in-flight jobs.
///
/// All mutation goes through compare-and-swap, so `occupancy` can never exceed
/// `capacity` and never underflow, regardless of how many tasks call in.
pub struct AdmissionGate {
    occupied: AtomicUsize,
    capacity: usize,
}

impl AdmissionGate {
    /// Creates a gate with the given number of slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            occupied: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Tries to occupy one slot. Returns `false` when the gate is full.
    pub fn try_acquire(&self) -> bool {
        self.occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.capacity).then_some(current + 1)
            })
            .is_ok()
    }

    /// Frees one slot. Calling it on an empty gate is a no-op.
    pub fn release(&self) {
        let _ = self
            .occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
    }

    /// Occupies a slot and returns a token that frees it when released or dropped.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionToken> {
        if self.try_acquire() {
            Some(AdmissionToken {
                gate: Arc::clone(self),
                released: false,
            })
        } else {
            None
        }
    }

    /// Number of slots currently occupied.
    pub fn occupancy(&self) -> usize {
        self.occupied.load(Ordering::Acquire)
    }

    /// Maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.capacity
    }

    pub fn status(&self) -> GateStatus {
        GateStatus {
            occupancy: self.occupancy(),
            capacity: self.capacity,
        }
    }
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("occupancy", &self.occupancy())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// One occupied slot in an [`AdmissionGate`].
///
/// The slot is returned exactly once: either by [`AdmissionToken::release`]
/// or when the token is dropped.
#[must_use = "dropping the token frees the admission slot immediately"]
pub struct AdmissionToken {
    gate: Arc<AdmissionGate>,
    released: bool,
}

impl AdmissionToken {
    /// Returns the slot to the gate.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.gate.release();
        }
    }
}

impl Drop for AdmissionToken {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for AdmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionToken")
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_full() {
        let gate = AdmissionGate::new(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert_eq!(gate.occupancy(), 2);
        assert!(gate.is_full());
    }

    #[test]
    fn test_release_never_goes_negative() {
        let gate = AdmissionGate::new(1);
        gate.release();
        gate.release();
        assert_eq!(gate.occupancy(), 0);

        assert!(gate.try_acquire());
        gate.release();
        gate.release();
        assert_eq!(gate.occupancy(), 0);
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let gate = AdmissionGate::new(0);
        assert!(!gate.try_acquire());
        assert_eq!(gate.occupancy(), 0);
    }

    #[test]
    fn test_token_releases_on_drop() {
        let gate = Arc::new(AdmissionGate::new(1));
        {
            let _token = gate.try_admit().unwrap();
            assert_eq!(gate.occupancy(), 1);
            assert!(gate.try_admit().is_none());
        }
        assert_eq!(gate.occupancy(), 0);
    }

    #[test]
    fn test_token_explicit_release_is_counted_once() {
        let gate = Arc::new(AdmissionGate::new(2));
        let a = gate.try_admit().unwrap();
        let _b = gate.try_admit().unwrap();
        a.release();
        assert_eq!(gate.occupancy(), 1);
    }

    #[test]
    fn test_interleaved_sequence_stays_in_bounds() {
        let gate = AdmissionGate::new(3);
        // Deterministic pseudo-random walk of acquire/release calls.
        let mut seed: u32 = 0x9e37_79b9;
        for _ in 0..10_000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            if seed % 3 == 0 {
                gate.release();
            } else {
                gate.try_acquire();
            }
            let occupancy = gate.occupancy();
            assert!(occupancy <= gate.capacity());
        }
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_capacity() {
        let gate = Arc::new(AdmissionGate::new(4));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        if gate.try_acquire() {
                            let now = admitted.fetch_add(1, Ordering::SeqCst) + 1;
                            assert!(now <= 4);
                            admitted.fetch_sub(1, Ordering::SeqCst);
                            gate.release();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gate.occupancy(), 0);
    }

    #[test]
    fn test_status_snapshot() {
        let gate = Arc::new(AdmissionGate::new(5));
        let _token = gate.try_admit().unwrap();
        assert_eq!(
            gate.status(),
            GateStatus {
                occupancy: 1,
                capacity: 5
            }
        );
    }
}
