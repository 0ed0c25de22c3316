//! Monotonic id and sequence number generators (spec.md §3 invariants:
//! "Action id is strictly monotonic within an OpenKit; sequence number is
//! strictly monotonic within a beacon").

use std::sync::atomic::{AtomicI64, Ordering};

/// A simple `fetch_add`-based counter shared by every id kind that needs
/// "next value, starting at 1, never repeats."
#[derive(Debug, Default)]
pub struct IdProvider {
    next: AtomicI64,
}

impl IdProvider {
    pub fn new() -> Self {
        IdProvider {
            next: AtomicI64::new(0),
        }
    }

    pub fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let provider = IdProvider::new();
        let a = provider.next_id();
        let b = provider.next_id();
        assert!(b > a);
        assert_eq!(a, 1);
    }
}
