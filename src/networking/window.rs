/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Adaptive bound on the number of unacknowledged packets per destination.
//!
//! After every resend cycle the sender worker reports whether the cycle finished within the
//! retransmit interval. A cycle with slack time left doubles the window, up to its maximum; a
//! cycle that overran halves it, down to its minimum. Small windows keep retransmission storms in
//! check when the sender is saturated, large windows keep the pipe full when it is not.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SendWindow {
    size: usize,
    min: usize,
    max: usize,
}

impl SendWindow {
    /// `min <= initial <= max` and `min >= 1` must hold.
    pub(crate) fn new(min: usize, initial: usize, max: usize) -> Self {
        Self {
            size: initial,
            min,
            max,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Whether `in_flight` unacknowledged packets leave room for another one.
    pub(crate) fn has_room(&self, in_flight: usize) -> bool {
        in_flight < self.size
    }

    /// Adjust the window after a cycle. Returns the previous size if it changed.
    pub(crate) fn adapt(&mut self, cycle_had_slack: bool) -> Option<usize> {
        let old = self.size;
        self.size = if cycle_had_slack {
            self.size.saturating_mul(2).min(self.max)
        } else {
            (self.size / 2).max(self.min)
        };
        (old != self.size).then_some(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_to_max_and_shrinks_to_min() {
        let mut window = SendWindow::new(2, 4, 16);
        assert_eq!(window.adapt(true), Some(4));
        assert_eq!(window.size(), 8);
        assert_eq!(window.adapt(true), Some(8));
        assert_eq!(window.adapt(true), None);
        assert_eq!(window.size(), 16);

        for _ in 0..10 {
            window.adapt(false);
        }
        assert_eq!(window.size(), 2);
        assert!(window.has_room(1));
        assert!(!window.has_room(2));
    }
}
