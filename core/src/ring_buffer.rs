//! Fixed-capacity FIFO byte queue
//!
//! `RingBuffer` is the plain single-context queue. `SharedRingBuffer` wraps it
//! for the interrupt/main-loop split: every operation runs inside a critical
//! section, so one producer and one consumer in different contexts never see
//! a half-updated head/tail/count triple.

use core::cell::RefCell;

use critical_section::Mutex;

/// Fixed-capacity FIFO of bytes with wrap-around indices
///
/// Storage is sized by `N` at compile time; the usable capacity is chosen at
/// construction and never changes.
#[derive(Debug)]
pub struct RingBuffer<const N: usize> {
    values: [u8; N],
    capacity: usize,
    head: usize,
    tail: usize,
    count: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Buffer using the full compile-time storage
    pub const fn new() -> Self {
        Self::with_capacity(N)
    }

    /// Buffer holding at most `capacity` bytes
    ///
    /// `capacity` must be in `1..=N`. In a `static` initializer a bad value
    /// fails the build.
    pub const fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0 && capacity <= N, "ring buffer capacity out of range");
        Self {
            values: [0; N],
            capacity,
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Append a byte, `false` (and no change) when the buffer is full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.values[self.tail] = byte;
        self.tail = (self.tail + 1) % self.capacity;
        self.count += 1;
        true
    }

    /// Remove and return the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.values[self.head];
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
        Some(byte)
    }

    pub const fn used_entries(&self) -> usize {
        self.count
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    /// Reset indices and count; stored bytes are left in place
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// `RingBuffer` shared between an interrupt handler and the main loop
///
/// Each call masks interrupts for the duration of one queue update only.
pub struct SharedRingBuffer<const N: usize> {
    inner: Mutex<RefCell<RingBuffer<N>>>,
}

impl<const N: usize> SharedRingBuffer<N> {
    pub const fn new() -> Self {
        Self::with_capacity(N)
    }

    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(RingBuffer::with_capacity(capacity))),
        }
    }

    pub fn push(&self, byte: u8) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).push(byte))
    }

    pub fn pop(&self) -> Option<u8> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).pop())
    }

    pub fn used_entries(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).used_entries())
    }

    pub fn is_empty(&self) -> bool {
        self.used_entries() == 0
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).clear())
    }
}

impl<const N: usize> Default for SharedRingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_pop() {
        let mut buffer: RingBuffer<10> = RingBuffer::new();
        assert!(buffer.push(42));
        assert_eq!(buffer.pop(), Some(42));
    }

    #[test]
    fn test_full_buffer_rejects_push() {
        let mut buffer: RingBuffer<10> = RingBuffer::new();
        for i in 0..10 {
            assert!(buffer.push(i));
        }
        assert!(!buffer.push(11));
        assert_eq!(buffer.used_entries(), 10);
        assert!(buffer.is_full());
    }

    #[test]
    fn test_empty_buffer_pop() {
        let mut buffer: RingBuffer<10> = RingBuffer::new();
        assert_eq!(buffer.pop(), None);
        assert_eq!(buffer.used_entries(), 0);
        // State is untouched: a push/pop pair still works normally
        assert!(buffer.push(7));
        assert_eq!(buffer.pop(), Some(7));
    }

    #[test]
    fn test_fifo_order() {
        let mut buffer: RingBuffer<8> = RingBuffer::new();
        for b in [b'a', b'b', b'c'] {
            assert!(buffer.push(b));
        }
        assert_eq!(buffer.pop(), Some(b'a'));
        assert_eq!(buffer.pop(), Some(b'b'));
        assert_eq!(buffer.pop(), Some(b'c'));
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_clear_resets_count() {
        let mut buffer: RingBuffer<10> = RingBuffer::new();
        buffer.push(1);
        buffer.push(2);
        buffer.clear();
        assert_eq!(buffer.used_entries(), 0);
        assert_eq!(buffer.pop(), None);
        assert!(buffer.push(3));
        assert_eq!(buffer.pop(), Some(3));
    }

    #[test]
    fn test_capacity_four_scenario() {
        let mut buffer: RingBuffer<16> = RingBuffer::with_capacity(4);
        for b in 1..=4 {
            assert!(buffer.push(b));
        }
        assert!(!buffer.push(5));
        assert_eq!(buffer.pop(), Some(1));
        assert_eq!(buffer.pop(), Some(2));
        assert!(buffer.push(5));
        assert!(buffer.push(6));
        assert_eq!(buffer.used_entries(), 4);
        for expected in 3..=6 {
            assert_eq!(buffer.pop(), Some(expected));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_count_tracks_successful_operations() {
        // Pseudo-random push/pop mix, checked against a simple counter
        let mut buffer: RingBuffer<5> = RingBuffer::new();
        let mut expected = 0usize;
        let mut seed = 0x5au8;
        for _ in 0..200 {
            seed = seed.wrapping_mul(37).wrapping_add(11);
            if seed % 3 == 0 {
                if buffer.pop().is_some() {
                    expected -= 1;
                }
            } else if buffer.push(seed) {
                expected += 1;
            }
            assert_eq!(buffer.used_entries(), expected);
            assert!(buffer.used_entries() <= buffer.capacity());
        }
    }

    #[test]
    fn test_wraps_around_storage() {
        let mut buffer: RingBuffer<3> = RingBuffer::new();
        for round in 0..10u8 {
            assert!(buffer.push(round));
            assert!(buffer.push(round.wrapping_add(100)));
            assert_eq!(buffer.pop(), Some(round));
            assert_eq!(buffer.pop(), Some(round.wrapping_add(100)));
        }
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_rejected() {
        let _ = RingBuffer::<4>::with_capacity(0);
    }

    #[test]
    fn test_shared_ring_buffer() {
        static SHARED: SharedRingBuffer<4> = SharedRingBuffer::with_capacity(2);
        SHARED.clear();
        assert!(SHARED.push(1));
        assert!(SHARED.push(2));
        assert!(!SHARED.push(3));
        assert_eq!(SHARED.used_entries(), 2);
        assert_eq!(SHARED.pop(), Some(1));
        assert_eq!(SHARED.pop(), Some(2));
        assert!(SHARED.is_empty());
    }
}
