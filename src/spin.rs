use std::cell::UnsafeCell;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Backoff for short critical sections: exponential busy-spinning, then yielding the timeslice
struct SpinWait {
    count: u32
}

impl SpinWait {
    const YIELD_THRESHOLD: u32 = 4;

    fn new() -> Self {
        Self{count: 0}
    }

    fn spin_once(&mut self) {
        if self.count >= Self::YIELD_THRESHOLD {
            thread::yield_now();
        } else {
            for _ in 0..(1 << self.count) {
                hint::spin_loop();
            }
            self.count += 1;
        }
    }
}

/// A lock around a single small value, held only for a read-modify-write
pub(crate) struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>
}

// The flag serializes every access to `value`
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub fn new(value: T) -> Self {
        Self{
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value)
        }
    }

    pub fn lock(&self) -> SpinGuard<'_, T> {
        let mut wait = SpinWait::new();
        while self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                wait.spin_once();
            }
        }
        SpinGuard{lock: self}
    }

    /// Exclusive access without locking; the borrow checker already rules out contention
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

pub(crate) struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>
}

impl<'a, T> Deref for SpinGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while `locked` is held by this thread
        unsafe { &*self.lock.value.get() }
    }
}

impl<'a, T> DerefMut for SpinGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` prevents aliasing through this guard
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<'a, T> Drop for SpinGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(all(test, feature="parallel"))]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn serializes_increments() {
        let counter = SpinLock::new(0u64);
        (0..10_000u64).into_par_iter().for_each(|i| {
            let mut value = counter.lock();
            *value += i;
        });
        let mut counter = counter;
        assert_eq!(*counter.get_mut(), (0..10_000u64).sum::<u64>());
    }
}
