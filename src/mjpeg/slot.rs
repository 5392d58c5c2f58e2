//! Single-slot frame mailbox between the ingress and decode workers.
//!
//! The slot holds at most one complete JPEG frame. The producer never
//! waits: if the consumer is mid-decode the new frame is dropped, and if
//! an unconsumed frame is still sitting in the slot it is overwritten
//! silently. The consumer keeps the slot locked for the whole decode, so
//! the buffer is never torn underneath it.

use tokio::sync::{Mutex, MutexGuard, Notify};

/// Mailbox for the latest complete JPEG frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    // Empty vec means no frame is pending.
    frame: Mutex<Vec<u8>>,
    ready: Notify,
}

impl FrameSlot {
    pub fn new() -> Self {
        FrameSlot::default()
    }

    /// Swap a finished frame into the slot without blocking.
    ///
    /// On success `frame` comes back holding the slot's previous buffer,
    /// cleared for reuse, and the consumer is woken. Returns `false` when
    /// the consumer holds the slot (the frame is lost; the caller counts
    /// it).
    pub fn try_publish(&self, frame: &mut Vec<u8>) -> bool {
        match self.frame.try_lock() {
            Ok(mut slot) => {
                std::mem::swap(&mut *slot, frame);
                frame.clear();
                self.ready.notify_one();
                true
            }
            Err(_) => false,
        }
    }

    /// Wait until a frame is available and lock it for consumption.
    /// Dropping the guard empties the slot.
    pub async fn acquire(&self) -> FrameGuard<'_> {
        loop {
            // Arm the wakeup before checking, so a publish between the
            // check and the await is not lost.
            let ready = self.ready.notified();
            {
                let slot = self.frame.lock().await;
                if !slot.is_empty() {
                    return FrameGuard { slot };
                }
            }
            ready.await;
        }
    }
}

/// Exclusive access to one published frame.
pub struct FrameGuard<'a> {
    slot: MutexGuard<'a, Vec<u8>>,
}

impl std::ops::Deref for FrameGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.slot
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_then_acquire_round_trips() {
        let slot = FrameSlot::new();
        let mut frame = vec![1, 2, 3];
        assert!(slot.try_publish(&mut frame));
        assert!(frame.is_empty());

        let guard = slot.acquire().await;
        assert_eq!(&*guard, &[1, 2, 3]);
    }

    #[tokio::test]
    async fn publish_fails_while_consumer_holds_the_slot() {
        let slot = Arc::new(FrameSlot::new());
        let mut frame = vec![9u8; 4];
        assert!(slot.try_publish(&mut frame));

        let guard = slot.acquire().await;
        let mut next = vec![7u8; 2];
        assert!(!slot.try_publish(&mut next));
        assert_eq!(next, vec![7u8; 2]);
        drop(guard);

        assert!(slot.try_publish(&mut next));
    }

    #[tokio::test]
    async fn unconsumed_frame_is_overwritten() {
        let slot = FrameSlot::new();
        let mut a = vec![1u8];
        let mut b = vec![2u8];
        assert!(slot.try_publish(&mut a));
        assert!(slot.try_publish(&mut b));

        let guard = slot.acquire().await;
        assert_eq!(&*guard, &[2]);
    }

    #[tokio::test]
    async fn acquire_wakes_on_late_publish() {
        let slot = Arc::new(FrameSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move {
                let guard = slot.acquire().await;
                guard.to_vec()
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut frame = vec![5, 6];
        assert!(slot.try_publish(&mut frame));

        let got = waiter.await.unwrap();
        assert_eq!(got, vec![5, 6]);
    }

    #[tokio::test]
    async fn dropping_the_guard_empties_the_slot() {
        let slot = FrameSlot::new();
        let mut frame = vec![1, 2];
        assert!(slot.try_publish(&mut frame));
        drop(slot.acquire().await);

        // Nothing pending anymore; a fresh publish works and delivers
        // only the new frame.
        let mut frame = vec![3];
        assert!(slot.try_publish(&mut frame));
        let guard = slot.acquire().await;
        assert_eq!(&*guard, &[3]);
    }
}
