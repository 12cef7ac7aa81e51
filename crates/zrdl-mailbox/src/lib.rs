//! Frame mailbox: an atomics-based, latest-wins slot exchange for handing
//! drawlist bytes from the main side to the worker side without a queue
//! (spec §4.5).
//!
//! The control region mirrors the spec's "Int32 lane array" layout as a
//! small set of atomics plus two per-slot atomic arrays (`state`, `token`).
//! The data region is a set of fixed-size byte buffers, one per slot, whose
//! cross-thread access is synchronized entirely by the per-slot `state` CAS:
//! a writer's byte copy happens-before the `IN_USE -> READY` release store,
//! and a reader's bytes become visible only after its `READY -> IN_USE`
//! CAS succeeds with acquire ordering. `published_seq` is a second,
//! independent acquire/release pair used purely to signal "something new
//! exists" and to identify which slot/len/token to look at; it is not what
//! makes the slot bytes themselves safe to read (the state CAS is).

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

const FREE: u8 = 0;
const READY: u8 = 1;
const IN_USE: u8 = 2;

/// Bounded number of retries when sampling the published header fields
/// against a torn `published_seq` (spec §4.5 consume step 2).
const MAX_SEQ_RETRY: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    #[error("no free slot available")]
    NoFreeSlot,
    #[error("frame of {byte_len} bytes exceeds slot capacity {slot_bytes}")]
    FrameTooLarge { byte_len: usize, slot_bytes: usize },
    #[error("published slot index {slot} out of range (slot_count {slot_count})")]
    SlotOutOfRange { slot: u32, slot_count: usize },
    #[error("published byte length {byte_len} exceeds slot capacity {slot_bytes}")]
    PublishedBytesOutOfRange { byte_len: u32, slot_bytes: usize },
    #[error("published token {token} is not positive")]
    InvalidToken { token: i64 },
    #[error("could not sample a consistent published header after {attempts} attempts")]
    TornRead { attempts: u32 },
}

/// Per-mailbox telemetry counters (spec §12.2's supplement to §4.5).
#[derive(Debug, Default)]
pub struct MailboxTelemetry {
    pub frames_published: std::sync::atomic::AtomicU64,
    pub frames_consumed: std::sync::atomic::AtomicU64,
    pub frames_superseded: std::sync::atomic::AtomicU64,
    pub acquire_spins: std::sync::atomic::AtomicU64,
}

/// The shared-memory-style frame mailbox. In this process-local Rust port
/// the "shared memory" is simply heap storage shared via `Arc` between the
/// main-side [`Publisher`] and worker-side [`Consumer`] handles; the
/// synchronization discipline is exactly what a true SAB transport requires.
pub struct Mailbox {
    slot_count: usize,
    slot_bytes: usize,

    published_seq: AtomicU32,
    published_slot: AtomicU32,
    published_bytes: AtomicU32,
    published_token: AtomicU32,

    states: Vec<AtomicU8>,
    tokens: Vec<AtomicU32>,
    next_token: AtomicU32,

    // Plain `Vec<u8>` per slot, guarded by the state CAS above rather than a
    // lock; serialized access is the whole point of the protocol. The mutex
    // only protects the `Vec<Vec<u8>>` spine during construction-time
    // indexing, never the byte contents during steady-state operation.
    slots: Mutex<Vec<Vec<u8>>>,

    wake: Notify,
    pub telemetry: MailboxTelemetry,
}

impl Mailbox {
    pub fn new(slot_count: usize, slot_bytes: usize) -> Self {
        assert!(slot_count > 0, "slot_count must be positive");
        assert!(slot_bytes > 0, "slot_bytes must be positive");
        Self {
            slot_count,
            slot_bytes,
            published_seq: AtomicU32::new(0),
            published_slot: AtomicU32::new(0),
            published_bytes: AtomicU32::new(0),
            published_token: AtomicU32::new(0),
            states: (0..slot_count).map(|_| AtomicU8::new(FREE)).collect(),
            tokens: (0..slot_count).map(|_| AtomicU32::new(0)).collect(),
            next_token: AtomicU32::new(1),
            slots: Mutex::new(vec![vec![0u8; slot_bytes]; slot_count]),
            wake: Notify::new(),
            telemetry: MailboxTelemetry::default(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn slot_bytes(&self) -> usize {
        self.slot_bytes
    }

    /// Publish-side: acquire a FREE slot, copy `bytes` into it, and publish
    /// the mailbox header so a consumer can find it (spec §4.5 "Publish").
    pub fn publish(&self, bytes: &[u8]) -> Result<(), MailboxError> {
        if bytes.len() > self.slot_bytes {
            return Err(MailboxError::FrameTooLarge {
                byte_len: bytes.len(),
                slot_bytes: self.slot_bytes,
            });
        }
        let slot = self.acquire_free_slot()?;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.tokens[slot].store(token, Ordering::Relaxed);

        {
            let mut slots = self.slots.lock().expect("mailbox slot lock poisoned");
            slots[slot][..bytes.len()].copy_from_slice(bytes);
        }

        self.states[slot].store(READY, Ordering::Release);

        let new_seq = self.published_seq.load(Ordering::Relaxed).wrapping_add(1);
        self.published_slot.store(slot as u32, Ordering::Relaxed);
        self.published_bytes.store(bytes.len() as u32, Ordering::Relaxed);
        self.published_token.store(token, Ordering::Relaxed);
        self.published_seq.store(new_seq, Ordering::Release);

        self.telemetry.frames_published.fetch_add(1, Ordering::Relaxed);
        self.wake.notify_one();
        Ok(())
    }

    /// Acquire a slot to publish into. Latest-wins means a slot sitting in
    /// `READY` with nobody consuming it is dead weight the moment a newer
    /// frame wants to go out, so before spinning on FREE we reclaim `READY`
    /// slots whose `token` is not the currently published one (spec §4.5
    /// "Superseded frames are reclaimed by the publisher on next acquire").
    /// A `READY` slot that *is* the current published token is only reclaimed
    /// as a last resort, so a single-slot mailbox still always makes forward
    /// progress instead of deadlocking on its own unconsumed latest frame.
    fn acquire_free_slot(&self) -> Result<usize, MailboxError> {
        const SPIN_ATTEMPTS: u32 = 64;
        for attempt in 0..SPIN_ATTEMPTS {
            self.reclaim_superseded_slots(false);
            if let Some(slot) = self.take_free_slot() {
                return Ok(slot);
            }
            // Last resort: every slot is either the current latest (still
            // READY, unconsumed) or IN_USE. Reclaim the current latest too,
            // so a mailbox never deadlocks on its own unconsumed frame.
            self.reclaim_superseded_slots(true);
            if let Some(slot) = self.take_free_slot() {
                return Ok(slot);
            }
            if attempt > 0 {
                self.telemetry.acquire_spins.fetch_add(1, Ordering::Relaxed);
                std::hint::spin_loop();
            }
        }
        Err(MailboxError::NoFreeSlot)
    }

    /// Reclaim every `READY` slot whose token is not the current published
    /// one back to `FREE`. With `include_latest`, also reclaims the slot
    /// holding the current published token (the fallback pass).
    fn reclaim_superseded_slots(&self, include_latest: bool) {
        let published_token = self.published_token.load(Ordering::Relaxed);
        for (i, state) in self.states.iter().enumerate() {
            let superseded = self.tokens[i].load(Ordering::Relaxed) != published_token;
            if (superseded || include_latest)
                && state
                    .compare_exchange(READY, FREE, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                self.telemetry.frames_superseded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn take_free_slot(&self) -> Option<usize> {
        self.states.iter().enumerate().find_map(|(i, state)| {
            state
                .compare_exchange(FREE, IN_USE, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
                .then_some(i)
        })
    }

    /// Consume-side: read the latest published frame, if any newer than
    /// `last_consumed`, returning its bytes copied out and the new sequence
    /// number to remember as `last_consumed` (spec §4.5 "Consume").
    pub fn consume_latest(&self, last_consumed: u32) -> Result<Option<ConsumedFrame>, MailboxError> {
        let seq = self.published_seq.load(Ordering::Acquire);
        if seq == last_consumed {
            return Ok(None);
        }

        let (slot, byte_len, token) = self.sample_published_header(seq)?;

        if slot as usize >= self.slot_count {
            return Err(MailboxError::SlotOutOfRange {
                slot,
                slot_count: self.slot_count,
            });
        }
        if byte_len as usize > self.slot_bytes {
            return Err(MailboxError::PublishedBytesOutOfRange {
                byte_len,
                slot_bytes: self.slot_bytes,
            });
        }
        if token == 0 {
            return Err(MailboxError::InvalidToken { token: token as i64 });
        }

        let slot = slot as usize;
        if self.tokens[slot].load(Ordering::Relaxed) != token {
            // Superseded between our read of the header and now: stale, not fatal.
            self.telemetry.frames_superseded.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        if self.states[slot]
            .compare_exchange(READY, IN_USE, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.telemetry.frames_superseded.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        if self.tokens[slot].load(Ordering::Relaxed) != token {
            // Token changed between CAS and verification: release and treat as stale.
            self.states[slot].store(FREE, Ordering::Release);
            self.telemetry.frames_superseded.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let bytes = {
            let slots = self.slots.lock().expect("mailbox slot lock poisoned");
            slots[slot][..byte_len as usize].to_vec()
        };

        self.telemetry.frames_consumed.fetch_add(1, Ordering::Relaxed);
        Ok(Some(ConsumedFrame { bytes, slot, seq }))
    }

    /// Release a slot previously returned by [`Self::consume_latest`] back to
    /// FREE once submission has completed (success or failure).
    pub fn release(&self, frame: ConsumedFrame) {
        self.states[frame.slot].store(FREE, Ordering::Release);
    }

    fn sample_published_header(&self, first_seq: u32) -> Result<(u32, u32, u32), MailboxError> {
        for attempt in 0..MAX_SEQ_RETRY {
            let slot = self.published_slot.load(Ordering::Relaxed);
            let byte_len = self.published_bytes.load(Ordering::Relaxed);
            let token = self.published_token.load(Ordering::Relaxed);
            let confirm_seq = self.published_seq.load(Ordering::Acquire);
            if confirm_seq == first_seq {
                return Ok((slot, byte_len, token));
            }
            tracing::trace!(target: "zrdl.mailbox", attempt, first_seq, confirm_seq, "torn published header read, retrying");
        }
        Err(MailboxError::TornRead { attempts: MAX_SEQ_RETRY })
    }

    /// Await a newer `published_seq` than `last_consumed`, or time out.
    /// Armed only by the caller choosing to call this when nothing new is
    /// known (spec §4.5 "Async wake"); always bounded by `timeout`.
    pub async fn wait_for_frame(&self, last_consumed: u32, timeout: Duration) -> bool {
        if self.published_seq.load(Ordering::Acquire) != last_consumed {
            return true;
        }
        tokio::time::timeout(timeout, self.wake.notified()).await.is_ok()
    }

    pub fn published_seq(&self) -> u32 {
        self.published_seq.load(Ordering::Acquire)
    }
}

/// A frame pulled out of the mailbox by [`Mailbox::consume_latest`]. Must be
/// handed back via [`Mailbox::release`] once the caller is done with it.
pub struct ConsumedFrame {
    bytes: Vec<u8>,
    slot: usize,
    seq: u32,
}

impl ConsumedFrame {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_consume_round_trips_bytes() {
        let mailbox = Mailbox::new(4, 64);
        mailbox.publish(b"hello").unwrap();
        let frame = mailbox.consume_latest(0).unwrap().unwrap();
        assert_eq!(frame.bytes(), b"hello");
        assert_eq!(frame.seq(), 1);
        mailbox.release(frame);
        assert_eq!(mailbox.states[0].load(Ordering::Acquire), FREE);
    }

    #[test]
    fn no_new_frame_yields_none() {
        let mailbox = Mailbox::new(2, 32);
        mailbox.publish(b"x").unwrap();
        let seq = mailbox.published_seq();
        let frame = mailbox.consume_latest(seq).unwrap();
        assert!(frame.is_none());
    }

    #[test]
    fn latest_wins_under_backpressure() {
        let mailbox = Mailbox::new(4, 32);
        mailbox.publish(b"frame1").unwrap();
        mailbox.publish(b"frame2").unwrap();
        mailbox.publish(b"frame3").unwrap();

        let frame = mailbox.consume_latest(0).unwrap().unwrap();
        assert_eq!(frame.bytes(), b"frame3");
        assert_eq!(mailbox.published_seq(), 3);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mailbox = Mailbox::new(1, 4);
        let err = mailbox.publish(b"too long").unwrap_err();
        assert!(matches!(err, MailboxError::FrameTooLarge { .. }));
    }

    #[test]
    fn single_slot_publish_reclaims_unconsumed_predecessor() {
        // Latest-wins: with only one slot, the second publish must reclaim
        // the first frame's slot rather than fail, since nothing ever loses
        // its only chance to publish just because nobody consumed yet.
        let mailbox = Mailbox::new(1, 16);
        mailbox.publish(b"one").unwrap();
        mailbox.publish(b"two").unwrap();
        let frame = mailbox.consume_latest(0).unwrap().unwrap();
        assert_eq!(frame.bytes(), b"two");
    }

    #[test]
    fn acquiring_all_slots_with_active_consumer_still_fails() {
        // The one case that should genuinely return NoFreeSlot: every slot
        // is IN_USE (mid-consumption), so there is nothing safe to reclaim.
        let mailbox = Mailbox::new(1, 16);
        mailbox.publish(b"one").unwrap();
        let frame = mailbox.consume_latest(0).unwrap().unwrap();
        let err = mailbox.publish(b"two").unwrap_err();
        assert!(matches!(err, MailboxError::NoFreeSlot));
        mailbox.release(frame);
        mailbox.publish(b"two").unwrap();
    }

    #[test]
    fn superseded_slots_are_freed_on_publisher_next_acquire() {
        // Spec §8 scenario 5: publish frames 1/2/3, worker consumes only
        // frame 3, then frames 1 and 2's slots end FREE after the
        // publisher's next acquire.
        let mailbox = Mailbox::new(4, 32);
        mailbox.publish(b"frame1").unwrap();
        mailbox.publish(b"frame2").unwrap();
        mailbox.publish(b"frame3").unwrap();

        let frame = mailbox.consume_latest(0).unwrap().unwrap();
        assert_eq!(frame.bytes(), b"frame3");
        mailbox.release(frame);

        mailbox.publish(b"frame4").unwrap();

        // frame1 and frame2 were never consumed; after this acquire neither
        // slot may still be parked READY holding their stale tokens — only
        // frame4's slot is allowed to be READY.
        for i in 0..4 {
            if mailbox.states[i].load(Ordering::Acquire) == READY {
                let token = mailbox.tokens[i].load(Ordering::Relaxed);
                assert_eq!(token, mailbox.published_token.load(Ordering::Relaxed));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wait_for_frame_wakes_on_publish() {
        use std::sync::Arc;
        let mailbox = Arc::new(Mailbox::new(2, 16));
        let waiter = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move { mailbox.wait_for_frame(0, Duration::from_secs(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        mailbox.publish(b"ping").unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn wait_for_frame_times_out_without_publish() {
        let mailbox = Mailbox::new(2, 16);
        let woke = mailbox.wait_for_frame(0, Duration::from_millis(20)).await;
        assert!(!woke);
    }
}
