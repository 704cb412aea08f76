//! Issue-ordered write turns.
//!
//! Every write takes a [`Ticket`] when it is issued and may touch the
//! medium only while its ticket is being served. Tickets are served one at
//! a time in issue order. Dropping a ticket ends its turn; a ticket dropped
//! before its turn came is skipped when it does.

use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
struct Turns {
    issued: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
}

/// Hands out write turns.
#[derive(Default)]
pub(crate) struct WriteQueue {
    turns: Mutex<Turns>,
    // Wakes blocking waiters.
    changed: Condvar,
    // Wakes async waiters.
    notify: Notify,
}

impl fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let turns = self.turns.lock();
        f.debug_struct("WriteQueue")
            .field("issued", &turns.issued)
            .field("serving", &turns.serving)
            .finish()
    }
}

impl WriteQueue {
    /// Takes the next turn.
    pub(crate) fn issue(self: &Arc<Self>) -> Ticket {
        let mut turns = self.turns.lock();
        let number = turns.issued;
        turns.issued += 1;
        Ticket {
            queue: Arc::clone(self),
            number,
        }
    }

    fn finish(&self, number: u64) {
        let mut guard = self.turns.lock();
        let turns = &mut *guard;
        if turns.serving != number {
            turns.abandoned.insert(number);
            return;
        }
        turns.serving += 1;
        while turns.abandoned.remove(&turns.serving) {
            turns.serving += 1;
        }
        drop(guard);

        self.changed.notify_all();
        self.notify.notify_waiters();
    }
}

/// A place in the write queue. The turn ends on drop.
pub(crate) struct Ticket {
    queue: Arc<WriteQueue>,
    number: u64,
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket").field("number", &self.number).finish()
    }
}

impl Ticket {
    /// Returns true while this ticket is being served.
    pub(crate) fn is_turn(&self) -> bool {
        self.queue.turns.lock().serving == self.number
    }

    /// Waits for this ticket's turn.
    pub(crate) async fn wait(&self) {
        loop {
            // Register before checking so a release in between is not missed.
            let released = self.queue.notify.notified();
            if self.is_turn() {
                return;
            }
            released.await;
        }
    }

    /// Blocks the calling thread until this ticket's turn.
    ///
    /// Must not run on a thread the earlier turns need to make progress,
    /// such as the only thread of a current-thread runtime.
    pub(crate) fn wait_blocking(&self) {
        let mut turns = self.queue.turns.lock();
        while turns.serving != self.number {
            self.queue.changed.wait(&mut turns);
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.queue.finish(self.number);
    }
}
