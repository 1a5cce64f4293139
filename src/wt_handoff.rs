//! Hands finished wavetables to an audio thread.
//!
//! A single writer publishes tables, a single reader picks them up. The
//! channel holds at most one table: publishing while an older table is still
//! waiting replaces it, so the reader never works through a backlog and
//! always gets the newest table. Neither side blocks.
//!
//! The sender keeps its own end of the channel to drop unconsumed tables, so
//! the channel itself never reports a disconnect. Whether the reader is still
//! around is tracked with a shared token instead.

use super::WavetableRef;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, warn};

use std::sync::{Arc, Weak};

pub struct TableSender {
    tx: Sender<WavetableRef>,
    stale: Receiver<WavetableRef>, // Used to drop unconsumed tables
    reader: Weak<()>,              // Gone when the receiver is dropped
}

pub struct TableReceiver {
    rx: Receiver<WavetableRef>,
    current: Option<WavetableRef>,
    _alive: Arc<()>,
}

/// Create a connected sender/receiver pair.
///
/// ```
/// use wextract::{handoff, Wavetable};
/// use std::sync::Arc;
///
/// let (sender, mut receiver) = handoff();
/// sender.publish(Arc::new(Wavetable::from_samples(vec![0.0; 64])));
/// sender.publish(Arc::new(Wavetable::from_samples(vec![0.0; 128])));
///
/// assert!(receiver.update());
/// assert_eq!(receiver.current().unwrap().len(), 128);
/// ```
pub fn handoff() -> (TableSender, TableReceiver) {
    let (tx, rx) = bounded(1);
    let alive = Arc::new(());
    let sender = TableSender{tx, stale: rx.clone(), reader: Arc::downgrade(&alive)};
    let receiver = TableReceiver{rx, current: None, _alive: alive};
    (sender, receiver)
}

impl TableSender {
    /// Publish a new table, replacing one that hasn't been picked up yet.
    ///
    /// Returns false if the receiver has been dropped. The table is discarded
    /// in that case.
    pub fn publish(&self, table: WavetableRef) -> bool {
        if !self.is_connected() {
            warn!("Table receiver is gone, dropping table");
            return false;
        }
        let mut table = table;
        loop {
            match self.tx.try_send(table) {
                Ok(()) => return true,
                Err(TrySendError::Full(t)) => {
                    // The reader may take the old table in the meantime, in
                    // which case the next attempt simply succeeds.
                    if self.stale.try_recv().is_ok() {
                        debug!("Replaced unconsumed table");
                    }
                    table = t;
                }
                // Never happens while self.stale is alive
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    /// True as long as the receiving side exists.
    pub fn is_connected(&self) -> bool {
        self.reader.strong_count() > 0
    }
}

impl TableReceiver {
    /// Swap in the newest published table, if there is one.
    ///
    /// Returns true if the current table changed. Never blocks.
    pub fn update(&mut self) -> bool {
        match self.rx.try_iter().last() {
            Some(table) => {
                self.current = Some(table);
                true
            }
            None => false,
        }
    }

    /// The table that was swapped in last.
    pub fn current(&self) -> Option<&WavetableRef> {
        self.current.as_ref()
    }

    /// Update and return the newest table.
    pub fn latest(&mut self) -> Option<WavetableRef> {
        self.update();
        self.current.clone()
    }
}

// ----------------------------------------------
//                  Unit tests
// ----------------------------------------------

#[cfg(test)]
fn table_of_len(len: usize) -> WavetableRef {
    use super::Wavetable;
    Arc::new(Wavetable::from_samples(vec![0.0; len]))
}

#[test]
fn nothing_published_gives_no_table() {
    let (_sender, mut receiver) = handoff();
    assert!(!receiver.update());
    assert!(receiver.current().is_none());
    assert!(receiver.latest().is_none());
}

#[test]
fn newest_table_wins() {
    let (sender, mut receiver) = handoff();
    for len in 1..10 {
        sender.publish(table_of_len(len));
    }
    assert!(receiver.latest().unwrap().len() == 9);
}

#[test]
fn current_table_is_kept_until_replaced() {
    let (sender, mut receiver) = handoff();
    sender.publish(table_of_len(16));
    assert!(receiver.update());
    assert!(!receiver.update());
    assert!(receiver.current().unwrap().len() == 16);

    sender.publish(table_of_len(32));
    assert!(receiver.latest().unwrap().len() == 32);
}

#[test]
fn publishing_without_receiver_drops_table() {
    let (sender, receiver) = handoff();
    assert!(sender.is_connected());
    assert!(sender.publish(table_of_len(8)));
    drop(receiver);
    assert!(!sender.is_connected());
    let table = table_of_len(16);
    assert!(!sender.publish(table.clone()));
    // Only the local reference is left
    assert!(Arc::strong_count(&table) == 1);
}

#[test]
fn tables_can_be_published_from_other_thread() {
    let (sender, mut receiver) = handoff();
    let writer = std::thread::spawn(move || {
        for len in 1..=100 {
            sender.publish(table_of_len(len));
        }
    });
    let mut last_len = 0;
    while last_len < 100 {
        if let Some(table) = receiver.latest() {
            // Tables arrive in publishing order, some may be skipped
            assert!(table.len() >= last_len);
            last_len = table.len();
        }
    }
    writer.join().unwrap();
}
