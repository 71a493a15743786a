use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

pub const MAX_RECORD_LEN: usize = 3;

/// A short message captured from an input device, small enough to be copied
/// out of a driver callback without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRecord {
  timestamp: u32,
  len: u8,
  data: [u8; MAX_RECORD_LEN],
}

impl InputRecord {
  /// Returns `None` for empty input or for anything longer than a short message.
  pub fn new(timestamp: u32, bytes: &[u8]) -> Option<InputRecord> {
    if bytes.is_empty() || bytes.len() > MAX_RECORD_LEN {
      return None;
    }
    let mut data = [0u8; MAX_RECORD_LEN];
    data[..bytes.len()].copy_from_slice(bytes);
    Some(InputRecord {
      timestamp,
      len: bytes.len() as u8,
      data,
    })
  }

  pub fn timestamp(&self) -> u32 {
    self.timestamp
  }

  pub fn data(&self) -> &[u8] {
    &self.data[..self.len as usize]
  }
}

/// The producer side of an input queue. `push` never blocks, so it is safe
/// to call from a device callback.
#[derive(Clone)]
pub struct InputHandle {
  tx: Sender<InputRecord>,
  dropped: Arc<AtomicU64>,
}

impl InputHandle {
  /// Enqueues a record. Returns false if it was dropped because the bytes
  /// don't fit in a record, the queue is full, or the consumer is gone.
  pub fn push(&self, timestamp: u32, bytes: &[u8]) -> bool {
    let record = match InputRecord::new(timestamp, bytes) {
      Some(record) => record,
      None => {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        return false;
      }
    };

    match self.tx.try_send(record) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        false
      }
    }
  }

  pub fn dropped(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }
}

pub fn input_queue(capacity: usize) -> (InputHandle, Receiver<InputRecord>) {
  let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
  let handle = InputHandle {
    tx,
    dropped: Arc::new(AtomicU64::new(0)),
  };
  (handle, rx)
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn record_bounds() {
    assert_eq!(InputRecord::new(0, &[]), None);
    assert_eq!(InputRecord::new(0, &[0x90, 1, 2, 3]), None);
    let record = InputRecord::new(42, &[0xf8]).unwrap();
    assert_eq!(record.data(), &[0xf8]);
    assert_eq!(record.timestamp(), 42);
  }

  #[test]
  pub fn push_drops_when_full() {
    let (handle, rx) = input_queue(2);
    assert!(handle.push(0, &[0xf8]));
    assert!(handle.push(1, &[0x99, 36, 80]));
    assert!(!handle.push(2, &[0xf8]));
    assert_eq!(handle.dropped(), 1);

    assert_eq!(rx.recv().unwrap().data(), &[0xf8]);
    assert_eq!(rx.recv().unwrap().data(), &[0x99, 36, 80]);
  }

  #[test]
  pub fn push_after_consumer_gone() {
    let (handle, rx) = input_queue(4);
    drop(rx);
    assert!(!handle.push(0, &[0xf8]));
    assert_eq!(handle.dropped(), 1);
  }
}
