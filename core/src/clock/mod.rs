//! Tick sources running at 24 ticks per beat.
//!
//! Every clock shares the same contract: it starts `Stopped`, `start` and
//! `stop` toggle between `Stopped` and `Running`, and `dispose` moves it to
//! the terminal `Disposed` state. Once `dispose` returns no listener will be
//! called again, even if a tick was being delivered concurrently.

pub mod external;
pub mod internal;

#[cfg(test)]
pub(crate) mod manual;

pub use self::external::ExternalClock;
pub use self::internal::InternalClock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use failure::Fail;
use log::warn;
use uuid::Uuid;

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum ClockError {
  #[fail(display = "The clock has been disposed")]
  Disposed,

  #[fail(display = "Failed to spawn the clock thread: {}", cause)]
  Spawn { cause: String },
}

pub type TickResult = Result<(), failure::Error>;

pub type TickListener = Box<dyn Fn() -> TickResult + Send + Sync>;

type Listeners = Vec<(ListenerId, Arc<dyn Fn() -> TickResult + Send + Sync>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
  fn new() -> ListenerId {
    ListenerId(Uuid::new_v4())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
  Stopped,
  Running,
  Disposed,
}

pub trait Clock: Send + Sync {
  fn start(&self) -> Result<(), ClockError>;

  fn stop(&self) -> Result<(), ClockError>;

  /// Tears the clock down. Idempotent.
  fn dispose(&self);

  fn state(&self) -> ClockState;

  fn subscribe(&self, listener: TickListener) -> ListenerId;

  /// Returns whether the listener was registered.
  fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// Listener registry and lifecycle flags shared between a clock handle and
/// the thread that produces its ticks.
pub(crate) struct TickHub {
  disposing: AtomicBool,
  running: AtomicBool,
  listeners: RwLock<Listeners>,
}

impl TickHub {
  pub fn new() -> TickHub {
    TickHub {
      disposing: AtomicBool::new(false),
      running: AtomicBool::new(false),
      listeners: RwLock::new(Vec::new()),
    }
  }

  fn read_listeners(&self) -> RwLockReadGuard<Listeners> {
    self
      .listeners
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn write_listeners(&self) -> RwLockWriteGuard<Listeners> {
    self
      .listeners
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub fn is_disposing(&self) -> bool {
    self.disposing.load(Ordering::SeqCst)
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  pub fn state(&self) -> ClockState {
    if self.is_disposing() {
      ClockState::Disposed
    } else if self.is_running() {
      ClockState::Running
    } else {
      ClockState::Stopped
    }
  }

  /// Returns whether the state changed.
  pub fn set_running(&self, running: bool) -> Result<bool, ClockError> {
    if self.is_disposing() {
      return Err(ClockError::Disposed);
    }
    Ok(self.running.swap(running, Ordering::SeqCst) != running)
  }

  pub fn subscribe(&self, listener: TickListener) -> ListenerId {
    let id = ListenerId::new();
    self.write_listeners().push((id, Arc::from(listener)));
    id
  }

  pub fn unsubscribe(&self, id: ListenerId) -> bool {
    let mut listeners = self.write_listeners();
    let len = listeners.len();
    listeners.retain(|(listener_id, _)| *listener_id != id);
    listeners.len() != len
  }

  /// Delivers one tick to every listener. Returns false when the tick was
  /// suppressed because the clock is disposing or not running.
  pub fn notify(&self) -> bool {
    if self.is_disposing() {
      return false;
    }
    let listeners = self.read_listeners();
    if self.is_disposing() || !self.is_running() {
      return false;
    }
    for (id, listener) in listeners.iter() {
      if let Err(err) = listener() {
        warn!("Tick listener {:?} failed: {}", id, err);
      }
    }
    true
  }

  /// Raises the disposing flag. When `wait` is set it also blocks until an
  /// in-flight delivery has completed. Returns false if already disposed.
  pub fn dispose(&self, wait: bool) -> bool {
    let first = !self.disposing.swap(true, Ordering::SeqCst);
    self.running.store(false, Ordering::SeqCst);
    if wait {
      drop(self.write_listeners());
    }
    first
  }
}

#[cfg(test)]
mod test {

  use super::*;
  use std::sync::atomic::AtomicUsize;

  fn counting_listener(counter: &Arc<AtomicUsize>) -> TickListener {
    let counter = counter.clone();
    Box::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(())
    })
  }

  #[test]
  pub fn notify_only_while_running() {
    let hub = TickHub::new();
    let counter = Arc::new(AtomicUsize::new(0));
    hub.subscribe(counting_listener(&counter));

    assert!(!hub.notify());
    assert_eq!(hub.set_running(true), Ok(true));
    assert!(hub.notify());
    assert_eq!(hub.set_running(false), Ok(true));
    assert!(!hub.notify());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[test]
  pub fn unsubscribe_stops_delivery() {
    let hub = TickHub::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let id = hub.subscribe(counting_listener(&counter));
    hub.set_running(true).unwrap();

    hub.notify();
    assert!(hub.unsubscribe(id));
    assert!(!hub.unsubscribe(id));
    hub.notify();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[test]
  pub fn failing_listener_does_not_block_others() {
    let hub = TickHub::new();
    let counter = Arc::new(AtomicUsize::new(0));
    hub.subscribe(Box::new(|| Err(failure::err_msg("boom"))));
    hub.subscribe(counting_listener(&counter));
    hub.set_running(true).unwrap();

    assert!(hub.notify());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[test]
  pub fn dispose_is_terminal() {
    let hub = TickHub::new();
    let counter = Arc::new(AtomicUsize::new(0));
    hub.subscribe(counting_listener(&counter));
    hub.set_running(true).unwrap();

    assert!(hub.dispose(true));
    assert!(!hub.dispose(true));
    assert_eq!(hub.state(), ClockState::Disposed);
    assert_eq!(hub.set_running(true), Err(ClockError::Disposed));
    assert!(!hub.notify());
    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }
}
