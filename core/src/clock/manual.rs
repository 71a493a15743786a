use super::{Clock, ClockError, ClockState, ListenerId, TickHub, TickListener};

/// Delivers ticks only when told to, on the caller's thread.
pub struct ManualClock {
  hub: TickHub,
}

impl ManualClock {
  pub fn new() -> ManualClock {
    ManualClock {
      hub: TickHub::new(),
    }
  }

  pub fn tick(&self) -> bool {
    self.hub.notify()
  }

  pub fn ticks(&self, count: usize) {
    for _ in 0..count {
      self.tick();
    }
  }
}

impl Clock for ManualClock {
  fn start(&self) -> Result<(), ClockError> {
    self.hub.set_running(true).map(|_| ())
  }

  fn stop(&self) -> Result<(), ClockError> {
    self.hub.set_running(false).map(|_| ())
  }

  fn dispose(&self) {
    self.hub.dispose(true);
  }

  fn state(&self) -> ClockState {
    self.hub.state()
  }

  fn subscribe(&self, listener: TickListener) -> ListenerId {
    self.hub.subscribe(listener)
  }

  fn unsubscribe(&self, id: ListenerId) -> bool {
    self.hub.unsubscribe(id)
  }
}
