use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace};

use super::{Clock, ClockError, ClockState, ListenerId, TickHub, TickListener};
use crate::time::Tempo;

/// Deadline bookkeeping for a periodic tick stream whose tempo can change
/// between ticks.
#[derive(Debug, Clone)]
pub struct TickSchedule {
  tempo: Tempo,
  period: Duration,
  deadline: Instant,
}

impl TickSchedule {
  /// The first tick is due immediately.
  pub fn new(tempo: Tempo, now: Instant) -> TickSchedule {
    TickSchedule {
      tempo,
      period: tempo.tick_period(),
      deadline: now,
    }
  }

  pub fn restart(&mut self, now: Instant) {
    self.deadline = now;
  }

  pub fn deadline(&self) -> Instant {
    self.deadline
  }

  pub fn tempo(&self) -> Tempo {
    self.tempo
  }

  pub fn period(&self) -> Duration {
    self.period
  }

  /// Called on a tick boundary. Applies `pending` to the intervals after this
  /// tick and schedules the next one. Deadlines that already passed by `now`
  /// are skipped rather than fired in a burst. Returns how many were skipped.
  pub fn advance(&mut self, pending: Tempo, now: Instant) -> u32 {
    if pending != self.tempo {
      self.tempo = pending;
      self.period = pending.tick_period();
    }
    self.deadline += self.period;
    let mut skipped = 0;
    while self.deadline <= now {
      self.deadline += self.period;
      skipped += 1;
    }
    skipped
  }
}

enum Command {
  Start,
  Stop,
  Dispose,
}

struct TimerThread {
  hub: Arc<TickHub>,
  pending_bpm: Arc<AtomicU16>,
  schedule: TickSchedule,
}

impl TimerThread {
  fn run(mut self, commands: Receiver<Command>) {
    debug!("Internal clock thread running ...");

    loop {
      let command = if self.hub.is_running() {
        match commands.recv_deadline(self.schedule.deadline()) {
          Ok(command) => command,
          Err(RecvTimeoutError::Timeout) => {
            self.tick();
            continue;
          }
          Err(RecvTimeoutError::Disconnected) => break,
        }
      } else {
        match commands.recv() {
          Ok(command) => command,
          Err(_) => break,
        }
      };

      match command {
        Command::Start => self.schedule.restart(Instant::now()),
        Command::Stop => {}
        Command::Dispose => break,
      }
    }

    debug!("Internal clock thread finished");
  }

  fn tick(&mut self) {
    let pending = Tempo::new(self.pending_bpm.load(Ordering::Acquire));
    if pending != self.schedule.tempo() {
      debug!(
        "Tempo changed from {} to {} BPM",
        self.schedule.tempo().get_value(),
        pending.get_value()
      );
    }
    let skipped = self.schedule.advance(pending, Instant::now());
    if skipped > 0 {
      trace!("Skipped {} late ticks", skipped);
    }
    self.hub.notify();
  }
}

/// A clock driven by a periodic timer thread.
pub struct InternalClock {
  hub: Arc<TickHub>,
  pending_bpm: Arc<AtomicU16>,
  commands: Sender<Command>,
  handle: Mutex<Option<JoinHandle<()>>>,
  thread_id: ThreadId,
}

impl InternalClock {
  pub fn new(tempo: Tempo) -> Result<InternalClock, ClockError> {
    info!(
      "Spawning internal clock thread at {} BPM ...",
      tempo.get_value()
    );

    let hub = Arc::new(TickHub::new());
    let pending_bpm = Arc::new(AtomicU16::new(tempo.get_value()));
    let (commands, commands_rx) = crossbeam_channel::unbounded::<Command>();

    let timer = TimerThread {
      hub: hub.clone(),
      pending_bpm: pending_bpm.clone(),
      schedule: TickSchedule::new(tempo, Instant::now()),
    };

    let handle = thread::Builder::new()
      .name("internal-clock".into())
      .spawn(move || timer.run(commands_rx))
      .map_err(|err| ClockError::Spawn {
        cause: err.to_string(),
      })?;

    let thread_id = handle.thread().id();

    Ok(InternalClock {
      hub,
      pending_bpm,
      commands,
      handle: Mutex::new(Some(handle)),
      thread_id,
    })
  }

  /// The most recently requested tempo. It may not have been applied yet.
  pub fn tempo(&self) -> Tempo {
    Tempo::new(self.pending_bpm.load(Ordering::Acquire))
  }

  /// Requests a tempo change. It takes effect at the next tick boundary; the
  /// interval in flight keeps the previous period.
  pub fn set_tempo(&self, tempo: Tempo) {
    self.pending_bpm.store(tempo.get_value(), Ordering::Release);
  }

  /// Same as `set_tempo`, clamping `bpm` into [1, 360].
  pub fn set_bpm(&self, bpm: u16) {
    self.set_tempo(Tempo::new(bpm))
  }
}

impl Clock for InternalClock {
  fn start(&self) -> Result<(), ClockError> {
    if self.hub.set_running(true)? {
      info!("Internal clock started");
      self
        .commands
        .send(Command::Start)
        .map_err(|_| ClockError::Disposed)?;
    }
    Ok(())
  }

  fn stop(&self) -> Result<(), ClockError> {
    if self.hub.set_running(false)? {
      info!("Internal clock stopped");
      self
        .commands
        .send(Command::Stop)
        .map_err(|_| ClockError::Disposed)?;
    }
    Ok(())
  }

  fn dispose(&self) {
    let on_clock_thread = thread::current().id() == self.thread_id;
    if !self.hub.dispose(!on_clock_thread) {
      return;
    }

    info!("Disposing internal clock ...");
    drop(self.commands.send(Command::Dispose));

    if !on_clock_thread {
      let handle = self
        .handle
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
      if let Some(handle) = handle {
        drop(handle.join());
      }
    }
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

impl Drop for InternalClock {
  fn drop(&mut self) {
    self.dispose();
  }
}
