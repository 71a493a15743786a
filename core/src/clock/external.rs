use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, info, trace};

use super::{Clock, ClockError, ClockState, ListenerId, TickHub, TickListener};
use crate::midi::{Decoder, InputRecord, Message};

struct InputWorker {
  hub: Arc<TickHub>,
}

impl InputWorker {
  fn run(self, input_rx: Receiver<InputRecord>, shutdown_rx: Receiver<()>) {
    debug!("External clock worker running ...");

    loop {
      select! {
        recv(input_rx) -> record => match record {
          Ok(record) => self.handle_record(&record),
          Err(_) => {
            debug!("External clock input closed");
            break;
          }
        },
        recv(shutdown_rx) -> _ => break,
      }
    }

    debug!("External clock worker finished");
  }

  fn handle_record(&self, record: &InputRecord) {
    if self.hub.is_disposing() {
      return;
    }
    for message in Decoder::new(record.data()) {
      match message {
        Message::TimingClock => {
          self.hub.notify();
        }
        other => trace!("Ignoring input at {}: {:?}", record.timestamp(), other),
      }
    }
  }
}

/// A clock that follows the timing clock messages (0xF8) of an input stream.
///
/// Records are drained by a dedicated worker thread, so whatever produces them
/// only has to enqueue. Ticks are forwarded only while the clock is running;
/// input received while stopped is consumed and discarded.
pub struct ExternalClock {
  hub: Arc<TickHub>,
  shutdown_tx: Sender<()>,
  handle: Mutex<Option<JoinHandle<()>>>,
  thread_id: ThreadId,
}

impl ExternalClock {
  pub fn new(input_rx: Receiver<InputRecord>) -> Result<ExternalClock, ClockError> {
    info!("Spawning external clock worker ...");

    let hub = Arc::new(TickHub::new());
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

    let worker = InputWorker { hub: hub.clone() };

    let handle = thread::Builder::new()
      .name("external-clock".into())
      .spawn(move || worker.run(input_rx, shutdown_rx))
      .map_err(|err| ClockError::Spawn {
        cause: err.to_string(),
      })?;

    let thread_id = handle.thread().id();

    Ok(ExternalClock {
      hub,
      shutdown_tx,
      handle: Mutex::new(Some(handle)),
      thread_id,
    })
  }
}

impl Clock for ExternalClock {
  fn start(&self) -> Result<(), ClockError> {
    if self.hub.set_running(true)? {
      info!("External clock forwarding ticks");
    }
    Ok(())
  }

  fn stop(&self) -> Result<(), ClockError> {
    if self.hub.set_running(false)? {
      info!("External clock stopped forwarding ticks");
    }
    Ok(())
  }

  fn dispose(&self) {
    let on_worker = thread::current().id() == self.thread_id;
    if !self.hub.dispose(!on_worker) {
      return;
    }

    info!("Disposing external clock ...");
    drop(self.shutdown_tx.try_send(()));

    if !on_worker {
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

impl Drop for ExternalClock {
  fn drop(&mut self) {
    self.dispose();
  }
}
