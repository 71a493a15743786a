use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn, LevelFilter};

use failure::{Error, Fail};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use tickseq_core::clock::{Clock, ExternalClock, InternalClock};
use tickseq_core::config::{Clock as ClockConfig, ClockSource, Config};
use tickseq_core::midi::{input_queue, InputRecord, Message, ALL_NOTES_OFF};
use tickseq_core::output::NoteSink;
use tickseq_core::sequencing::Sequencer;
use tickseq_core::time::Tempo;

mod config;
use crate::config::{AppConfig, Run as RunConfig};

mod console;
use crate::console::{Command, HELP};

mod drummer;
use crate::drummer::Drummer;

mod midi;
use crate::midi::io::MidiIo;

const APP_NAME: &str = "tickseq-drummer";

const TICKSEQ_CONFIG: &str = "TICKSEQ_CONFIG";
const DEFAULT_TICKSEQ_CONFIG: &str = "tickseq.toml";

const TICKSEQ_LOG_CONFIG: &str = "TICKSEQ_LOG_CONFIG";
const DEFAULT_TICKSEQ_LOG_CONFIG: &str = "log4rs.yaml";

const CONSOLE_LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l:5})} [{T}] {t} - {m}{n}";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "Failed to start the console: {}", cause)]
  ConsoleInit { cause: String },
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let (config, app_config) = init_config()?;

  let (input_handle, input_rx) = input_queue(app_config.midi.input_queue_capacity);
  let input_handle = match config.clock.source {
    ClockSource::External => Some(input_handle),
    ClockSource::Internal => None,
  };

  let midi_io = MidiIo::new(&app_config.midi, APP_NAME, input_handle)?;

  let (clock, tempo) = init_clock(&config.clock, input_rx)?;

  let sequencer = Sequencer::new(clock, Box::new(midi_io.sink()));

  let mut drummer = Drummer::new(&sequencer, &config.drummer, tempo)?;
  drummer.load(&config.drummer)?;
  if sequencer.sequence_count() == 0 {
    warn!("No sequences configured, the sequencer will be silent");
  }

  let console = init_console()?;
  println!("{}", HELP);

  sequencer.start();
  sequencer.clock().start()?;

  run(&mut drummer, &sequencer, &app_config.run, console);
  drop(drummer);

  shutdown(sequencer, midi_io)
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(TICKSEQ_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_TICKSEQ_LOG_CONFIG.to_string());

  if Path::new(&log_config_path).exists() {
    log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
      MainError::LoggingInit {
        cause: err.to_string(),
      }
    })?;
  } else {
    let stdout = ConsoleAppender::builder()
      .encoder(Box::new(PatternEncoder::new(CONSOLE_LOG_PATTERN)))
      .build();

    let log_config = LogConfig::builder()
      .appender(Appender::builder().build("stdout", Box::new(stdout)))
      .build(Root::builder().appender("stdout").build(LevelFilter::Info))
      .map_err(|err| MainError::LoggingInit {
        cause: err.to_string(),
      })?;

    log4rs::init_config(log_config).map_err(|err| MainError::LoggingInit {
      cause: err.to_string(),
    })?;

    warn!("{} not found, logging to the console", log_config_path);
  }

  Ok(())
}

fn init_config() -> Result<(Config, AppConfig), Error> {
  let config_path =
    std::env::var(TICKSEQ_CONFIG).unwrap_or_else(|_| DEFAULT_TICKSEQ_CONFIG.to_string());

  if !Path::new(&config_path).exists() {
    warn!("{} not found, using the default configuration", config_path);
    return Ok((Config::default(), AppConfig::default()));
  }

  info!("Loading configuration from {} ...", config_path);
  let config = Config::from_file(config_path.as_str())?;
  let app_config = AppConfig::from_file(config_path.as_str())?;
  debug!("{:#?}", config);
  debug!("{:#?}", app_config);

  Ok((config, app_config))
}

/// The clock to follow, and the internal clock again when it is the one in
/// use so its tempo can be changed.
fn init_clock(
  config: &ClockConfig,
  input_rx: Receiver<InputRecord>,
) -> Result<(Arc<dyn Clock>, Option<Arc<InternalClock>>), Error> {
  match config.source {
    ClockSource::Internal => {
      let tempo = Tempo::checked(config.bpm)?;
      info!("Using the internal clock at {} BPM", tempo.get_value());
      let internal = Arc::new(InternalClock::new(tempo)?);
      let clock: Arc<dyn Clock> = internal.clone();
      Ok((clock, Some(internal)))
    }
    ClockSource::External => {
      info!("Following the MIDI timing clock of the input");
      let clock: Arc<dyn Clock> = Arc::new(ExternalClock::new(input_rx)?);
      Ok((clock, None))
    }
  }
}

/// Reads command lines from stdin on a thread of its own.
fn init_console() -> Result<Receiver<String>, Error> {
  let (lines_tx, lines_rx) = crossbeam_channel::unbounded();

  thread::Builder::new()
    .name("console".into())
    .spawn(move || {
      let stdin = io::stdin();
      for line in stdin.lock().lines() {
        match line {
          Ok(line) => {
            if lines_tx.send(line).is_err() {
              break;
            }
          }
          Err(err) => {
            warn!("Failed to read the console: {}", err);
            break;
          }
        }
      }
      debug!("Console input closed");
    })
    .map_err(|err| MainError::ConsoleInit {
      cause: err.to_string(),
    })?;

  Ok(lines_rx)
}

/// Applies console commands until `x` is entered or the configured duration
/// elapses, logging the sequencer status when idle.
fn run(drummer: &mut Drummer, sequencer: &Sequencer, config: &RunConfig, console: Receiver<String>) {
  let started = Instant::now();
  let duration = Duration::from_secs(config.duration_secs);
  let status_interval = Duration::from_secs(config.status_interval_secs.max(1));
  let mut console = Some(console);

  loop {
    let wait = if config.duration_secs > 0 {
      let elapsed = started.elapsed();
      if elapsed >= duration {
        break;
      }
      status_interval.min(duration - elapsed)
    } else {
      status_interval
    };

    let received = match &console {
      Some(lines) => lines.recv_timeout(wait),
      None => {
        thread::sleep(wait);
        Err(RecvTimeoutError::Timeout)
      }
    };

    match received {
      Ok(line) => {
        if line.trim().is_empty() {
          continue;
        }
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match Command::parse(&line) {
          Ok(command) => match drummer.handle(command, &mut out) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => drop(writeln!(out, "{}", err)),
          },
          Err(err) => drop(writeln!(out, "{}", err)),
        }
      }
      Err(RecvTimeoutError::Timeout) => info!(
        "{} ticks, {} live notes",
        sequencer.tick_count(),
        sequencer.live_note_count()
      ),
      Err(RecvTimeoutError::Disconnected) => {
        debug!("No more console input");
        console = None;
      }
    }
  }
}

fn shutdown(sequencer: Sequencer, midi_io: MidiIo) -> Result<(), Error> {
  info!("Shutting down ...");

  sequencer.stop();

  match sequencer.release_live_notes() {
    Ok(released) => debug!("{} notes released", released),
    Err(err) => warn!("Failed to release the live notes: {}", err),
  }

  let channels: BTreeSet<u8> = sequencer.with_sequences(|list| {
    list
      .iter()
      .map(|sequence| sequence.channel().index())
      .collect()
  });

  let clock = sequencer.clock().clone();
  if let Err(err) = clock.stop() {
    warn!("{}", err);
  }
  clock.dispose();
  drop(sequencer);

  let mut sink = midi_io.sink();
  for channel in channels {
    if let Err(err) = sink.send(Message::control_change(channel, ALL_NOTES_OFF, 0)?) {
      warn!("Failed to silence channel {}: {}", channel, err);
    }
  }

  midi_io.stop()?;

  info!("Bye");
  Ok(())
}
