//! Scripted input source.
//!
//! Replays a line-oriented event script in host screen coordinates, one
//! event per line:
//!
//! ```text
//! # comment
//! press 700 650        left button down
//! release 700 650      left button up
//! right 700 650        right button down
//! scroll 700 650 -1    wheel, positive = away from the user
//! key enter            named host key
//! char a               printable character
//! wait 250             pause in milliseconds
//! ```
//!
//! Lines are read on a dedicated thread, so a script piped from stdin behaves
//! like a live event stream.  Malformed lines are logged and skipped.  The
//! channel closes when the script ends or [`InputSource::stop`] is called.
//!
//! `wait` pauses are slept in slices of [`STOP_POLL`] so a stop request is
//! seen promptly; `stop` then joins the thread for at most [`STOP_JOIN_WINDOW`].
//! A thread blocked reading an idle stdin cannot be interrupted and is left
//! to exit on its next line.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mirror_core::{HostKey, KeyMapper};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CaptureError, InputSource, MouseButton, RawInputEvent};

/// Error for a single script line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{command}` expects {expected} argument(s)")]
    Arity { command: String, expected: usize },
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("unknown key name `{0}`")]
    UnknownKey(String),
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    Event(RawInputEvent),
    Wait(Duration),
}

/// Parses one script line.  Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ScriptLine>, ScriptError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let arity = |expected: usize| -> Result<(), ScriptError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ScriptError::Arity { command: command.clone(), expected })
        }
    };

    let parsed = match command.as_str() {
        "press" | "release" | "right" => {
            arity(2)?;
            let (x, y) = (number(args[0])?, number(args[1])?);
            match command.as_str() {
                "press" => RawInputEvent::ButtonDown { button: MouseButton::Left, x, y },
                "release" => RawInputEvent::ButtonUp { button: MouseButton::Left, x, y },
                _ => RawInputEvent::ButtonDown { button: MouseButton::Right, x, y },
            }
        }
        "scroll" => {
            arity(3)?;
            RawInputEvent::Scroll { x: number(args[0])?, y: number(args[1])?, delta: number(args[2])? }
        }
        "key" => {
            arity(1)?;
            let key = KeyMapper::host_key_from_name(args[0])
                .ok_or_else(|| ScriptError::UnknownKey(args[0].to_string()))?;
            RawInputEvent::Key { key }
        }
        "char" => {
            arity(1)?;
            let mut chars = args[0].chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => RawInputEvent::Key { key: HostKey::Char(c) },
                _ => return Err(ScriptError::Arity { command: command.clone(), expected: 1 }),
            }
        }
        "wait" => {
            arity(1)?;
            let ms: u64 = args[0].parse().map_err(|_| ScriptError::NotANumber(args[0].to_string()))?;
            return Ok(Some(ScriptLine::Wait(Duration::from_millis(ms))));
        }
        _ => return Err(ScriptError::UnknownCommand(command.clone())),
    };
    Ok(Some(ScriptLine::Event(parsed)))
}

fn number(word: &str) -> Result<i32, ScriptError> {
    word.parse().map_err(|_| ScriptError::NotANumber(word.to_string()))
}

/// Longest uninterrupted sleep inside a `wait` line.
pub const STOP_POLL: Duration = Duration::from_millis(20);

/// Upper bound on how long [`InputSource::stop`] waits for the replay thread.
pub const STOP_JOIN_WINDOW: Duration = Duration::from_millis(500);

type ScriptReader = Box<dyn BufRead + Send>;

/// An [`InputSource`] that replays an event script.
pub struct ScriptInputSource {
    reader: Mutex<Option<ScriptReader>>,
    stopped: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScriptInputSource {
    /// Replays events from any reader.
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            stopped: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Replays events from a file.
    pub fn from_path(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path).map_err(|e| CaptureError::Open(format!("{}: {e}", path.display())))?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Replays events typed or piped on stdin.
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }
}

impl InputSource for ScriptInputSource {
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RawInputEvent>, CaptureError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(CaptureError::AlreadyStarted)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = Arc::clone(&self.stopped);

        let worker = thread::Builder::new()
            .name("script-input".to_string())
            .spawn(move || replay(reader, tx, stopped))
            .map_err(|e| CaptureError::Open(e.to_string()))?;
        *self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(worker);
        Ok(rx)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let Some(worker) = self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take() else {
            return;
        };

        let deadline = Instant::now() + STOP_JOIN_WINDOW;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(STOP_POLL.min(deadline.saturating_duration_since(Instant::now())));
        }
        if !worker.is_finished() {
            warn!("event script reader still blocked after {STOP_JOIN_WINDOW:?}; leaving it to exit on its next line");
            return;
        }
        if worker.join().is_err() {
            warn!("event script thread panicked");
        }
    }
}

fn replay(reader: ScriptReader, tx: mpsc::UnboundedSender<RawInputEvent>, stopped: Arc<AtomicBool>) {
    for (number, line) in reader.lines().enumerate() {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("event script read failed: {e}");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(ScriptLine::Event(event))) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Ok(Some(ScriptLine::Wait(pause))) => {
                if !sleep_unless_stopped(pause, &stopped) {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("event script line {}: {e}", number + 1),
        }
    }
    debug!("event script finished");
}

/// Sleeps for `pause` in [`STOP_POLL`] slices.  Returns `false` if stopped early.
fn sleep_unless_stopped(pause: Duration, stopped: &AtomicBool) -> bool {
    let deadline = Instant::now() + pause;
    loop {
        if stopped.load(Ordering::SeqCst) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(STOP_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_pointer_lines() {
        assert_eq!(
            parse_line("press 700 650").unwrap(),
            Some(ScriptLine::Event(RawInputEvent::ButtonDown { button: MouseButton::Left, x: 700, y: 650 }))
        );
        assert_eq!(
            parse_line("  release -5 12 ").unwrap(),
            Some(ScriptLine::Event(RawInputEvent::ButtonUp { button: MouseButton::Left, x: -5, y: 12 }))
        );
        assert_eq!(
            parse_line("right 1 2").unwrap(),
            Some(ScriptLine::Event(RawInputEvent::ButtonDown { button: MouseButton::Right, x: 1, y: 2 }))
        );
        assert_eq!(
            parse_line("scroll 1 2 -1").unwrap(),
            Some(ScriptLine::Event(RawInputEvent::Scroll { x: 1, y: 2, delta: -1 }))
        );
    }

    #[test]
    fn test_parse_key_char_and_wait_lines() {
        assert_eq!(
            parse_line("key Enter").unwrap(),
            Some(ScriptLine::Event(RawInputEvent::Key { key: HostKey::Enter }))
        );
        assert_eq!(
            parse_line("char x").unwrap(),
            Some(ScriptLine::Event(RawInputEvent::Key { key: HostKey::Char('x') }))
        );
        assert_eq!(parse_line("wait 250").unwrap(), Some(ScriptLine::Wait(Duration::from_millis(250))));
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# press 1 2").unwrap(), None);
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        assert_eq!(parse_line("hover 1 2"), Err(ScriptError::UnknownCommand("hover".to_string())));
        assert_eq!(
            parse_line("press 1"),
            Err(ScriptError::Arity { command: "press".to_string(), expected: 2 })
        );
        assert_eq!(parse_line("press a 2"), Err(ScriptError::NotANumber("a".to_string())));
        assert_eq!(parse_line("key hyper"), Err(ScriptError::UnknownKey("hyper".to_string())));
        assert!(parse_line("char ab").is_err());
    }

    #[tokio::test]
    async fn test_script_source_replays_events_and_skips_bad_lines() {
        // Arrange
        let script = "# demo\npress 10 20\nbogus\nrelease 10 20\nchar q\n";
        let source = ScriptInputSource::from_reader(Cursor::new(script.to_string()));

        // Act
        let mut rx = source.start().expect("start should succeed");
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        // Assert – the channel closes at end of script.
        assert_eq!(
            events,
            vec![
                RawInputEvent::ButtonDown { button: MouseButton::Left, x: 10, y: 20 },
                RawInputEvent::ButtonUp { button: MouseButton::Left, x: 10, y: 20 },
                RawInputEvent::Key { key: HostKey::Char('q') },
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_interrupts_a_long_wait_and_joins_the_thread() {
        // Arrange – the script would otherwise sit in `wait` for ten minutes.
        let source = ScriptInputSource::from_reader(Cursor::new("wait 600000\npress 1 2\n".to_string()));
        let mut rx = source.start().expect("start should succeed");
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Act
        let started = Instant::now();
        source.stop();

        // Assert
        assert!(started.elapsed() < STOP_JOIN_WINDOW, "stop took {:?}", started.elapsed());
        assert!(source.worker.lock().unwrap().is_none());
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(next, Ok(None)), "no event may follow the interrupted wait");
    }

    #[test]
    fn test_script_source_can_only_start_once() {
        let source = ScriptInputSource::from_reader(Cursor::new(String::new()));
        assert!(source.start().is_ok());
        assert!(matches!(source.start(), Err(CaptureError::AlreadyStarted)));
    }
}
