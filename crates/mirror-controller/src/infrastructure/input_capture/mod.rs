//! Input capture infrastructure for the controller.
//!
//! An input source turns host pointer and keyboard activity into
//! [`RawInputEvent`]s and pushes them into an unbounded Tokio channel.  The
//! producing side may be a callback running on a foreign thread (an OS hook,
//! a script reader); `UnboundedSender::send` never blocks, so the producer
//! never waits for mapping or dispatch.
//!
//! # Testability
//!
//! The [`InputSource`] trait lets tests inject synthetic events through
//! [`mock::MockInputSource`].  [`script::ScriptInputSource`] replays a
//! line-oriented event script and is the headless source used by the CLI.

use mirror_core::HostKey;
use tokio::sync::mpsc;

pub mod mock;
pub mod script;

/// A raw input event in host screen coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A mouse button was pressed at an absolute screen position.
    ButtonDown { button: MouseButton, x: i32, y: i32 },
    /// A mouse button was released at an absolute screen position.
    ButtonUp { button: MouseButton, x: i32, y: i32 },
    /// The vertical wheel was scrolled.
    Scroll {
        x: i32,
        y: i32,
        /// Positive = away from the user.
        delta: i32,
    },
    /// A key was pressed.
    Key { key: HostKey },
}

/// Mouse button identifier used in [`RawInputEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("input source has already been started")]
    AlreadyStarted,
    #[error("input source could not be opened: {0}")]
    Open(String),
}

/// Trait abstracting input event production.
pub trait InputSource: Send {
    /// Starts the source and returns the receiving end of its event channel.
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RawInputEvent>, CaptureError>;
    /// Stops the source.  The channel closes once the producer has exited.
    fn stop(&self);
}
