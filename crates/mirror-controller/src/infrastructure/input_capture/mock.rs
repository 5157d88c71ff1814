//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`RawInputEvent`]s without a real input
//! device or event script.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedSender};

use super::{CaptureError, InputSource, RawInputEvent};

/// A mock implementation of [`InputSource`] that allows tests to inject events.
#[derive(Clone, Default)]
pub struct MockInputSource {
    sender: Arc<Mutex<Option<UnboundedSender<RawInputEvent>>>>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a synthetic event, as if captured from hardware.
    ///
    /// Panics if `start()` has not been called or if `stop()` has been called.
    pub fn inject_event(&self, event: RawInputEvent) {
        let guard = self.sender.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(sender) => sender.send(event).expect("receiver has been dropped"),
            None => panic!("MockInputSource::inject_event called before start()"),
        }
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::UnboundedReceiver<RawInputEvent>, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().expect("lock poisoned") = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender closes the channel.
        *self.sender.lock().expect("lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::MouseButton;
    use mirror_core::HostKey;

    #[test]
    fn test_mock_input_source_starts_and_receives_events() {
        // Arrange
        let source = MockInputSource::new();
        let mut rx = source.start().expect("start should succeed");

        // Act
        source.inject_event(RawInputEvent::ButtonDown { button: MouseButton::Left, x: 10, y: 20 });
        source.inject_event(RawInputEvent::Key { key: HostKey::Enter });

        // Assert
        assert_eq!(
            rx.try_recv().unwrap(),
            RawInputEvent::ButtonDown { button: MouseButton::Left, x: 10, y: 20 }
        );
        assert_eq!(rx.try_recv().unwrap(), RawInputEvent::Key { key: HostKey::Enter });
    }

    #[tokio::test]
    async fn test_mock_input_source_stop_closes_channel() {
        // Arrange
        let source = MockInputSource::new();
        let mut rx = source.start().expect("start should succeed");

        // Act
        source.stop();

        // Assert
        assert!(rx.recv().await.is_none(), "channel should be closed after stop()");
    }
}
