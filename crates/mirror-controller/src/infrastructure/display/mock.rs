//! Mock display process for unit testing.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{DisplayError, DisplayProcess, DisplayStatus};

#[derive(Debug, Default)]
struct State {
    fail_with: Option<DisplayError>,
    status: Option<DisplayStatus>,
    starts: u32,
    terminations: u32,
}

/// A [`DisplayProcess`] that never spawns anything; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockDisplay {
    state: Arc<Mutex<State>>,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `start` fail with `error`.
    pub fn failing(self, error: DisplayError) -> Self {
        self.lock().fail_with = Some(error);
        self
    }

    /// Simulates the display exiting on its own.
    pub fn exit(&self, code: i32) {
        self.lock().status = Some(DisplayStatus::Exited(Some(code)));
    }

    pub fn starts(&self) -> u32 {
        self.lock().starts
    }

    pub fn terminations(&self) -> u32 {
        self.lock().terminations
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl DisplayProcess for MockDisplay {
    async fn start(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock();
        state.starts += 1;
        if let Some(error) = state.fail_with.clone() {
            return Err(error);
        }
        state.status = Some(DisplayStatus::Running);
        Ok(())
    }

    fn poll(&mut self) -> DisplayStatus {
        self.lock().status.unwrap_or(DisplayStatus::NotStarted)
    }

    async fn terminate(&mut self) {
        let mut state = self.lock();
        state.terminations += 1;
        if state.status == Some(DisplayStatus::Running) {
            state.status = Some(DisplayStatus::Exited(None));
        }
    }
}
