//! In-memory doubles for the serial link and record persistence.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::link::{LineReader, LineSource, LineWriter, LinkError};

pub use crate::records::MemoryPersistence;

#[derive(Debug, Default)]
struct ScriptState {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<String>,
    replies: Vec<ScriptedReply>,
    closed: bool,
    fail_writes: bool,
}

#[derive(Debug, Clone)]
struct ScriptedReply {
    trigger: String,
    reply: String,
    delay: Duration,
}

/// A fake sensor that records outbound commands and replays scripted lines.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLink {
    inner: Arc<(Mutex<ScriptState>, Condvar)>,
}

impl ScriptedLink {
    /// Creates an empty link.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a [`LineSource`] backed by this link.
    #[must_use]
    pub fn source(&self) -> LineSource {
        LineSource::new(Box::new(self.clone()), Box::new(self.clone()))
    }

    /// Queues an inbound line as if the sensor had printed it.
    pub fn push_line(&self, text: &str) {
        let (_, signal) = &*self.inner;
        let mut state = self.state();
        state.inbound.push_back(format!("{text}\r\n").into_bytes());
        signal.notify_all();
    }

    /// Queues raw inbound bytes.
    pub fn push_raw(&self, bytes: &[u8]) {
        let (_, signal) = &*self.inner;
        let mut state = self.state();
        state.inbound.push_back(bytes.to_vec());
        signal.notify_all();
    }

    /// Makes the sensor print `reply` `delay` after `trigger` is written.
    ///
    /// Each scripted reply fires once.
    pub fn reply_after(&self, trigger: &str, reply: &str, delay: Duration) {
        self.state().replies.push(ScriptedReply {
            trigger: trigger.to_owned(),
            reply: reply.to_owned(),
            delay,
        });
    }

    /// Simulates the device disappearing.
    pub fn close(&self) {
        let (_, signal) = &*self.inner;
        self.state().closed = true;
        signal.notify_all();
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Commands written so far, without terminators.
    #[must_use]
    pub fn written(&self) -> Vec<String> {
        self.state().written.clone()
    }

    /// Number of inbound lines not yet consumed by the reader.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.state().inbound.len()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl LineReader for ScriptedLink {
    fn has_input(&mut self) -> Result<bool, LinkError> {
        let state = self.state();
        Ok(state.closed || !state.inbound.is_empty())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        let deadline = Instant::now() + timeout;
        let (_, signal) = &*self.inner;
        let mut state = self.state();
        loop {
            if let Some(line) = state.inbound.pop_front() {
                return Ok(Some(line));
            }
            if state.closed {
                return Err(LinkError::closed("scripted link closed"));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            state = signal
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
    }
}

impl LineWriter for ScriptedLink {
    fn write_line(&mut self, line: &[u8]) -> Result<(), LinkError> {
        let text = String::from_utf8_lossy(line).trim_end().to_owned();
        let fired = {
            let mut state = self.state();
            if state.closed {
                return Err(LinkError::closed("scripted link closed"));
            }
            if state.fail_writes {
                return Err(LinkError::Io(std::io::Error::other("scripted write failure")));
            }
            state.written.push(text.clone());
            let position = state.replies.iter().position(|reply| reply.trigger == text);
            position.map(|index| state.replies.remove(index))
        };

        if let Some(reply) = fired {
            let link = self.clone();
            thread::spawn(move || {
                thread::sleep(reply.delay);
                link.push_line(&reply.reply);
            });
        }
        Ok(())
    }
}
