use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use vnlink_frame::{encode_ascii, AsciiMetadata};

use crate::command::Command;
use crate::config::ProcessorConfig;
use crate::error::{ErrorReporter, Result, SensorError, SessionError};

/// Header of the sensor's error response.
pub const ERROR_HEADER: &str = "VNERR";

struct Entry {
    command: Arc<Command>,
    timeout: Duration,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.command
            .sent_time()
            .is_some_and(|sent| now.saturating_duration_since(sent) >= self.timeout)
    }
}

/// Correlates sensor responses with the commands awaiting them.
pub struct CommandProcessor {
    queue: Mutex<VecDeque<Entry>>,
    config: ProcessorConfig,
    reporter: ErrorReporter,
}

impl CommandProcessor {
    pub fn new(config: ProcessorConfig, reporter: ErrorReporter) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
            config,
            reporter,
        }
    }

    /// Queue `command` and return the text to transmit.
    pub fn register_command(
        &self,
        command: &Arc<Command>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let mut queue = self.lock();
        if command.is_awaiting_response() {
            return Err(SessionError::CommandResent);
        }
        evict_stale(&mut queue, Instant::now());
        if queue.len() >= self.config.queue_capacity {
            return Err(SessionError::CommandQueueFull);
        }

        let text = encode_ascii(
            &format!("VN{}", command.command_string()),
            self.config.checksum,
        );
        command.prepare_to_send();
        queue.push_back(Entry {
            command: Arc::clone(command),
            timeout: timeout.unwrap_or_else(|| self.config.default_timeout()),
        });
        debug!(command = command.command_string(), queued = queue.len(), "command registered");
        Ok(text)
    }

    /// Offer a non-measurement ASCII frame to the queued commands.
    pub fn match_response(&self, text: &str, metadata: &AsciiMetadata) {
        let mut queue = self.lock();
        evict_stale(&mut queue, Instant::now());

        if metadata.header() == ERROR_HEADER {
            let code = error_code(text);
            let kind = code.map_or(SensorError::ReceivedInvalidResponse, SensorError::from_code);
            match queue.pop_front() {
                Some(entry) if code.is_some() => {
                    debug!(command = entry.command.command_string(), error = %kind, "command rejected");
                    entry.command.set_error(kind);
                }
                Some(entry) => {
                    // Unparseable error: the command still failed.
                    entry.command.set_error(kind);
                    self.reporter.report(kind, text);
                }
                None => {
                    warn!(error = %kind, "asynchronous sensor error");
                    self.reporter.report(kind, text);
                }
            }
            return;
        }

        let timestamp = metadata.timestamp();
        let Some(pos) = queue
            .iter()
            .position(|entry| entry.command.match_response(text, timestamp))
        else {
            debug!(header = metadata.header(), "unexpected message");
            self.reporter
                .report(SensorError::ReceivedUnexpectedMessage, text);
            return;
        };

        // Older commands were skipped by the sensor.
        for skipped in queue.drain(..pos) {
            debug!(command = skipped.command.command_string(), "command skipped; marking stale");
            skipped.command.set_stale();
        }
        queue.pop_front();
    }

    /// Commands awaiting a response.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Drop every queued command, marking each stale.
    pub fn reset(&self) {
        for entry in self.lock().drain(..) {
            entry.command.set_stale();
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_stale(queue: &mut VecDeque<Entry>, now: Instant) {
    while queue.front().is_some_and(|entry| entry.expired(now)) {
        if let Some(entry) = queue.pop_front() {
            debug!(command = entry.command.command_string(), "command timed out");
            entry.command.set_stale();
        }
    }
}

/// Hex code from `$VNERR,<code>*..`.
fn error_code(text: &str) -> Option<u16> {
    let body = text.trim_start_matches('$').split('*').next()?;
    let code = body.split(',').nth(1)?.trim();
    let digits = code
        .strip_prefix("0x")
        .or_else(|| code.strip_prefix("0X"))
        .unwrap_or(code);
    u16::from_str_radix(digits, 16).ok()
}
