use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::SensorError;

/// Where a command stands after being sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Still waiting on the sensor.
    Pending,
    /// Matching response text, `$` through checksum.
    Response(String),
    /// The sensor answered with `$VNERR`.
    Error(SensorError),
    /// The timeout elapsed before a response arrived.
    Stale,
}

#[derive(Debug, Default)]
struct State {
    awaiting: bool,
    sent_at: Option<Instant>,
    received_at: Option<Instant>,
    response: Option<String>,
    error: Option<SensorError>,
    stale: bool,
}

/// A command sent to the sensor and the state of its response.
///
/// Shared as `Arc<Command>` between the caller, who waits on it, and the
/// command processor, which completes it from the I/O context.
#[derive(Debug)]
pub struct Command {
    text: String,
    state: Mutex<State>,
    done: Condvar,
}

impl Command {
    /// A command from its body, e.g. `RRG,08`, without `$VN` or trailer.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            state: Mutex::new(State::default()),
            done: Condvar::new(),
        }
    }

    pub fn read_register(id: u8) -> Self {
        Self::new(format!("RRG,{id:02}"))
    }

    /// `values` is the comma-separated register contents.
    pub fn write_register(id: u8, values: &str) -> Self {
        Self::new(format!("WRG,{id:02},{values}"))
    }

    pub fn write_settings() -> Self {
        Self::new("WNV")
    }

    pub fn restore_factory_settings() -> Self {
        Self::new("RFS")
    }

    pub fn reset() -> Self {
        Self::new("RST")
    }

    /// Command body as sent after `$VN`.
    pub fn command_string(&self) -> &str {
        &self.text
    }

    /// Mnemonic, e.g. `RRG`.
    pub fn mnemonic(&self) -> &str {
        self.text.split(',').next().unwrap_or_default()
    }

    fn register_id(&self) -> Option<u32> {
        register_id(self.text.split(',').nth(1)?)
    }

    /// Reset response state ahead of transmission.
    pub fn prepare_to_send(&self) {
        let mut state = self.lock();
        *state = State {
            awaiting: true,
            sent_at: Some(Instant::now()),
            ..State::default()
        };
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.lock().awaiting
    }

    pub fn sent_time(&self) -> Option<Instant> {
        self.lock().sent_at
    }

    pub fn response_time(&self) -> Option<Instant> {
        self.lock().received_at
    }

    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    pub fn response(&self) -> Option<String> {
        self.lock().response.clone()
    }

    pub fn error(&self) -> Option<SensorError> {
        self.lock().error
    }

    pub fn outcome(&self) -> CommandOutcome {
        outcome(&self.lock())
    }

    /// Accept `text` if it answers this command.
    ///
    /// A response answers when its header is `VN` plus this command's
    /// mnemonic; register reads and writes must also echo the same id.
    pub fn match_response(&self, text: &str, timestamp: Instant) -> bool {
        let body = text.trim_start_matches('$');
        let body = body.split('*').next().unwrap_or_default();
        let mut tokens = body.split(',');

        let Some(mnemonic) = tokens.next().and_then(|h| h.strip_prefix("VN")) else {
            return false;
        };
        if mnemonic != self.mnemonic() {
            return false;
        }
        if matches!(mnemonic, "RRG" | "WRG")
            && tokens.next().and_then(register_id) != self.register_id()
        {
            return false;
        }

        let mut state = self.lock();
        state.awaiting = false;
        state.received_at = Some(timestamp);
        state.response = Some(text.to_string());
        self.done.notify_all();
        true
    }

    /// Mark the command as timed out.
    pub fn set_stale(&self) {
        let mut state = self.lock();
        state.awaiting = false;
        state.stale = true;
        self.done.notify_all();
    }

    pub(crate) fn set_error(&self, error: SensorError) {
        let mut state = self.lock();
        state.awaiting = false;
        state.error = Some(error);
        self.done.notify_all();
    }

    /// Block until the command completes or `timeout` passes.
    ///
    /// Staleness is only detected when the processor's queue is next
    /// touched, so a timed-out wait may still report `Pending`.
    pub fn wait(&self, timeout: Duration) -> CommandOutcome {
        let guard = self.lock();
        let (state, _) = self
            .done
            .wait_timeout_while(guard, timeout, |s| s.awaiting)
            .unwrap_or_else(PoisonError::into_inner);
        outcome(&state)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn outcome(state: &State) -> CommandOutcome {
    if let Some(response) = &state.response {
        CommandOutcome::Response(response.clone())
    } else if let Some(error) = state.error {
        CommandOutcome::Error(error)
    } else if state.stale {
        CommandOutcome::Stale
    } else {
        CommandOutcome::Pending
    }
}

fn register_id(token: &str) -> Option<u32> {
    token.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn matches_mnemonic_and_register_id() {
        let cmd = Command::read_register(8);
        cmd.prepare_to_send();
        let now = Instant::now();
        assert!(!cmd.match_response("$VNRRG,09,1,2,3*1234", now));
        assert!(!cmd.match_response("$VNWRG,08,1,2,3*1234", now));
        assert!(!cmd.match_response("$VNYPR,1,2,3*00", now));
        assert!(cmd.is_awaiting_response());

        assert!(cmd.match_response("$VNRRG,8,1,2,3*1234", now));
        assert!(!cmd.is_awaiting_response());
        assert_eq!(cmd.response_time(), Some(now));
        assert_eq!(
            cmd.outcome(),
            CommandOutcome::Response("$VNRRG,8,1,2,3*1234".into())
        );
    }

    #[test]
    fn plain_commands_match_on_mnemonic() {
        let cmd = Command::write_settings();
        cmd.prepare_to_send();
        assert!(cmd.match_response("$VNWNV*57", Instant::now()));
    }

    #[test]
    fn prepare_clears_previous_outcome() {
        let cmd = Command::reset();
        cmd.prepare_to_send();
        cmd.set_stale();
        assert_eq!(cmd.outcome(), CommandOutcome::Stale);
        cmd.prepare_to_send();
        assert_eq!(cmd.outcome(), CommandOutcome::Pending);
        assert!(cmd.sent_time().is_some());
    }

    #[test]
    fn wait_wakes_on_completion() {
        let cmd = Arc::new(Command::read_register(1));
        cmd.prepare_to_send();
        let waiter = {
            let cmd = Arc::clone(&cmd);
            thread::spawn(move || cmd.wait(Duration::from_secs(5)))
        };
        cmd.set_error(SensorError::InvalidRegister);
        assert_eq!(
            waiter.join().unwrap(),
            CommandOutcome::Error(SensorError::InvalidRegister)
        );
        assert_eq!(cmd.wait(Duration::ZERO), CommandOutcome::Error(SensorError::InvalidRegister));
    }

    #[test]
    fn wait_times_out_pending() {
        let cmd = Command::new("RRG,05");
        cmd.prepare_to_send();
        assert_eq!(cmd.wait(Duration::from_millis(10)), CommandOutcome::Pending);
    }
}
