//! Run loop: owns the device lifecycle and keeps the sign alive forever.
//!
//! The supervisor is a two-state machine:
//!
//! ```text
//!             open ok                      script done
//! Connecting ────────▶ Running ──────────────────────────▶ Connecting
//!     ▲  │                 │
//!     │  │ open failed     │ script failed
//!     │  ▼                 ▼
//!     └── log, wait retry_delay
//! ```
//!
//! Every pass re-opens the device, so a sign that was unplugged and plugged
//! back in is picked up without operator help. It is the only place in the
//! crate that recovers from a [`BoardError`].

use crate::Clock;
use crate::board::Readerboard;
use crate::error::{BoardError, Result};
use crate::script::{Directive, run_script};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default pause between a failure and the next attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub retry_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

// ── Seams ────────────────────────────────────────────────────────────

/// Produces a freshly opened transport for each pass.
pub trait Opener {
    type Transport: Transport;

    fn open(&mut self) -> Result<Self::Transport>;
}

impl<F, T> Opener for F
where
    F: FnMut() -> Result<T>,
    T: Transport,
{
    type Transport = T;

    fn open(&mut self) -> Result<T> {
        self()
    }
}

/// Produces the directives to play on each pass.
pub trait ScriptSource {
    fn script(&mut self) -> Vec<Directive>;
}

impl<F> ScriptSource for F
where
    F: FnMut() -> Vec<Directive>,
{
    fn script(&mut self) -> Vec<Directive> {
        self()
    }
}

// ── State machine ────────────────────────────────────────────────────

pub enum State<T: Transport> {
    Connecting,
    Running(Readerboard<T>),
}

impl<T: Transport> State<T> {
    pub fn is_running(&self) -> bool {
        matches!(self, State::Running(_))
    }
}

pub struct Supervisor<O: Opener, S, C> {
    opener: O,
    source: S,
    clock: C,
    config: SupervisorConfig,
    state: State<O::Transport>,
    failures: u64,
}

impl<O, S, C> Supervisor<O, S, C>
where
    O: Opener,
    S: ScriptSource,
    C: Clock,
{
    pub fn new(opener: O, source: S, clock: C, config: SupervisorConfig) -> Self {
        Self {
            opener,
            source,
            clock,
            config,
            state: State::Connecting,
            failures: 0,
        }
    }

    pub fn state(&self) -> &State<O::Transport> {
        &self.state
    }

    /// Failures seen since the supervisor was created.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Step until `running` is cleared. With the flag left set this never
    /// returns.
    pub fn run(&mut self, running: &AtomicBool) {
        tracing::info!(
            "Supervisor started (retry delay {:?})",
            self.config.retry_delay
        );
        while running.load(Ordering::SeqCst) {
            self.step();
        }
        tracing::info!("Supervisor stopped after {} failure(s)", self.failures);
    }

    /// Perform exactly one state transition.
    pub fn step(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::Connecting) {
            State::Connecting => match self.opener.open() {
                Ok(transport) => {
                    tracing::info!("Readerboard connected");
                    State::Running(Readerboard::new(transport))
                }
                Err(e) => {
                    self.recover(e);
                    State::Connecting
                }
            },
            State::Running(mut board) => {
                let script = self.source.script();
                if let Err(e) = run_script(&mut board, &script, &mut self.clock) {
                    // Drop the handle before waiting so the device is free
                    // to re-enumerate.
                    drop(board);
                    self.recover(e);
                }
                State::Connecting
            }
        };
    }

    fn recover(&mut self, error: BoardError) {
        self.failures += 1;
        match &error {
            BoardError::DeviceNotFound(_) => tracing::warn!("{error}"),
            BoardError::Configuration(_) | BoardError::Transfer(_) => {
                tracing::error!("{error}")
            }
            BoardError::InvalidBuffer(_) => tracing::error!("script bug: {error}"),
        }
        tracing::info!("Retrying in {:?}", self.config.retry_delay);
        self.clock.sleep(self.config.retry_delay);
    }
}
