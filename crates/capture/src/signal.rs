use dcap_media_info::VideoFormat;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalState<F> {
    NoSignal,
    Detecting,
    Configured(F),
    Running(F),
    Reconfiguring { current: F, next: F },
    Stopped,
}

impl<F> SignalState<F> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoSignal => "no-signal",
            Self::Detecting => "detecting",
            Self::Configured(_) => "configured",
            Self::Running(_) => "running",
            Self::Reconfiguring { .. } => "reconfiguring",
            Self::Stopped => "stopped",
        }
    }
}

impl<F> fmt::Display for SignalState<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the worker has to do with the stream after a detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<F> {
    /// First format seen this session: configure and start.
    Configure(F),
    /// Format unchanged: pop and process a slot.
    Acquire,
    /// Format differs from the configured one: stop, reconfigure, restart.
    Reconfigure(F),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Cannot handle '{event}' while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("Signal state machine is stopped")]
    Stopped,
}

/// Tracks signal presence and the configured format of one capture session.
///
/// The machine only decides; the worker performs the stream operations and
/// reports back through [`stream_started`](Self::stream_started) and
/// [`reconfigured`](Self::reconfigured).
#[derive(Debug, Clone)]
pub struct SignalStateMachine<F = VideoFormat> {
    state: SignalState<F>,
    configured: Option<F>,
    reconfigurations: u64,
}

impl<F: PartialEq + Clone> Default for SignalStateMachine<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: PartialEq + Clone> SignalStateMachine<F> {
    pub fn new() -> Self {
        Self {
            state: SignalState::NoSignal,
            configured: None,
            reconfigurations: 0,
        }
    }

    pub fn state(&self) -> &SignalState<F> {
        &self.state
    }

    /// The last format the stream was configured with. Survives signal loss.
    pub fn configured(&self) -> Option<&F> {
        self.configured.as_ref()
    }

    pub fn reconfigurations(&self) -> u64 {
        self.reconfigurations
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, SignalState::Stopped)
    }

    pub fn signal_present(&mut self) -> Result<(), StateError> {
        match self.state {
            SignalState::NoSignal | SignalState::Detecting => {
                self.state = SignalState::Detecting;
                Ok(())
            }
            _ => Err(self.invalid("signal-present")),
        }
    }

    /// Returns `true` when this call is what took the signal away.
    pub fn signal_lost(&mut self) -> Result<bool, StateError> {
        match self.state {
            SignalState::NoSignal => Ok(false),
            SignalState::Detecting | SignalState::Running(_) => {
                self.state = SignalState::NoSignal;
                Ok(true)
            }
            _ => Err(self.invalid("signal-lost")),
        }
    }

    pub fn format_detected(&mut self, format: F) -> Result<Decision<F>, StateError> {
        match &self.state {
            SignalState::Detecting => match &self.configured {
                None => {
                    self.configured = Some(format.clone());
                    self.state = SignalState::Configured(format.clone());
                    Ok(Decision::Configure(format))
                }
                Some(current) if *current == format => {
                    self.state = SignalState::Running(format);
                    Ok(Decision::Acquire)
                }
                Some(current) => {
                    self.state = SignalState::Reconfiguring {
                        current: current.clone(),
                        next: format.clone(),
                    };
                    self.reconfigurations += 1;
                    Ok(Decision::Reconfigure(format))
                }
            },
            SignalState::Running(current) if *current == format => Ok(Decision::Acquire),
            SignalState::Running(current) => {
                self.state = SignalState::Reconfiguring {
                    current: current.clone(),
                    next: format.clone(),
                };
                self.reconfigurations += 1;
                Ok(Decision::Reconfigure(format))
            }
            _ => Err(self.invalid("format-detected")),
        }
    }

    pub fn reconfigured(&mut self) -> Result<(), StateError> {
        match &self.state {
            SignalState::Reconfiguring { next, .. } => {
                let next = next.clone();
                self.configured = Some(next.clone());
                self.state = SignalState::Configured(next);
                Ok(())
            }
            _ => Err(self.invalid("reconfigured")),
        }
    }

    pub fn stream_started(&mut self) -> Result<(), StateError> {
        match &self.state {
            SignalState::Configured(format) => {
                self.state = SignalState::Running(format.clone());
                Ok(())
            }
            _ => Err(self.invalid("stream-started")),
        }
    }

    /// Terminal. A new session needs a new machine.
    pub fn stop(&mut self) {
        self.state = SignalState::Stopped;
    }

    fn invalid(&self, event: &'static str) -> StateError {
        if self.is_stopped() {
            StateError::Stopped
        } else {
            StateError::InvalidTransition {
                state: self.state.name(),
                event,
            }
        }
    }
}
