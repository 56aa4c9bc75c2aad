//! PIN-entry gate
//!
//! When a PIN is configured the journal starts [`GateState::Locked`]. Digits
//! are collected until four are entered, then checked against the stored
//! [`PinRecord`]. Three consecutive misses lock input for 30 seconds.
//! "Forgot PIN" is the only way past the gate without the PIN and it costs
//! every stored record.
//!
//! The gate never touches storage or the session itself. Each call to
//! [`AccessGate::transition`] returns [`GateEffect`]s for the caller to apply.

use crate::clock::{duration_ms, Clock};
use postopp_core::{PinRecord, Secret, PIN_LENGTH};
use std::sync::Arc;
use std::time::Duration;
use zeroize::{Zeroize, Zeroizing};

/// Consecutive wrong PINs before lockout
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// Lockout window after too many wrong PINs
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(30);

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No PIN set; the device key unlocks automatically
    NoPinConfigured,
    /// PIN set, nothing entered yet
    Locked,
    /// Some digits entered (1 to 3)
    Unlocking {
        /// Digits entered so far
        entered: usize,
    },
    /// Input refused until the deadline
    LockedOut {
        /// End of lockout (Unix timestamp millis)
        until_ms: i64,
    },
    /// PIN accepted for this session
    Unlocked,
}

/// User input to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// Keypad digit 0-9
    Digit(u8),
    /// Backspace
    Delete,
    /// Lockout timer fired
    LockoutElapsed,
    /// "Forgot PIN" pressed; `confirmed` once the user accepted the wipe
    ForgotPin {
        /// User confirmed that all data will be erased
        confirmed: bool,
    },
}

/// Side effect requested by a transition
#[derive(Debug)]
pub enum GateEffect {
    /// Install this secret as the session secret
    Unlocked(Secret),
    /// Entered PIN was wrong
    WrongPin {
        /// Attempts left before lockout
        attempts_remaining: u32,
    },
    /// Lockout began
    LockoutStarted {
        /// Lockout length
        duration: Duration,
    },
    /// Digit refused during lockout
    InputRejected {
        /// Time until input is accepted again
        retry_after: Duration,
    },
    /// Lockout window passed; attempts reset
    LockoutEnded,
    /// Forgot-PIN needs explicit confirmation first
    ConfirmationRequired,
    /// Erase all records, disable the PIN, unlock with the device key
    WipeAndUnlock,
}

impl GateEffect {
    /// Message to show the user, if any
    pub fn user_message(&self) -> Option<String> {
        match self {
            GateEffect::WrongPin { .. } => Some("Wrong PIN. Try again.".to_string()),
            GateEffect::LockoutStarted { duration } => Some(format!(
                "Too many attempts. Wait {} seconds.",
                duration.as_secs()
            )),
            GateEffect::InputRejected { retry_after } => Some(format!(
                "Too many attempts. Wait {} seconds.",
                ceil_secs(*retry_after)
            )),
            GateEffect::ConfirmationRequired => Some(
                "Forgetting your PIN permanently deletes all logs. Confirm to continue."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_millis().div_ceil(1000) as u64
}

/// PIN-entry state machine
pub struct AccessGate {
    state: GateState,
    pin_record: Option<PinRecord>,
    entered: Zeroizing<String>,
    failed_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl AccessGate {
    /// Create gate; `None` means no PIN is configured
    pub fn new(pin_record: Option<PinRecord>, clock: Arc<dyn Clock>) -> Self {
        let state = if pin_record.is_some() {
            GateState::Locked
        } else {
            GateState::NoPinConfigured
        };
        Self {
            state,
            pin_record,
            entered: Zeroizing::new(String::with_capacity(PIN_LENGTH)),
            failed_attempts: 0,
            clock,
        }
    }

    /// Current state
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Consecutive wrong PINs in the current episode
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Number of digits entered so far
    pub fn entered_len(&self) -> usize {
        self.entered.len()
    }

    /// Whether the session may use the store
    pub fn is_open(&self) -> bool {
        matches!(self.state, GateState::Unlocked | GateState::NoPinConfigured)
    }

    /// Time left in the current lockout
    pub fn remaining_lockout(&self) -> Option<Duration> {
        match self.state {
            GateState::LockedOut { until_ms } => {
                let left = until_ms.saturating_sub(self.clock.now_ms()).max(0);
                Some(Duration::from_millis(left as u64))
            }
            _ => None,
        }
    }

    /// Re-lock an unlocked session. No-op without a PIN.
    pub fn lock(&mut self) {
        if self.pin_record.is_some() && self.state == GateState::Unlocked {
            self.state = GateState::Locked;
            self.entered.zeroize();
            tracing::debug!("Access gate re-locked");
        }
    }

    /// Replace the stored PIN (enable, change or disable).
    ///
    /// The current session stays open.
    pub fn set_pin_record(&mut self, pin_record: Option<PinRecord>) {
        self.pin_record = pin_record;
        self.entered.zeroize();
        self.failed_attempts = 0;
        self.state = if self.pin_record.is_some() {
            GateState::Unlocked
        } else {
            GateState::NoPinConfigured
        };
    }

    /// Apply one event and return the effects the caller must carry out.
    pub fn transition(&mut self, event: GateEvent) -> Vec<GateEffect> {
        let mut effects = Vec::new();
        self.expire_lockout(&mut effects);

        match (self.state, event) {
            (GateState::NoPinConfigured | GateState::Unlocked, _) => {}

            (GateState::LockedOut { .. }, GateEvent::Digit(_)) => {
                let retry_after = self.remaining_lockout().unwrap_or_default();
                effects.push(GateEffect::InputRejected { retry_after });
            }
            (GateState::LockedOut { .. }, GateEvent::Delete | GateEvent::LockoutElapsed) => {}

            (GateState::Locked | GateState::Unlocking { .. }, GateEvent::Digit(digit)) => {
                self.push_digit(digit, &mut effects);
            }
            (GateState::Locked | GateState::Unlocking { .. }, GateEvent::Delete) => {
                self.entered.pop();
                self.state = self.entry_state();
            }
            // Stale timer from an earlier episode
            (GateState::Locked | GateState::Unlocking { .. }, GateEvent::LockoutElapsed) => {}

            (_, GateEvent::ForgotPin { confirmed: false }) => {
                effects.push(GateEffect::ConfirmationRequired);
            }
            (_, GateEvent::ForgotPin { confirmed: true }) => {
                tracing::warn!("Forgot-PIN confirmed: wiping records and disabling PIN");
                self.pin_record = None;
                self.entered.zeroize();
                self.failed_attempts = 0;
                self.state = GateState::Unlocked;
                effects.push(GateEffect::WipeAndUnlock);
            }
        }

        effects
    }

    fn expire_lockout(&mut self, effects: &mut Vec<GateEffect>) {
        if let GateState::LockedOut { until_ms } = self.state {
            if self.clock.now_ms() >= until_ms {
                self.state = GateState::Locked;
                self.failed_attempts = 0;
                tracing::info!("PIN lockout ended");
                effects.push(GateEffect::LockoutEnded);
            }
        }
    }

    fn entry_state(&self) -> GateState {
        match self.entered.len() {
            0 => GateState::Locked,
            n => GateState::Unlocking { entered: n },
        }
    }

    fn push_digit(&mut self, digit: u8, effects: &mut Vec<GateEffect>) {
        if digit > 9 || self.entered.len() >= PIN_LENGTH {
            return;
        }
        self.entered.push(char::from(b'0' + digit));

        if self.entered.len() < PIN_LENGTH {
            self.state = self.entry_state();
            return;
        }

        let candidate = Secret::new(self.entered.as_str());
        self.entered.zeroize();

        if self.verify(&candidate) {
            self.failed_attempts = 0;
            self.state = GateState::Unlocked;
            tracing::info!("PIN accepted");
            effects.push(GateEffect::Unlocked(candidate));
            return;
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= MAX_FAILED_ATTEMPTS {
            let until_ms = self.clock.now_ms() + duration_ms(LOCKOUT_DURATION);
            self.state = GateState::LockedOut { until_ms };
            tracing::warn!(
                "PIN entry locked out for {}s after {} failed attempts",
                LOCKOUT_DURATION.as_secs(),
                self.failed_attempts
            );
            effects.push(GateEffect::LockoutStarted {
                duration: LOCKOUT_DURATION,
            });
        } else {
            self.state = GateState::Locked;
            let attempts_remaining = MAX_FAILED_ATTEMPTS - self.failed_attempts;
            tracing::warn!("Wrong PIN ({} attempts remaining)", attempts_remaining);
            effects.push(GateEffect::WrongPin { attempts_remaining });
        }
    }

    fn verify(&self, candidate: &Secret) -> bool {
        let Some(record) = self.pin_record.as_ref() else {
            return false;
        };
        record.verify(candidate.expose()).unwrap_or_else(|e| {
            tracing::error!("Stored PIN record is unreadable: {}", e);
            false
        })
    }
}
