//! Per-turn countdown

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TURN_SECONDS: u32 = 30;

/// What a single tick did to the countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownTick {
    /// Not armed; nothing happened.
    Idle,
    Running(u32),
    /// Reached zero on this tick. Reported once, the countdown disarms itself.
    Expired,
}

/// Turn timer. Only armed while the player is choosing an action; the
/// controller arms it when entering selection and cancels it on the way out.
///
/// The countdown counts ticks, not wall time. It is driven by the app's shared
/// 1 s interval, which is not realigned when the countdown is armed, so the
/// first tick can land anywhere inside the first second. A turn therefore
/// lasts between `budget - 1` and `budget` seconds of wall time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TurnCountdown {
    budget: u32,
    remaining: u32,
    armed: bool,
}

impl TurnCountdown {
    pub fn new(budget: u32) -> Self {
        let budget = budget.max(1);
        Self {
            budget,
            remaining: budget,
            armed: false,
        }
    }

    pub fn start(&mut self) {
        self.remaining = self.budget;
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.remaining = self.budget;
        self.armed = false;
    }

    /// Expires on exactly the `budget`-th tick after `start`.
    pub fn tick(&mut self) -> CountdownTick {
        if !self.armed {
            return CountdownTick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.armed = false;
            CountdownTick::Expired
        } else {
            CountdownTick::Running(self.remaining)
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Default for TurnCountdown {
    fn default() -> Self {
        Self::new(DEFAULT_TURN_SECONDS)
    }
}
