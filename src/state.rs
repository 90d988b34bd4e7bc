use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tui_dispatch::DataResource;
use tui_dispatch_debug::debug::{ron_string, DebugSection, DebugState};

use crate::countdown::TurnCountdown;
use crate::model::{Ability, Battle, BattleRewards, Participant, TurnResult};
use crate::selection::{resolve_actor, ActionSelection};

pub const BATTLE_LOG_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Phase {
    /// Waiting for the player (or the countdown) to commit an action.
    #[default]
    Selection,
    /// One turn request in flight.
    Submitting,
    /// Showing what the last turn did.
    Result,
    /// Battle over, victory or defeat screen.
    Results,
}

/// One-shot guard for the end-of-battle sequence of the current turn result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Finalization {
    #[default]
    NotStarted,
    AwaitingRewards,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BattleOutcome {
    pub victory: bool,
    pub rewards: BattleRewards,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AppState {
    pub battle_id: String,
    pub user_id: Option<String>,
    pub terminal_size: (u16, u16),

    /// Authoritative snapshot; replaced wholesale after every turn.
    pub battle: DataResource<Battle>,
    pub phase: Phase,
    pub selection: ActionSelection,
    pub active_participant: Option<String>,
    pub countdown: TurnCountdown,

    /// Bumped on every submission so late answers to an old one are dropped.
    pub submission_seq: u64,
    pub turn_result: Option<TurnResult>,
    pub finalization: Finalization,
    pub outcome: Option<BattleOutcome>,
    pub dismissed: bool,

    pub error: Option<String>,
    pub log: Vec<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(String::new(), None, TurnCountdown::default())
    }
}

impl AppState {
    pub fn new(battle_id: String, user_id: Option<String>, countdown: TurnCountdown) -> Self {
        Self {
            battle_id,
            user_id,
            terminal_size: (80, 24),
            battle: DataResource::Empty,
            phase: Phase::Selection,
            selection: ActionSelection::default(),
            active_participant: None,
            countdown,
            submission_seq: 0,
            turn_result: None,
            finalization: Finalization::NotStarted,
            outcome: None,
            dismissed: false,
            error: None,
            log: Vec::new(),
        }
    }

    pub fn current_battle(&self) -> Option<&Battle> {
        self.battle.data()
    }

    /// The participant who would act if the turn were submitted now.
    pub fn actor(&self) -> Option<&Participant> {
        let battle = self.current_battle()?;
        resolve_actor(battle, self.active_participant.as_deref()).ok()
    }

    pub fn equipped_abilities(&self) -> &[Ability] {
        self.actor()
            .map(|actor| actor.abilities.as_slice())
            .unwrap_or(&[])
    }

    pub fn selected_ability(&self) -> Option<&Ability> {
        let id = self.selection.ability_id.as_deref()?;
        self.actor()?.ability(id)
    }

    pub fn push_log<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.log.extend(lines);
        if self.log.len() > BATTLE_LOG_CAPACITY {
            let overflow = self.log.len() - BATTLE_LOG_CAPACITY;
            self.log.drain(..overflow);
        }
    }
}

impl DebugState for AppState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut sections = vec![
            DebugSection::new("Controller")
                .entry("phase", ron_string(&self.phase))
                .entry("finalization", ron_string(&self.finalization))
                .entry("submission_seq", ron_string(&self.submission_seq))
                .entry("countdown", ron_string(&self.countdown.remaining()))
                .entry("error", ron_string(&self.error)),
            DebugSection::new("Selection")
                .entry("actor", ron_string(&self.active_participant))
                .entry("ability", ron_string(&self.selection.ability_id))
                .entry("target", ron_string(&self.selection.target)),
        ];

        if let Some(battle) = self.current_battle() {
            sections.push(
                DebugSection::new("Battle")
                    .entry("id", ron_string(&battle.id))
                    .entry("turn", ron_string(&battle.turn))
                    .entry("finished", ron_string(&battle.finished))
                    .entry("winner", ron_string(&battle.winner_id)),
            );
        }

        if let Some(outcome) = &self.outcome {
            sections.push(
                DebugSection::new("Outcome")
                    .entry("victory", ron_string(&outcome.victory))
                    .entry("experience", ron_string(&outcome.rewards.experience))
                    .entry("level_up", ron_string(&outcome.rewards.level_up)),
            );
        }

        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_latest_lines() {
        let mut state = AppState::default();
        state.push_log((0..BATTLE_LOG_CAPACITY + 5).map(|i| i.to_string()));
        assert_eq!(state.log.len(), BATTLE_LOG_CAPACITY);
        assert_eq!(state.log.first().map(String::as_str), Some("5"));
    }
}
