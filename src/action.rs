use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Battle, BattleRewards, TurnResult};

#[derive(tui_dispatch::Action, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[action(infer_categories)]
pub enum Action {
    Init,
    UiTerminalResize(u16, u16),
    /// Once per second; drives the turn countdown.
    Tick,

    // ===== Battle snapshot =====
    BattleDidLoad(Box<Battle>),
    BattleDidError(String),

    // ===== Selection =====
    ActorSelect(String),
    AbilitySelect(String),
    TargetSelect(String),

    // ===== Turn =====
    /// Submit the current selection.
    TurnConfirm,
    TurnDidResolve { seq: u64, result: Box<TurnResult> },
    TurnDidFail { seq: u64, message: String },

    // ===== Result =====
    /// Leave the turn result and start the next turn.
    ResultAdvance,
    /// `None` when the rewards could not be fetched.
    RewardsDidLoad(Option<BattleRewards>),
    /// Acknowledge the victory/defeat screen.
    ResultsDismiss,

    ErrorDismiss,
    Quit,
}
