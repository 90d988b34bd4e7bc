//! Effects - side effects declared by the reducer

use crate::selection::TurnRequest;

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Fetch the initial battle snapshot
    LoadBattle { battle_id: String },
    /// Send one turn to the battle service; the answer carries `seq` back
    SubmitTurn {
        seq: u64,
        battle_id: String,
        request: TurnRequest,
    },
    /// Fetch rewards for a won battle whose turn result had none inline
    FetchRewards { battle_id: String },
    /// The player acknowledged the results screen; leave the battle
    ReportDismissed { battle_id: String, victory: bool },
}
