//! Battle turn controller: (state, action) -> DispatchResult

use tracing::{debug, info};
use tui_dispatch::{DataResource, DispatchResult};

use crate::action::Action;
use crate::countdown::CountdownTick;
use crate::effect::Effect;
use crate::model::{Battle, BattleRewards, BattleStatus, Team, TurnResult};
use crate::selection::{plan_turn, SelectionError};
use crate::state::{AppState, BattleOutcome, Finalization, Phase};

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::Init => {
            if state.battle.is_loaded() {
                return DispatchResult::unchanged();
            }
            state.battle = DataResource::Loading;
            DispatchResult::changed_with(Effect::LoadBattle {
                battle_id: state.battle_id.clone(),
            })
        }
        Action::UiTerminalResize(width, height) => {
            if state.terminal_size != (width, height) {
                state.terminal_size = (width, height);
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }
        Action::Tick => countdown_tick(state),

        Action::BattleDidLoad(battle) => battle_loaded(state, *battle),
        Action::BattleDidError(error) => {
            state.error = Some(format!("Could not load battle: {}", error));
            state.battle = DataResource::Failed(error);
            DispatchResult::changed()
        }

        Action::ActorSelect(id) => select_actor(state, &id),
        Action::AbilitySelect(id) => select_ability(state, &id),
        Action::TargetSelect(id) => select_target(state, &id),

        Action::TurnConfirm => submit_turn(state, false),
        Action::TurnDidResolve { seq, result } => turn_resolved(state, seq, *result),
        Action::TurnDidFail { seq, message } => turn_failed(state, seq, message),

        Action::ResultAdvance => advance(state),
        Action::RewardsDidLoad(rewards) => rewards_loaded(state, rewards),
        Action::ResultsDismiss => dismiss(state),

        Action::ErrorDismiss => {
            if state.error.take().is_some() {
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }
        Action::Quit => DispatchResult::unchanged(),
    }
}

/// Every phase change goes through here so the countdown only ever runs
/// while in selection.
fn enter_phase(state: &mut AppState, next: Phase) {
    let previous = std::mem::replace(&mut state.phase, next);
    if next == Phase::Selection {
        state.countdown.start();
    } else {
        state.countdown.cancel();
    }
    debug!(?previous, ?next, "battle phase");
}

fn battle_loaded(state: &mut AppState, battle: Battle) -> DispatchResult<Effect> {
    if state.battle.is_loaded() {
        return DispatchResult::unchanged();
    }

    let status = battle.status(state.user_id.as_deref());
    let finished = battle.finished;
    state.push_log([format!("Battle started. Turn {}.", battle.turn.max(1))]);
    state.battle = DataResource::Loaded(battle);
    state.selection.reset();
    state.error = None;

    if finished {
        // Opened after the fact: skip straight to the results.
        enter_phase(state, Phase::Result);
        return finalize(state, status == BattleStatus::Won, None);
    }

    enter_phase(state, Phase::Selection);
    DispatchResult::changed()
}

fn countdown_tick(state: &mut AppState) -> DispatchResult<Effect> {
    if state.phase != Phase::Selection {
        return DispatchResult::unchanged();
    }
    match state.countdown.tick() {
        CountdownTick::Idle => DispatchResult::unchanged(),
        CountdownTick::Running(_) => DispatchResult::changed(),
        CountdownTick::Expired => {
            debug!("turn countdown expired, submitting with defaults");
            submit_turn(state, true)
        }
    }
}

fn select_actor(state: &mut AppState, id: &str) -> DispatchResult<Effect> {
    if state.phase != Phase::Selection || state.active_participant.as_deref() == Some(id) {
        return DispatchResult::unchanged();
    }
    let valid = state
        .current_battle()
        .and_then(|battle| battle.participant(id))
        .is_some_and(|p| p.team == Team::Player && p.is_alive());
    if !valid {
        return DispatchResult::unchanged();
    }
    state.active_participant = Some(id.to_string());
    state.selection.reset();
    DispatchResult::changed()
}

fn select_ability(state: &mut AppState, id: &str) -> DispatchResult<Effect> {
    if state.phase != Phase::Selection {
        return DispatchResult::unchanged();
    }
    let Some(ability) = state.actor().and_then(|actor| actor.ability(id)).cloned() else {
        return DispatchResult::unchanged();
    };
    state.selection.select_ability(&ability);
    state.error = None;
    DispatchResult::changed()
}

fn select_target(state: &mut AppState, id: &str) -> DispatchResult<Effect> {
    if state.phase != Phase::Selection {
        return DispatchResult::unchanged();
    }
    let Some(actor_team) = state.actor().map(|actor| actor.team) else {
        return DispatchResult::unchanged();
    };
    let targetable = state
        .current_battle()
        .and_then(|battle| battle.participant(id))
        .is_some_and(|p| p.team == actor_team.opponent() && p.is_alive());
    if !targetable || !state.selection.select_target(id) {
        return DispatchResult::unchanged();
    }
    state.error = None;
    DispatchResult::changed()
}

fn submit_turn(state: &mut AppState, fill_defaults: bool) -> DispatchResult<Effect> {
    if state.phase != Phase::Selection {
        return DispatchResult::unchanged();
    }

    let plan = match state.current_battle() {
        Some(battle) => plan_turn(
            battle,
            &state.selection,
            state.active_participant.as_deref(),
            fill_defaults,
        ),
        None => Err(SelectionError::BattleNotLoaded),
    };

    match plan {
        Ok(request) => {
            state.error = None;
            state.submission_seq += 1;
            enter_phase(state, Phase::Submitting);
            DispatchResult::changed_with(Effect::SubmitTurn {
                seq: state.submission_seq,
                battle_id: state.battle_id.clone(),
                request,
            })
        }
        Err(err) => {
            debug!(error = %err, fill_defaults, "turn submission refused");
            state.error = Some(err.to_string());
            DispatchResult::changed()
        }
    }
}

fn turn_resolved(state: &mut AppState, seq: u64, result: TurnResult) -> DispatchResult<Effect> {
    if state.phase != Phase::Submitting || seq != state.submission_seq {
        debug!(seq, current = state.submission_seq, "dropping stale turn result");
        return DispatchResult::unchanged();
    }

    let mut lines = vec![format!("Turn {}", result.turn)];
    lines.extend(result.messages().cloned());
    state.push_log(lines);

    let finished = result.finished;
    state.battle = DataResource::Loaded(result.battle.clone());
    state.turn_result = Some(result);
    state.finalization = Finalization::NotStarted;
    enter_phase(state, Phase::Result);

    if finished {
        return begin_finalization(state);
    }
    DispatchResult::changed()
}

fn turn_failed(state: &mut AppState, seq: u64, message: String) -> DispatchResult<Effect> {
    if state.phase != Phase::Submitting || seq != state.submission_seq {
        return DispatchResult::unchanged();
    }
    state.error = Some(message);
    enter_phase(state, Phase::Selection);
    DispatchResult::changed()
}

fn advance(state: &mut AppState) -> DispatchResult<Effect> {
    if state.phase != Phase::Result {
        return DispatchResult::unchanged();
    }
    let finished = state.turn_result.as_ref().map_or(true, |result| result.finished);
    if finished {
        // Finalization already started when the result arrived.
        return begin_finalization(state);
    }

    state.turn_result = None;
    state.finalization = Finalization::NotStarted;
    state.selection.reset();
    let active_down = match (state.active_participant.as_deref(), state.current_battle()) {
        (Some(id), Some(battle)) => battle.participant(id).map_or(true, |p| p.is_defeated()),
        _ => false,
    };
    if active_down {
        state.active_participant = None;
    }
    enter_phase(state, Phase::Selection);
    DispatchResult::changed()
}

fn begin_finalization(state: &mut AppState) -> DispatchResult<Effect> {
    if state.finalization != Finalization::NotStarted {
        return DispatchResult::unchanged();
    }
    let Some(result) = state.turn_result.as_ref().filter(|result| result.finished) else {
        return DispatchResult::unchanged();
    };
    let victory = result.is_victory();
    let inline = result.rewards.clone();
    finalize(state, victory, inline)
}

fn finalize(
    state: &mut AppState,
    victory: bool,
    inline: Option<BattleRewards>,
) -> DispatchResult<Effect> {
    match inline {
        Some(rewards) => {
            complete(state, victory, rewards);
            DispatchResult::changed()
        }
        None if victory => {
            state.finalization = Finalization::AwaitingRewards;
            state.outcome = Some(BattleOutcome {
                victory,
                rewards: BattleRewards::default(),
            });
            DispatchResult::changed_with(Effect::FetchRewards {
                battle_id: state.battle_id.clone(),
            })
        }
        None => {
            complete(state, victory, BattleRewards::default());
            DispatchResult::changed()
        }
    }
}

fn complete(state: &mut AppState, victory: bool, rewards: BattleRewards) {
    info!(
        battle_id = %state.battle_id,
        victory,
        experience = rewards.experience,
        level_up = rewards.level_up,
        "battle finished"
    );
    state.finalization = Finalization::Complete;
    state.outcome = Some(BattleOutcome { victory, rewards });
    enter_phase(state, Phase::Results);
}

fn rewards_loaded(state: &mut AppState, rewards: Option<BattleRewards>) -> DispatchResult<Effect> {
    if state.finalization != Finalization::AwaitingRewards {
        return DispatchResult::unchanged();
    }
    let victory = state.outcome.as_ref().is_some_and(|outcome| outcome.victory);
    complete(state, victory, rewards.unwrap_or_default());
    DispatchResult::changed()
}

fn dismiss(state: &mut AppState) -> DispatchResult<Effect> {
    if state.phase != Phase::Results || state.dismissed {
        return DispatchResult::unchanged();
    }
    state.dismissed = true;
    let victory = state.outcome.as_ref().is_some_and(|outcome| outcome.victory);
    DispatchResult::changed_with(Effect::ReportDismissed {
        battle_id: state.battle_id.clone(),
        victory,
    })
}
