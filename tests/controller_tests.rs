//! Battle turn controller scenarios, driven through the effect store harness.

use std::collections::BTreeMap;

use battletui::{
    action::Action,
    countdown::TurnCountdown,
    effect::Effect,
    model::{
        Ability, Battle, BattleRewards, CombatStats, Participant, ParticipantOutcome, TargetType,
        Team, TurnResult,
    },
    reducer::reducer,
    selection::SelectionError,
    state::{AppState, Finalization, Phase},
};
use pretty_assertions::assert_eq;
use tui_dispatch::testing::*;
use tui_dispatch::EffectStore;

const TURN_SECONDS: u32 = 3;

fn ability(id: &str, target_type: TargetType) -> Ability {
    Ability {
        id: id.into(),
        name: id.into(),
        target_type,
        description: None,
    }
}

fn participant(id: &str, team: Team, hp: i32, abilities: Vec<Ability>) -> Participant {
    Participant {
        id: id.into(),
        name: id.into(),
        team,
        user_id: None,
        current_health: hp,
        max_health: 100,
        stats: CombatStats::default(),
        status_effects: Vec::new(),
        buffs: Vec::new(),
        debuffs: Vec::new(),
        abilities,
    }
}

fn snapshot(hero_hp: i32, slime_hp: i32) -> Battle {
    Battle {
        id: "b1".into(),
        turn: 1,
        finished: false,
        winner_id: None,
        started_at: None,
        ended_at: None,
        participants: vec![
            participant(
                "hero",
                Team::Player,
                hero_hp,
                vec![ability("slash", TargetType::Single)],
            ),
            participant("slime", Team::Enemy, slime_hp, Vec::new()),
        ],
    }
}

fn turn_result(battle: Battle, winner: Option<Team>) -> TurnResult {
    let mut player_results = BTreeMap::new();
    player_results.insert(
        "hero".to_string(),
        ParticipantOutcome {
            damage: 12,
            hit: true,
            messages: vec!["hero used slash".into()],
            ..Default::default()
        },
    );
    let mut enemy_results = BTreeMap::new();
    enemy_results.insert(
        "slime".to_string(),
        ParticipantOutcome {
            damage: 3,
            hit: true,
            messages: vec!["slime wobbles".into()],
            ..Default::default()
        },
    );
    TurnResult {
        turn: battle.turn,
        finished: winner.is_some(),
        winner_team: winner,
        player_results,
        enemy_results,
        battle,
        rewards: None,
    }
}

fn loaded_state(battle: Battle) -> AppState {
    let mut state = AppState::new(
        "b1".into(),
        Some("user-1".into()),
        TurnCountdown::new(TURN_SECONDS),
    );
    let init = reducer(&mut state, Action::Init);
    assert!(matches!(&init.effects[..], [Effect::LoadBattle { battle_id }] if battle_id == "b1"));
    reducer(&mut state, Action::BattleDidLoad(Box::new(battle)));
    assert_eq!(state.phase, Phase::Selection);
    state
}

/// Select slash on the slime and confirm. The first submission of a battle
/// carries sequence 1.
macro_rules! submit_slash {
    ($harness:expr) => {{
        $harness.dispatch_collect(Action::AbilitySelect("slash".into()));
        $harness.dispatch_collect(Action::TargetSelect("slime".into()));
        $harness.drain_effects().effects_empty();
        $harness.dispatch_collect(Action::TurnConfirm);
        $harness.assert_state(|s| s.phase == Phase::Submitting && s.submission_seq == 1);
        let effects = $harness.drain_effects();
        effects.effects_count(1);
        effects.effects_first_matches(|e| {
            matches!(
                e,
                Effect::SubmitTurn { seq: 1, request, .. }
                    if request.actor_id == "hero"
                        && request.target_id == "slime"
                        && request.ability_id == "slash"
            )
        });
        1u64
    }};
}

#[test]
fn ongoing_turn_returns_to_fresh_selection() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(80, 50)), reducer);
    let seq = submit_slash!(harness);

    let next = Battle {
        turn: 2,
        ..snapshot(77, 38)
    };
    harness.complete_action(Action::TurnDidResolve {
        seq,
        result: Box::new(turn_result(next, None)),
    });
    harness.process_emitted();
    harness.assert_state(|s| s.phase == Phase::Result);
    harness.assert_state(|s| s.current_battle().map(|b| b.turn) == Some(2));
    harness.assert_state(|s| s.log.iter().any(|line| line == "hero used slash"));
    harness.assert_state(|s| !s.countdown.is_armed());

    harness.dispatch_collect(Action::ResultAdvance);
    harness.drain_effects().effects_empty();
    harness.assert_state(|s| s.phase == Phase::Selection);
    harness.assert_state(|s| s.selection.is_empty());
    harness.assert_state(|s| s.turn_result.is_none());
    harness.assert_state(|s| {
        s.countdown.is_armed() && s.countdown.remaining() == s.countdown.budget()
    });
}

#[test]
fn finished_turn_finalizes_once() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(80, 10)), reducer);
    let seq = submit_slash!(harness);

    let mut result = turn_result(snapshot(80, 0), Some(Team::Player));
    result.battle.finished = true;
    harness.dispatch_collect(Action::TurnDidResolve {
        seq,
        result: Box::new(result),
    });
    harness.assert_state(|s| s.finalization == Finalization::AwaitingRewards);
    let effects = harness.drain_effects();
    effects.effects_count(1);
    effects.effects_first_matches(|e| matches!(e, Effect::FetchRewards { .. }));

    // Re-renders and repeated advances must not restart the sequence.
    for _ in 0..3 {
        harness.dispatch_collect(Action::ResultAdvance);
        harness.dispatch_collect(Action::Tick);
    }
    harness.drain_effects().effects_empty();

    harness.complete_action(Action::RewardsDidLoad(Some(BattleRewards {
        experience: 120,
        level_up: true,
        ..Default::default()
    })));
    harness.process_emitted();
    harness.assert_state(|s| s.phase == Phase::Results);
    harness.assert_state(|s| {
        s.outcome
            .as_ref()
            .is_some_and(|o| o.victory && o.rewards.experience == 120 && o.rewards.level_up)
    });

    // A late duplicate is ignored.
    harness.complete_action(Action::RewardsDidLoad(None));
    let (changed, total) = harness.process_emitted();
    assert_eq!((changed, total), (0, 1));
}

#[test]
fn dismissing_results_reports_once_and_nothing_else() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(80, 10)), reducer);
    let seq = submit_slash!(harness);

    let mut result = turn_result(snapshot(80, 0), Some(Team::Player));
    result.rewards = Some(BattleRewards {
        experience: 40,
        ..Default::default()
    });
    harness.complete_action(Action::TurnDidResolve {
        seq,
        result: Box::new(result),
    });
    harness.process_emitted();
    harness.drain_effects().effects_empty();
    harness.assert_state(|s| s.phase == Phase::Results);

    harness.dispatch_collect(Action::ResultsDismiss);
    harness.dispatch_collect(Action::ResultsDismiss);
    harness.dispatch_collect(Action::TurnConfirm);
    harness.dispatch_collect(Action::Tick);
    let effects = harness.drain_effects();
    effects.effects_count(1);
    effects.effects_all_match(|e| {
        matches!(e, Effect::ReportDismissed { victory: true, battle_id } if battle_id == "b1")
    });
}

#[test]
fn defeat_skips_reward_fetch() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(5, 50)), reducer);
    let seq = submit_slash!(harness);

    harness.dispatch_collect(Action::TurnDidResolve {
        seq,
        result: Box::new(turn_result(snapshot(0, 50), Some(Team::Enemy))),
    });
    let effects = harness.drain_effects();
    effects.effects_none_match(|e| matches!(e, Effect::FetchRewards { .. }));
    harness.assert_state(|s| s.phase == Phase::Results);
    harness.assert_state(|s| {
        s.outcome
            .as_ref()
            .is_some_and(|o| !o.victory && o.rewards.experience == 0 && !o.rewards.level_up)
    });
}

#[test]
fn indeterminate_winner_is_not_a_victory() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(30, 30)), reducer);
    let seq = submit_slash!(harness);

    let mut result = turn_result(snapshot(30, 30), None);
    result.finished = true;
    harness.complete_action(Action::TurnDidResolve {
        seq,
        result: Box::new(result),
    });
    harness.process_emitted();
    harness.drain_effects().effects_empty();
    harness.assert_state(|s| s.phase == Phase::Results);
    harness.assert_state(|s| s.outcome.as_ref().is_some_and(|o| !o.victory));
}

#[test]
fn rejected_submission_reverts_without_touching_snapshot() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(80, 50)), reducer);
    let seq = submit_slash!(harness);

    harness.complete_action(Action::TurnDidFail {
        seq,
        message: "X".into(),
    });
    harness.process_emitted();
    harness.assert_state(|s| s.phase == Phase::Selection);
    harness.assert_state(|s| s.error.as_deref() == Some("X"));
    harness.assert_state(|s| s.current_battle() == Some(&snapshot(80, 50)));
    harness.assert_state(|s| s.countdown.is_armed());
}

#[test]
fn stale_resolution_is_dropped() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(80, 50)), reducer);
    let seq = submit_slash!(harness);
    harness.complete_action(Action::TurnDidFail {
        seq,
        message: "timeout".into(),
    });
    harness.process_emitted();

    harness.complete_action(Action::TurnDidResolve {
        seq,
        result: Box::new(turn_result(snapshot(80, 10), None)),
    });
    let (changed, _) = harness.process_emitted();
    assert_eq!(changed, 0);
    harness.assert_state(|s| s.phase == Phase::Selection);
}

#[test]
fn no_abilities_never_submits() {
    let mut battle = snapshot(80, 50);
    battle.participants[0].abilities.clear();
    let mut harness = EffectStoreTestHarness::new(loaded_state(battle), reducer);

    harness.dispatch_collect(Action::TurnConfirm);
    harness.drain_effects().effects_empty();
    harness.assert_state(|s| s.phase == Phase::Selection);
    harness.assert_state(|s| {
        s.error.as_deref() == Some(SelectionError::NoAbilities.to_string().as_str())
    });

    // Expiry falls back to defaults, which still can't produce an action.
    for _ in 0..TURN_SECONDS {
        harness.dispatch_collect(Action::Tick);
    }
    harness.drain_effects().effects_empty();
    harness.assert_state(|s| s.phase == Phase::Selection);
}

#[test]
fn countdown_expiry_fills_in_target() {
    let mut harness = EffectStoreTestHarness::new(loaded_state(snapshot(80, 50)), reducer);
    harness.dispatch_collect(Action::AbilitySelect("slash".into()));

    for _ in 0..TURN_SECONDS - 1 {
        harness.dispatch_collect(Action::Tick);
    }
    harness.drain_effects().effects_empty();
    harness.assert_state(|s| s.phase == Phase::Selection);

    harness.dispatch_collect(Action::Tick);
    let effects = harness.drain_effects();
    effects.effects_count(1);
    effects.effects_first_matches(|e| {
        matches!(
            e,
            Effect::SubmitTurn { request, .. }
                if request.target_id == "slime" && request.ability_id == "slash"
        )
    });
    harness.assert_state(|s| s.phase == Phase::Submitting);
}

#[test]
fn already_finished_battle_opens_on_results() {
    let mut finished = snapshot(60, 0);
    finished.finished = true;
    finished.winner_id = Some("hero".into());

    let mut store = EffectStore::new(AppState::default(), reducer);
    let result = store.dispatch(Action::BattleDidLoad(Box::new(finished)));
    assert!(result.changed);
    assert_eq!(result.effects.len(), 1);
    assert!(matches!(result.effects[0], Effect::FetchRewards { .. }));
    assert_eq!(store.state().finalization, Finalization::AwaitingRewards);

    store.dispatch(Action::RewardsDidLoad(None));
    assert_eq!(store.state().phase, Phase::Results);
    assert_eq!(
        store.state().outcome.as_ref().map(|o| o.rewards.clone()),
        Some(BattleRewards::default())
    );
}

#[test]
fn load_failure_then_retry() {
    let mut store = EffectStore::new(AppState::default(), reducer);
    store.dispatch(Action::Init);
    store.dispatch(Action::BattleDidError("not found".into()));
    assert!(store.state().battle.is_failed());

    let result = store.dispatch(Action::Init);
    assert!(store.state().battle.is_loading());
    assert!(matches!(result.effects[0], Effect::LoadBattle { .. }));
}
