//! Action selection and turn planning

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Ability, Battle, Participant, Team};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetChoice {
    Participant(String),
    /// Area ability, no explicit target.
    All,
}

/// What the player has picked so far this turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionSelection {
    pub ability_id: Option<String>,
    pub target: Option<TargetChoice>,
}

impl ActionSelection {
    pub fn select_ability(&mut self, ability: &Ability) {
        self.ability_id = Some(ability.id.clone());
        self.target = ability.is_area().then_some(TargetChoice::All);
    }

    /// Returns false when an area ability already owns the target slot.
    pub fn select_target(&mut self, target_id: &str) -> bool {
        if self.target == Some(TargetChoice::All) {
            return false;
        }
        self.target = Some(TargetChoice::Participant(target_id.to_string()));
        true
    }

    pub fn target_id(&self) -> Option<&str> {
        match &self.target {
            Some(TargetChoice::Participant(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ability_id.is_none() && self.target.is_none()
    }

    pub fn reset(&mut self) {
        self.ability_id = None;
        self.target = None;
    }
}

/// A fully resolved action, ready to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TurnRequest {
    pub actor_id: String,
    pub target_id: String,
    pub ability_id: String,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("The battle is still loading.")]
    BattleNotLoaded,
    #[error("No one on your team can act.")]
    NoActor,
    #[error("{0} is not on your team.")]
    UnknownActor(String),
    #[error("No abilities equipped. Equip an ability before battling.")]
    NoAbilities,
    #[error("Ability {0} is not equipped.")]
    UnknownAbility(String),
    #[error("Choose an ability first.")]
    AbilityRequired,
    #[error("Choose a target first.")]
    TargetRequired,
    #[error("{0} can't be targeted.")]
    InvalidTarget(String),
    #[error("There is nothing left to target.")]
    NoTarget,
}

/// Resolve who acts this turn: the tracked active participant, or the first
/// member of the player team (living ones first) when none is tracked.
pub fn resolve_actor<'a>(
    battle: &'a Battle,
    active_participant: Option<&str>,
) -> Result<&'a Participant, SelectionError> {
    match active_participant {
        Some(id) => battle
            .participant(id)
            .filter(|p| p.team == Team::Player)
            .ok_or_else(|| SelectionError::UnknownActor(id.to_string())),
        None => battle
            .living(Team::Player)
            .next()
            .or_else(|| battle.team(Team::Player).next())
            .ok_or(SelectionError::NoActor),
    }
}

/// Turn the current selection into a request. With `fill_defaults` (the turn
/// timer ran out) missing picks fall back to the first ability and the first
/// living enemy.
pub fn plan_turn(
    battle: &Battle,
    selection: &ActionSelection,
    active_participant: Option<&str>,
    fill_defaults: bool,
) -> Result<TurnRequest, SelectionError> {
    let actor = resolve_actor(battle, active_participant)?;
    let Some(first_ability) = actor.abilities.first() else {
        return Err(SelectionError::NoAbilities);
    };

    let ability = match selection.ability_id.as_deref() {
        Some(id) => actor
            .ability(id)
            .ok_or_else(|| SelectionError::UnknownAbility(id.to_string()))?,
        None if fill_defaults => first_ability,
        None => return Err(SelectionError::AbilityRequired),
    };

    let opponents = actor.team.opponent();
    let target_id = if ability.is_area() {
        battle
            .living(opponents)
            .next()
            .or_else(|| battle.team(opponents).next())
            .map(|p| p.id.clone())
            .ok_or(SelectionError::NoTarget)?
    } else {
        match selection.target_id() {
            Some(id) => battle
                .participant(id)
                .filter(|p| p.team == opponents && p.is_alive())
                .map(|p| p.id.clone())
                .ok_or_else(|| SelectionError::InvalidTarget(id.to_string()))?,
            None if fill_defaults => battle
                .living(opponents)
                .next()
                .map(|p| p.id.clone())
                .ok_or(SelectionError::NoTarget)?,
            None => return Err(SelectionError::TargetRequired),
        }
    };

    Ok(TurnRequest {
        actor_id: actor.id.clone(),
        target_id,
        ability_id: ability.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::fixtures::{ability, battle, participant};
    use crate::model::TargetType;

    fn hero_with(abilities: Vec<Ability>) -> Participant {
        let mut hero = participant("hero", Team::Player, 50);
        hero.abilities = abilities;
        hero
    }

    fn request(actor: &str, target: &str, ability: &str) -> TurnRequest {
        TurnRequest {
            actor_id: actor.into(),
            target_id: target.into(),
            ability_id: ability.into(),
        }
    }

    #[test]
    fn area_ability_sets_sentinel_and_single_clears_target() {
        let mut selection = ActionSelection::default();
        selection.target = Some(TargetChoice::Participant("slime".into()));

        selection.select_ability(&ability("quake", TargetType::All));
        assert_eq!(selection.target, Some(TargetChoice::All));
        assert!(!selection.select_target("slime"));

        selection.select_ability(&ability("slash", TargetType::Single));
        assert_eq!(selection.target, None);
        assert!(selection.select_target("slime"));
        assert_eq!(selection.target_id(), Some("slime"));

        selection.reset();
        assert!(selection.is_empty());
    }

    #[test]
    fn manual_confirm_needs_ability_and_target() {
        let snapshot = battle(vec![
            hero_with(vec![ability("slash", TargetType::Single)]),
            participant("slime", Team::Enemy, 10),
        ]);
        let mut selection = ActionSelection::default();
        assert_eq!(
            plan_turn(&snapshot, &selection, None, false),
            Err(SelectionError::AbilityRequired)
        );

        selection.ability_id = Some("slash".into());
        assert_eq!(
            plan_turn(&snapshot, &selection, None, false),
            Err(SelectionError::TargetRequired)
        );

        selection.select_target("slime");
        assert_eq!(
            plan_turn(&snapshot, &selection, None, false),
            Ok(request("hero", "slime", "slash"))
        );
    }

    #[test]
    fn no_abilities_is_refused() {
        let snapshot = battle(vec![
            hero_with(Vec::new()),
            participant("slime", Team::Enemy, 10),
        ]);
        assert_eq!(
            plan_turn(&snapshot, &ActionSelection::default(), None, true),
            Err(SelectionError::NoAbilities)
        );
    }

    #[test]
    fn no_player_team_is_refused() {
        let snapshot = battle(vec![participant("slime", Team::Enemy, 10)]);
        assert_eq!(
            plan_turn(&snapshot, &ActionSelection::default(), None, true),
            Err(SelectionError::NoActor)
        );
        assert_eq!(
            plan_turn(&snapshot, &ActionSelection::default(), Some("slime"), true),
            Err(SelectionError::UnknownActor("slime".into()))
        );
    }

    #[test]
    fn defaults_pick_first_ability_and_first_living_enemy() {
        let snapshot = battle(vec![
            hero_with(vec![
                ability("slash", TargetType::Single),
                ability("quake", TargetType::All),
            ]),
            participant("bat", Team::Enemy, 0),
            participant("slime", Team::Enemy, 10),
        ]);
        assert_eq!(
            plan_turn(&snapshot, &ActionSelection::default(), None, true),
            Ok(request("hero", "slime", "slash"))
        );
    }

    #[test]
    fn area_ability_targets_first_enemy_even_when_all_down() {
        let snapshot = battle(vec![
            hero_with(vec![ability("quake", TargetType::All)]),
            participant("bat", Team::Enemy, -3),
        ]);
        let mut selection = ActionSelection::default();
        selection.select_ability(&snapshot.participants[0].abilities[0].clone());
        assert_eq!(
            plan_turn(&snapshot, &selection, None, false),
            Ok(request("hero", "bat", "quake"))
        );
    }

    #[test]
    fn defeated_or_friendly_targets_are_invalid() {
        let snapshot = battle(vec![
            hero_with(vec![ability("slash", TargetType::Single)]),
            participant("ally", Team::Player, 30),
            participant("bat", Team::Enemy, 0),
        ]);
        let mut selection = ActionSelection {
            ability_id: Some("slash".into()),
            target: Some(TargetChoice::Participant("bat".into())),
        };
        assert_eq!(
            plan_turn(&snapshot, &selection, None, false),
            Err(SelectionError::InvalidTarget("bat".into()))
        );

        selection.target = Some(TargetChoice::Participant("ally".into()));
        assert_eq!(
            plan_turn(&snapshot, &selection, None, false),
            Err(SelectionError::InvalidTarget("ally".into()))
        );
    }

    #[test]
    fn tracked_actor_is_used() {
        let mut ally = participant("ally", Team::Player, 30);
        ally.abilities = vec![ability("heal", TargetType::All)];
        let snapshot = battle(vec![
            hero_with(vec![ability("slash", TargetType::Single)]),
            ally,
            participant("slime", Team::Enemy, 10),
        ]);
        assert_eq!(
            plan_turn(&snapshot, &ActionSelection::default(), Some("ally"), true),
            Ok(request("ally", "slime", "heal"))
        );
    }
}
