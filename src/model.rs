//! Battle domain model, as ingested from the battle service

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical team tag, computed once when a snapshot is ingested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Player,
    Enemy,
}

impl Team {
    pub fn label(self) -> &'static str {
        match self {
            Team::Player => "player",
            Team::Enemy => "enemy",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Team::Player => Team::Enemy,
            Team::Enemy => Team::Player,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    Single,
    All,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ability {
    pub id: String,
    pub name: String,
    pub target_type: TargetType,
    #[serde(default)]
    pub description: Option<String>,
}

impl Ability {
    pub fn is_area(&self) -> bool {
        self.target_type == TargetType::All
    }
}

/// Status effect, buff or debuff. The service has not settled on an effect
/// vocabulary, so only what the screen shows is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EffectPayload {
    pub name: String,
    pub duration_ticks: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CombatStats {
    pub physical_attack: i32,
    pub special_attack: i32,
    pub physical_defense: i32,
    pub special_defense: i32,
    pub speed: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub team: Team,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Raw health from the server; may be negative.
    pub current_health: i32,
    pub max_health: i32,
    pub stats: CombatStats,
    #[serde(default)]
    pub status_effects: Vec<EffectPayload>,
    #[serde(default)]
    pub buffs: Vec<EffectPayload>,
    #[serde(default)]
    pub debuffs: Vec<EffectPayload>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl Participant {
    /// Health fraction for display, clamped to `0.0..=1.0`.
    pub fn health_ratio(&self) -> f32 {
        if self.max_health <= 0 {
            return 0.0;
        }
        (self.current_health as f32 / self.max_health as f32).clamp(0.0, 1.0)
    }

    pub fn is_defeated(&self) -> bool {
        self.current_health <= 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_defeated()
    }

    pub fn ability(&self, ability_id: &str) -> Option<&Ability> {
        self.abilities.iter().find(|ability| ability.id == ability_id)
    }
}

/// Outcome of a snapshot as far as the client can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BattleStatus {
    InProgress,
    Won,
    Lost,
    Indeterminate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Battle {
    pub id: String,
    pub turn: u32,
    pub finished: bool,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub participants: Vec<Participant>,
}

impl Battle {
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn team(&self, team: Team) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(move |p| p.team == team)
    }

    pub fn living(&self, team: Team) -> impl Iterator<Item = &Participant> {
        self.team(team).filter(|p| p.is_alive())
    }

    /// Resolve the battle status. `winner_id` is authoritative; the health
    /// heuristic only applies when it is missing (older battles never set it).
    pub fn status(&self, current_user_id: Option<&str>) -> BattleStatus {
        if let Some(winner) = self.winner_id.as_deref() {
            let player_won = self.team(Team::Player).any(|p| p.id == winner)
                || current_user_id.is_some_and(|user| user == winner);
            return if player_won {
                BattleStatus::Won
            } else {
                BattleStatus::Lost
            };
        }

        let players_down = all_defeated(self.team(Team::Player));
        let enemies_down = all_defeated(self.team(Team::Enemy));
        match (players_down, enemies_down) {
            (true, false) => BattleStatus::Lost,
            (false, true) => BattleStatus::Won,
            _ if self.finished => BattleStatus::Indeterminate,
            _ => BattleStatus::InProgress,
        }
    }
}

/// True when the team has members and every one of them is at or below zero.
fn all_defeated<'a>(mut members: impl Iterator<Item = &'a Participant>) -> bool {
    let Some(first) = members.next() else {
        return false;
    };
    first.is_defeated() && members.all(Participant::is_defeated)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParticipantOutcome {
    pub damage: i32,
    pub critical: bool,
    pub hit: bool,
    #[serde(default)]
    pub status_effects: Vec<EffectPayload>,
    #[serde(default)]
    pub buffs: Vec<EffectPayload>,
    #[serde(default)]
    pub debuffs: Vec<EffectPayload>,
    #[serde(default)]
    pub messages: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BattleRewards {
    pub experience: u32,
    pub level_up: bool,
    #[serde(default)]
    pub currency: u32,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub unlocked_abilities: Vec<String>,
}

/// The service's resolution of one submitted turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TurnResult {
    pub turn: u32,
    pub finished: bool,
    pub winner_team: Option<Team>,
    pub player_results: BTreeMap<String, ParticipantOutcome>,
    pub enemy_results: BTreeMap<String, ParticipantOutcome>,
    pub battle: Battle,
    #[serde(default)]
    pub rewards: Option<BattleRewards>,
}

impl TurnResult {
    /// Outcome messages, player team first.
    pub fn messages(&self) -> impl Iterator<Item = &String> {
        self.player_results
            .values()
            .chain(self.enemy_results.values())
            .flat_map(|outcome| outcome.messages.iter())
    }

    pub fn is_victory(&self) -> bool {
        self.winner_team == Some(Team::Player)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn participant(id: &str, team: Team, hp: i32) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_string(),
            team,
            user_id: None,
            current_health: hp,
            max_health: 100,
            stats: CombatStats::default(),
            status_effects: Vec::new(),
            buffs: Vec::new(),
            debuffs: Vec::new(),
            abilities: Vec::new(),
        }
    }

    pub fn ability(id: &str, target_type: TargetType) -> Ability {
        Ability {
            id: id.to_string(),
            name: id.to_string(),
            target_type,
            description: None,
        }
    }

    pub fn battle(participants: Vec<Participant>) -> Battle {
        Battle {
            id: "b1".to_string(),
            turn: 1,
            finished: false,
            winner_id: None,
            started_at: None,
            ended_at: None,
            participants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{battle, participant};
    use super::*;

    #[test]
    fn health_ratio_clamps_for_display_only() {
        let mut hero = participant("hero", Team::Player, -20);
        assert_eq!(hero.health_ratio(), 0.0);
        assert_eq!(hero.current_health, -20);

        hero.current_health = 250;
        assert_eq!(hero.health_ratio(), 1.0);

        hero.current_health = 50;
        assert_eq!(hero.health_ratio(), 0.5);

        hero.max_health = 0;
        assert_eq!(hero.health_ratio(), 0.0);
    }

    #[test]
    fn status_without_winner_uses_health() {
        let won = battle(vec![
            participant("hero", Team::Player, 40),
            participant("slime", Team::Enemy, 0),
        ]);
        assert_eq!(won.status(None), BattleStatus::Won);

        let lost = battle(vec![
            participant("hero", Team::Player, -5),
            participant("slime", Team::Enemy, 12),
        ]);
        assert_eq!(lost.status(None), BattleStatus::Lost);
    }

    #[test]
    fn winner_id_overrides_health() {
        let mut snapshot = battle(vec![
            participant("hero", Team::Player, 0),
            participant("slime", Team::Enemy, 30),
        ]);
        snapshot.finished = true;
        snapshot.winner_id = Some("hero".to_string());
        assert_eq!(snapshot.status(None), BattleStatus::Won);

        snapshot.winner_id = Some("slime".to_string());
        assert_eq!(snapshot.status(None), BattleStatus::Lost);

        snapshot.winner_id = Some("user-7".to_string());
        assert_eq!(snapshot.status(Some("user-7")), BattleStatus::Won);
    }

    #[test]
    fn finished_without_signal_is_indeterminate() {
        let mut snapshot = battle(vec![
            participant("hero", Team::Player, 10),
            participant("slime", Team::Enemy, 10),
        ]);
        assert_eq!(snapshot.status(None), BattleStatus::InProgress);

        snapshot.finished = true;
        assert_eq!(snapshot.status(None), BattleStatus::Indeterminate);
    }

    #[test]
    fn empty_team_is_not_defeated() {
        let snapshot = battle(vec![participant("hero", Team::Player, 10)]);
        assert_eq!(snapshot.status(None), BattleStatus::InProgress);
    }
}
