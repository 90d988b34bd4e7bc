//! Wire format of the battle service and snapshot ingestion
//!
//! Older service versions disagree on how a participant's side is encoded, so
//! every snapshot passes through [`Ingest`] exactly once, which settles each
//! participant on a single [`Team`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::api::ApiError;
use crate::model::{
    Ability, Battle, BattleRewards, CombatStats, EffectPayload, Participant, ParticipantOutcome,
    TargetType, Team, TurnResult,
};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Decode a `{ success, data, message }` response body.
pub fn decode_envelope<T: serde::de::DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<T, ApiError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .unwrap_or_default()
            .message
            .filter(|m| !m.trim().is_empty());
        return Err(match message {
            Some(message) => ApiError::Rejected(message),
            None => ApiError::Status {
                status,
                message: None,
            },
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "request was rejected".to_string()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Parse("missing data".to_string()))
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnActionDto<'a> {
    pub actor_id: &'a str,
    pub target_id: &'a str,
    pub skill_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TurnSubmissionDto<'a> {
    pub actions: Vec<TurnActionDto<'a>>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participant_type: Option<String>,
    #[serde(default)]
    pub team_id: Option<Value>,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub current_health: i32,
    #[serde(default)]
    pub max_health: i32,
    #[serde(default)]
    pub physical_attack: i32,
    #[serde(default)]
    pub special_attack: i32,
    #[serde(default)]
    pub physical_defense: i32,
    #[serde(default)]
    pub special_defense: i32,
    #[serde(default)]
    pub speed: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_effects: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buffs: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub debuffs: Vec<Value>,
    #[serde(default, alias = "abilities", deserialize_with = "null_as_default")]
    pub skills: Vec<AbilityDto>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleDto {
    pub id: String,
    #[serde(default, alias = "turn")]
    pub current_turn: u32,
    #[serde(default, alias = "finished")]
    pub is_finished: bool,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub participants: Vec<ParticipantDto>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDto {
    #[serde(default)]
    pub damage: i32,
    #[serde(default, alias = "critical")]
    pub is_critical: bool,
    #[serde(default = "default_hit", alias = "hit")]
    pub is_hit: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_effects: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buffs: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub debuffs: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<String>,
}

fn default_hit() -> bool {
    true
}

/// Lists and maps the service sends as `null` read as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsDto {
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub level_up: bool,
    #[serde(default, alias = "gold")]
    pub currency: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Value>,
    #[serde(default, alias = "unlockedAbilities", deserialize_with = "null_as_default")]
    pub unlocked_skills: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResultDto {
    #[serde(default)]
    pub turn: u32,
    #[serde(default, alias = "finished")]
    pub is_finished: bool,
    #[serde(default)]
    pub winner_team: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_results: BTreeMap<String, OutcomeDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enemy_results: BTreeMap<String, OutcomeDto>,
    pub battle: BattleDto,
    #[serde(default)]
    pub rewards: Option<RewardsDto>,
}

// ============================================================================
// Ingestion
// ============================================================================

/// Converts wire snapshots into the domain model for one signed-in user.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ingest<'a> {
    pub current_user_id: Option<&'a str>,
}

impl<'a> Ingest<'a> {
    pub fn new(current_user_id: Option<&'a str>) -> Self {
        Self { current_user_id }
    }

    pub fn battle(&self, dto: BattleDto) -> Battle {
        let teams = self.resolve_teams(&dto.participants);
        let participants = dto
            .participants
            .into_iter()
            .zip(teams)
            .map(|(p, team)| participant_from_dto(p, team))
            .collect();

        Battle {
            id: dto.id,
            turn: dto.current_turn,
            finished: dto.is_finished,
            winner_id: dto.winner_id.filter(|id| !id.is_empty()),
            started_at: dto.started_at,
            ended_at: dto.ended_at,
            participants,
        }
    }

    pub fn turn_result(&self, dto: TurnResultDto) -> TurnResult {
        TurnResult {
            turn: dto.turn,
            finished: dto.is_finished,
            winner_team: dto.winner_team.as_deref().and_then(parse_team),
            player_results: outcomes_from_dto(dto.player_results),
            enemy_results: outcomes_from_dto(dto.enemy_results),
            battle: self.battle(dto.battle),
            rewards: dto.rewards.map(rewards_from_dto),
        }
    }

    fn resolve_teams(&self, participants: &[ParticipantDto]) -> Vec<Option<Team>> {
        let mut teams: Vec<Option<Team>> = participants
            .iter()
            .map(|p| {
                p.participant_type
                    .as_deref()
                    .and_then(parse_team)
                    .or_else(|| self.user_team(p))
            })
            .collect();

        let player_team_ids: Vec<String> = participants
            .iter()
            .zip(&teams)
            .filter(|(_, team)| **team == Some(Team::Player))
            .filter_map(|(p, _)| p.team_id.as_ref().and_then(id_key))
            .collect();

        for (p, team) in participants.iter().zip(teams.iter_mut()) {
            if team.is_some() {
                continue;
            }
            *team = p.team_id.as_ref().and_then(id_key).map(|key| {
                if player_team_ids.contains(&key) {
                    Team::Player
                } else {
                    Team::Enemy
                }
            });
        }

        teams
    }

    fn user_team(&self, participant: &ParticipantDto) -> Option<Team> {
        let user = self.current_user_id?;
        let participant_user = participant.user_id.as_ref().and_then(id_key)?;
        (participant_user == user).then_some(Team::Player)
    }
}

fn participant_from_dto(dto: ParticipantDto, team: Option<Team>) -> Participant {
    Participant {
        name: dto.name.unwrap_or_else(|| dto.id.clone()),
        id: dto.id,
        team: team.unwrap_or(Team::Enemy),
        user_id: dto.user_id.as_ref().and_then(id_key),
        current_health: dto.current_health,
        max_health: dto.max_health,
        stats: CombatStats {
            physical_attack: dto.physical_attack,
            special_attack: dto.special_attack,
            physical_defense: dto.physical_defense,
            special_defense: dto.special_defense,
            speed: dto.speed,
        },
        status_effects: effects_from_values(&dto.status_effects),
        buffs: effects_from_values(&dto.buffs),
        debuffs: effects_from_values(&dto.debuffs),
        abilities: dto.skills.into_iter().map(ability_from_dto).collect(),
    }
}

fn ability_from_dto(dto: AbilityDto) -> Ability {
    let target_type = match dto.target_type.as_deref() {
        Some(kind) if kind.eq_ignore_ascii_case("all") => TargetType::All,
        _ => TargetType::Single,
    };
    Ability {
        name: dto.name.unwrap_or_else(|| dto.id.clone()),
        id: dto.id,
        target_type,
        description: dto.description,
    }
}

fn outcomes_from_dto(
    outcomes: BTreeMap<String, OutcomeDto>,
) -> BTreeMap<String, ParticipantOutcome> {
    outcomes
        .into_iter()
        .map(|(id, dto)| {
            let outcome = ParticipantOutcome {
                damage: dto.damage,
                critical: dto.is_critical,
                hit: dto.is_hit,
                status_effects: effects_from_values(&dto.status_effects),
                buffs: effects_from_values(&dto.buffs),
                debuffs: effects_from_values(&dto.debuffs),
                messages: dto.messages,
            };
            (id, outcome)
        })
        .collect()
}

pub fn rewards_from_dto(dto: RewardsDto) -> BattleRewards {
    BattleRewards {
        experience: dto.experience,
        level_up: dto.level_up,
        currency: dto.currency,
        items: dto.items.iter().filter_map(value_name).collect(),
        unlocked_abilities: dto.unlocked_skills.iter().filter_map(value_name).collect(),
    }
}

fn parse_team(value: &str) -> Option<Team> {
    match value.trim().to_ascii_lowercase().as_str() {
        "player" => Some(Team::Player),
        "enemy" => Some(Team::Enemy),
        _ => None,
    }
}

/// `teamId` and `userId` show up as either a number or a string.
fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn effects_from_values(values: &[Value]) -> Vec<EffectPayload> {
    values.iter().filter_map(effect_from_value).collect()
}

fn effect_from_value(value: &Value) -> Option<EffectPayload> {
    let name = value_name(value)?;
    let duration_ticks = ["durationTicks", "duration", "turns", "remainingTurns"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_u64))
        .unwrap_or(0);
    Some(EffectPayload {
        name,
        duration_ticks: u32::try_from(duration_ticks).unwrap_or(u32::MAX),
    })
}

fn value_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => ["name", "type", "id"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}
