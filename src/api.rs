//! Battle service client

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::model::{Battle, BattleRewards, TurnResult};
use crate::selection::TurnRequest;
use crate::wire::{
    decode_envelope, rewards_from_dto, BattleDto, Ingest, RewardsDto, TurnActionDto,
    TurnResultDto, TurnSubmissionDto,
};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not signed in: missing auth token")]
    MissingAuthToken,
    #[error("request failed: {0}")]
    Request(String),
    #[error("{0}")]
    Rejected(String),
    #[error("battle service returned HTTP {status}")]
    Status { status: u16, message: Option<String> },
    #[error("response parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Text to show the player; the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected(message)
            | ApiError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait BattleService: Send + Sync {
    async fn fetch_battle(&self, battle_id: &str) -> Result<Battle, ApiError>;

    async fn submit_turn(
        &self,
        battle_id: &str,
        request: &TurnRequest,
    ) -> Result<TurnResult, ApiError>;

    async fn fetch_rewards(&self, battle_id: &str) -> Result<BattleRewards, ApiError>;
}

/// Fetch post-battle rewards. Failures are logged and collapse to `None`, the
/// results screen renders without them.
pub async fn fetch_rewards_or_none(
    service: &dyn BattleService,
    battle_id: &str,
) -> Option<BattleRewards> {
    match service.fetch_rewards(battle_id).await {
        Ok(rewards) => Some(rewards),
        Err(err) => {
            warn!(battle_id, error = %err, "reward fetch failed");
            None
        }
    }
}

pub struct HttpBattleService {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    user_id: Option<String>,
}

impl HttpBattleService {
    pub fn new(
        base_url: String,
        auth_token: Option<String>,
        user_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            auth_token,
            user_id,
        })
    }

    fn battle_url(&self, battle_id: &str, suffix: &str) -> String {
        format!(
            "{}/battles/{}{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(battle_id),
            suffix
        )
    }

    fn token(&self) -> Result<&str, ApiError> {
        self.auth_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingAuthToken)
    }

    fn ingest(&self) -> Ingest<'_> {
        Ingest::new(self.user_id.as_deref())
    }

    async fn read_body(response: reqwest::Response) -> Result<(u16, String), ApiError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok((status, body))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        let token = self.token()?;
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let (status, body) = Self::read_body(response).await?;
        decode_envelope(status, &body)
    }
}

#[async_trait]
impl BattleService for HttpBattleService {
    async fn fetch_battle(&self, battle_id: &str) -> Result<Battle, ApiError> {
        let dto: BattleDto = self.get(self.battle_url(battle_id, "")).await?;
        Ok(self.ingest().battle(dto))
    }

    async fn submit_turn(
        &self,
        battle_id: &str,
        request: &TurnRequest,
    ) -> Result<TurnResult, ApiError> {
        let token = self.token()?;
        let url = self.battle_url(battle_id, "/turn");
        let body = TurnSubmissionDto {
            actions: vec![TurnActionDto {
                actor_id: &request.actor_id,
                target_id: &request.target_id,
                skill_id: &request.ability_id,
            }],
        };
        debug!(
            %url,
            actor = %request.actor_id,
            target = %request.target_id,
            ability = %request.ability_id,
            "POST turn"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let (status, body) = Self::read_body(response).await?;
        let dto: TurnResultDto = decode_envelope(status, &body)?;
        Ok(self.ingest().turn_result(dto))
    }

    async fn fetch_rewards(&self, battle_id: &str) -> Result<BattleRewards, ApiError> {
        let dto: RewardsDto = self.get(self.battle_url(battle_id, "/rewards")).await?;
        Ok(rewards_from_dto(dto))
    }
}
