use crate::config::{
    REQUEST_TIMEOUT,
    SessionTarget,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// The room server, as seen by one player.
pub trait GameApi: Clone + Send + Sync + 'static {
    fn fetch_updates(
        &self,
        target: &SessionTarget,
    ) -> impl Future<Output = Result<GameSnapshot>> + Send;

    fn fetch_reward(&self, room_id: &str) -> impl Future<Output = Result<f64>> + Send;

    fn roll(
        &self,
        target: &SessionTarget,
    ) -> impl Future<Output = Result<RollResponse>> + Send;
}

/// Raw per-player numbers from one update; validated later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActorState {
    pub roll_count: i64,
    pub face_value: i64,
    pub cumulative_result: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameSnapshot {
    pub active_turn: bool,
    pub own: ActorState,
    pub opponent: ActorState,
    pub message: String,
    pub status: Option<u16>,
    pub ok: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RollResponse {
    pub ok: bool,
    pub message: String,
    pub face_value: Option<i64>,
}

#[derive(Clone)]
pub struct HttpGameApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpGameApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("failed to build HTTP client for game API")?;
        Ok(Self { base_url, http })
    }
}

impl GameApi for HttpGameApi {
    async fn fetch_updates(&self, target: &SessionTarget) -> Result<GameSnapshot> {
        let url = format!("{}/dice/updates", self.base_url);
        let res = self
            .http
            .get(url)
            .query(&[
                ("player_id", target.player_id.to_string()),
                ("room_id", target.room_id.clone()),
            ])
            .send()
            .await
            .wrap_err("updates request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read updates response body")?;
        decode_updates(status, &bytes)
    }

    async fn fetch_reward(&self, room_id: &str) -> Result<f64> {
        let url = format!("{}/dice/reward", self.base_url);
        let res = self
            .http
            .get(url)
            .query(&[("room_id", room_id)])
            .send()
            .await
            .wrap_err("reward request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(eyre!(
                "game API responded with {status} when fetching reward: {body}"
            ));
        }
        let dto: RewardDto = res.json().await.wrap_err("invalid reward payload")?;
        Ok(dto.reward)
    }

    async fn roll(&self, target: &SessionTarget) -> Result<RollResponse> {
        let url = format!("{}/dice/roll", self.base_url);
        let body = RollRequestDto {
            init_data: &target.init_data,
            player_id: target.player_id,
            room_id: &target.room_id,
        };
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .wrap_err("roll request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read roll response body")?;
        decode_roll(status, &bytes)
    }
}

impl fmt::Display for HttpGameApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

/// Error statuses still count when the body is a well-formed update,
/// since that is how the server reports a closed room.
fn decode_updates(status: StatusCode, bytes: &[u8]) -> Result<GameSnapshot> {
    match serde_json::from_slice::<UpdatesDto>(bytes) {
        Ok(dto) => Ok(dto.into()),
        Err(err) if status.is_success() => {
            Err(err).wrap_err("invalid updates payload")
        }
        Err(_) => {
            let body = String::from_utf8_lossy(bytes);
            Err(eyre!(
                "game API responded with {status} when fetching updates: {body}"
            ))
        }
    }
}

fn decode_roll(status: StatusCode, bytes: &[u8]) -> Result<RollResponse> {
    match serde_json::from_slice::<RollResponseDto>(bytes) {
        Ok(dto) => Ok(dto.into()),
        Err(err) if status.is_success() => Err(err).wrap_err("invalid roll payload"),
        Err(_) => {
            let body = String::from_utf8_lossy(bytes);
            Err(eyre!("game API responded with {status} when rolling: {body}"))
        }
    }
}

#[derive(Deserialize)]
struct UpdatesDto {
    #[serde(default)]
    active_player: bool,
    #[serde(default)]
    opponent: ActorDto,
    #[serde(rename = "self", default)]
    own: ActorDto,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    status: Option<u16>,
    ok: bool,
}

#[derive(Deserialize, Default)]
struct ActorDto {
    #[serde(default)]
    count: i64,
    #[serde(default)]
    hands: i64,
    #[serde(default)]
    results: i64,
}

#[derive(Serialize)]
struct RollRequestDto<'a> {
    #[serde(rename = "initData")]
    init_data: &'a str,
    player_id: i64,
    room_id: &'a str,
}

#[derive(Deserialize)]
struct RollResponseDto {
    ok: bool,
    #[serde(default)]
    msg: String,
    #[serde(rename = "self", default)]
    own: Option<RolledDto>,
}

#[derive(Deserialize)]
struct RolledDto {
    hands: i64,
}

#[derive(Deserialize)]
struct RewardDto {
    reward: f64,
}

impl From<ActorDto> for ActorState {
    fn from(dto: ActorDto) -> Self {
        ActorState {
            roll_count: dto.count,
            face_value: dto.hands,
            cumulative_result: dto.results,
        }
    }
}

impl From<UpdatesDto> for GameSnapshot {
    fn from(dto: UpdatesDto) -> Self {
        GameSnapshot {
            active_turn: dto.active_player,
            own: dto.own.into(),
            opponent: dto.opponent.into(),
            message: dto.msg,
            status: dto.status,
            ok: dto.ok,
        }
    }
}

impl From<RollResponseDto> for RollResponse {
    fn from(dto: RollResponseDto) -> Self {
        RollResponse {
            ok: dto.ok,
            message: dto.msg,
            face_value: dto.own.map(|rolled| rolled.hands),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn decode_updates__full_payload__maps_self_and_opponent() {
        // given
        let body = r#"{
            "active_player": false,
            "opponent": {"count": 5, "hands": 2, "results": 7},
            "self": {"count": 4, "hands": 6, "results": 10},
            "msg": "Обновления успешно получены.",
            "status": 200,
            "ok": true
        }"#;

        // when
        let snapshot = decode_updates(StatusCode::OK, body.as_bytes()).unwrap();

        // then
        assert_eq!(
            snapshot,
            GameSnapshot {
                active_turn: false,
                own: ActorState {
                    roll_count: 4,
                    face_value: 6,
                    cumulative_result: 10,
                },
                opponent: ActorState {
                    roll_count: 5,
                    face_value: 2,
                    cumulative_result: 7,
                },
                message: "Обновления успешно получены.".to_string(),
                status: Some(200),
                ok: true,
            }
        );
    }

    #[test]
    fn decode_updates__not_found_with_failure_body__is_a_snapshot() {
        // given
        let body = r#"{"ok": false, "msg": "Комната не найдена", "status": 404}"#;

        // when
        let snapshot = decode_updates(StatusCode::NOT_FOUND, body.as_bytes()).unwrap();

        // then
        assert!(!snapshot.ok);
        assert_eq!(snapshot.message, "Комната не найдена");
        assert_eq!(snapshot.own, ActorState::default());
    }

    #[test]
    fn decode_updates__gateway_error_page__is_an_error() {
        // when
        let result = decode_updates(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");

        // then
        let err = result.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn decode_roll__success__carries_face() {
        // given
        let body = r#"{"ok": true, "msg": "Вы бросили кубики.", "self": {"hands": 3}}"#;

        // when
        let response = decode_roll(StatusCode::OK, body.as_bytes()).unwrap();

        // then
        assert_eq!(
            response,
            RollResponse {
                ok: true,
                message: "Вы бросили кубики.".to_string(),
                face_value: Some(3),
            }
        );
    }

    #[test]
    fn roll_request__serializes_launcher_field_names() {
        // given
        let body = RollRequestDto {
            init_data: "query_id=abc",
            player_id: 99,
            room_id: "r-1",
        };

        // when
        let json = serde_json::to_value(&body).unwrap();

        // then
        assert_eq!(
            json,
            serde_json::json!({"initData": "query_id=abc", "player_id": 99, "room_id": "r-1"})
        );
    }
}
