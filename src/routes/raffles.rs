use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::schema::{Participant, Raffle, RaffleDetail, RaffleSummary};
use crate::error::{fail, AppError};
use crate::routes::extract::{AppJson, RaffleId};
use crate::routes::AppData;
use crate::workflow::confirm::{self, Confirmation};
use crate::workflow::draw::{self, DrawOutcome};
use crate::workflow::raffles::{self as admin, CreateRaffle};
use crate::workflow::register::{self, Registration};
use crate::workflow::reopen;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRaffleBody {
    name: String,
    description: Option<String>,
    prize: String,
    timebox_minutes: Option<i32>,
    #[serde(default)]
    require_pin: bool,
    allowed_domain: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterBody {
    name: String,
    email: String,
    pin: Option<String>,
}

#[derive(Deserialize)]
pub struct PinBody {
    pin: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> Success<T> {
    fn new(body: T) -> Json<Self> {
        Json(Self { success: true, body })
    }
}

#[derive(Serialize)]
pub struct RaffleBody<T: Serialize> {
    raffle: T,
}

#[derive(Serialize)]
pub struct PinResult {
    valid: bool,
}

pub async fn list(State(data): State<AppData>) -> Result<Json<Vec<RaffleSummary>>, AppError> {
    let raffles = admin::list_raffles(data.db_client.conn()).await
        .map_err(fail("Failed to fetch raffles"))?;

    Ok(Json(raffles))
}

pub async fn create(
    State(data): State<AppData>,
    AppJson(body): AppJson<CreateRaffleBody>,
) -> Result<(StatusCode, Json<Raffle>), AppError> {
    let req = CreateRaffle {
        name: &body.name,
        description: body.description.as_deref(),
        prize: &body.prize,
        timebox_minutes: body.timebox_minutes,
        require_pin: body.require_pin,
        allowed_domain: body.allowed_domain.as_deref(),
    };

    let raffle = admin::create_raffle(data.db_client.conn(), &req).await
        .map_err(fail("Failed to create raffle"))?;

    Ok((StatusCode::CREATED, Json(raffle)))
}

pub async fn detail(State(data): State<AppData>, RaffleId(id): RaffleId) -> Result<Json<RaffleDetail>, AppError> {
    let raffle = admin::get_raffle(data.db_client.conn(), id).await
        .map_err(fail("Failed to fetch raffle"))?;

    Ok(Json(raffle))
}

pub async fn participants(State(data): State<AppData>, RaffleId(id): RaffleId) -> Result<Json<Vec<Participant>>, AppError> {
    let participants = register::list_participants(data.db_client.conn(), id).await
        .map_err(fail("Failed to fetch participants"))?;

    Ok(Json(participants))
}

pub async fn register(
    State(data): State<AppData>,
    RaffleId(id): RaffleId,
    AppJson(body): AppJson<RegisterBody>,
) -> Result<(StatusCode, Json<Participant>), AppError> {
    let req = Registration {
        name: &body.name,
        email: &body.email,
        pin: body.pin.as_deref(),
    };

    let participant = register::register_participant(data.db_client.conn(), id, &req).await
        .map_err(fail("Failed to register participant"))?;

    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn close(State(data): State<AppData>, RaffleId(id): RaffleId) -> Result<Json<Success<RaffleBody<Raffle>>>, AppError> {
    let raffle = admin::close_raffle(data.db_client.conn(), id).await
        .map_err(fail("Failed to close raffle"))?;

    Ok(Success::new(RaffleBody { raffle }))
}

pub async fn draw(State(data): State<AppData>, RaffleId(id): RaffleId) -> Result<Json<Success<DrawOutcome>>, AppError> {
    let outcome = draw::draw_winner(data.db_client.conn(), id).await
        .map_err(fail("Failed to draw winner"))?;

    Ok(Success::new(outcome))
}

pub async fn confirm_winner(State(data): State<AppData>, RaffleId(id): RaffleId) -> Result<Json<Success<Confirmation>>, AppError> {
    let confirmation = confirm::confirm_winner(data.db_client.conn(), id).await
        .map_err(fail("Failed to confirm winner"))?;

    Ok(Success::new(confirmation))
}

pub async fn reopen(State(data): State<AppData>, RaffleId(id): RaffleId) -> Result<Json<Success<RaffleBody<RaffleDetail>>>, AppError> {
    let raffle = reopen::reopen_raffle(data.db_client.conn(), id).await
        .map_err(fail("Failed to reopen raffle"))?;

    Ok(Success::new(RaffleBody { raffle }))
}

pub async fn verify_pin(
    State(data): State<AppData>,
    RaffleId(id): RaffleId,
    AppJson(body): AppJson<PinBody>,
) -> Result<Json<PinResult>, AppError> {
    let valid = admin::verify_winner_pin(data.db_client.conn(), id, body.pin.trim()).await
        .map_err(fail("Failed to verify PIN"))?;

    Ok(Json(PinResult { valid }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_envelope() {
        let Json(body) = Success::new(RaffleBody { raffle: json!({ "id": 1, "status": "active" }) });
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v, json!({ "success": true, "raffle": { "id": 1, "status": "active" } }));
    }

    #[test]
    fn test_create_body_defaults() {
        let body: CreateRaffleBody = serde_json::from_value(json!({
            "name": "Meetup",
            "prize": "Sticker pack",
            "timeboxMinutes": 15,
        })).unwrap();
        assert!(!body.require_pin);
        assert_eq!(body.timebox_minutes, Some(15));
        assert_eq!(body.allowed_domain, None);
    }
}
