use evlog::meta;
use sqlx::PgPool;

use crate::db::model::{self, NewRaffle};
use crate::db::schema::{Raffle, RaffleDetail, RaffleStatus, RaffleSummary};
use crate::runtime::get_logger;
use crate::support::pin::verify_pin;
use crate::workflow::{optional, required, WorkflowError, WorkflowResult, NOT_ACTIVE, NO_DRAW_YET, RAFFLE_NOT_FOUND};

pub struct CreateRaffle<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub prize: &'a str,
    pub timebox_minutes: Option<i32>,
    pub require_pin: bool,
    pub allowed_domain: Option<&'a str>,
}

/// Trims and validates user input into a row ready for insertion.
pub fn validate_new_raffle<'a>(req: &CreateRaffle<'a>) -> WorkflowResult<NewRaffle<'a>> {
    let name = required(req.name, "name")?;
    let prize = required(req.prize, "prize")?;

    if let Some(minutes) = req.timebox_minutes {
        if minutes <= 0 {
            return Err(WorkflowError::Invalid(format!(
                "`timeboxMinutes` must be greater than 0; got {}", minutes
            )));
        }
    }

    let allowed_domain = optional(req.allowed_domain).map(|v| v.trim_start_matches('@'));

    Ok(NewRaffle {
        name,
        description: optional(req.description),
        prize,
        timebox_minutes: req.timebox_minutes,
        require_pin: req.require_pin,
        allowed_domain,
    })
}

pub async fn create_raffle(conn: &PgPool, req: &CreateRaffle<'_>) -> WorkflowResult<Raffle> {
    let new = validate_new_raffle(req)?;
    let raffle = model::add_raffle(conn, &new).await?;

    get_logger().info("Raffle created.", meta! {
        "RaffleID" => raffle.id,
        "Name" => raffle.name,
        "RequirePIN" => raffle.require_pin,
    });

    Ok(raffle)
}

pub async fn list_raffles(conn: &PgPool) -> WorkflowResult<Vec<RaffleSummary>> {
    Ok(model::list_raffles(conn).await?)
}

pub async fn get_raffle(conn: &PgPool, id_raffle: i32) -> WorkflowResult<RaffleDetail> {
    let mut conn = conn.acquire().await?;

    match model::get_raffle_detail(&mut conn, id_raffle).await? {
        None => Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => Ok(v),
    }
}

/// Stops registration. Draws are still possible on a closed raffle.
pub async fn close_raffle(conn: &PgPool, id_raffle: i32) -> WorkflowResult<Raffle> {
    let mut tx = conn.begin().await?;

    let raffle = match model::lock_raffle(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    if raffle.status != RaffleStatus::Active {
        return Err(WorkflowError::Conflict(NOT_ACTIVE));
    }

    let raffle = model::close_raffle(&mut *tx, id_raffle).await?;

    tx.commit().await?;

    get_logger().info("Raffle closed.", meta! {
        "RaffleID" => id_raffle,
    });

    Ok(raffle)
}

/// Checks a PIN presented by the current winner against the one stored at
/// registration. A winner who registered without a PIN never verifies.
pub async fn verify_winner_pin(conn: &PgPool, id_raffle: i32, pin: &str) -> WorkflowResult<bool> {
    let raffle = match model::get_raffle(conn, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    let id_winner = match raffle.id_winner {
        None => return Err(WorkflowError::Conflict(NO_DRAW_YET)),
        Some(v) => v,
    };

    let winner = match model::get_participant(conn, id_winner).await? {
        None => return Err(WorkflowError::Conflict(NO_DRAW_YET)),
        Some(v) => v,
    };

    let valid = match &winner.pin_hash {
        None => false,
        Some(hash) => verify_pin(pin, hash),
    };

    get_logger().info("Winner PIN checked.", meta! {
        "RaffleID" => id_raffle,
        "ParticipantID" => winner.id,
        "Valid" => valid,
    });

    Ok(valid)
}
