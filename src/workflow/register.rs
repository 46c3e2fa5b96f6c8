use chrono::Utc;
use evlog::meta;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{Participant, Raffle, RaffleStatus};
use crate::runtime::get_logger;
use crate::support::identity::{domain_allowed, is_valid_email, normalize_email};
use crate::support::pin::{hash_pin, is_valid_pin};
use crate::workflow::{
    required, WorkflowError, WorkflowResult, DUPLICATE_PARTICIPANT, NOT_ACCEPTING, RAFFLE_NOT_FOUND,
    REGISTRATION_ENDED,
};

pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub pin: Option<&'a str>,
}

/// Input that passed every check that does not need the database.
#[derive(Debug, PartialEq)]
pub struct CheckedRegistration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub email_normalized: String,
    pub pin_hash: Option<String>,
}

pub fn check_registration<'a>(
    raffle: &Raffle,
    req: &Registration<'a>,
    now: chrono::DateTime<Utc>,
) -> WorkflowResult<CheckedRegistration<'a>> {
    if raffle.status != RaffleStatus::Active {
        return Err(WorkflowError::Conflict(NOT_ACCEPTING));
    }
    if raffle.has_ended(now) {
        return Err(WorkflowError::Conflict(REGISTRATION_ENDED));
    }

    let name = required(req.name, "name")?;
    let email = required(req.email, "email")?;

    if !is_valid_email(email) {
        return Err(WorkflowError::Invalid(format!("'{}' is not a valid email address", email)));
    }
    if !domain_allowed(email, raffle.allowed_domain.as_deref()) {
        return Err(WorkflowError::Invalid("Email domain is not allowed for this raffle".to_owned()));
    }

    let pin = req.pin.map(str::trim).filter(|v| !v.is_empty());
    let pin_hash = match pin {
        None if raffle.require_pin => {
            return Err(WorkflowError::Invalid("PIN must be exactly 5 digits".to_owned()));
        }
        None => None,
        Some(pin) => {
            if !is_valid_pin(pin) {
                return Err(WorkflowError::Invalid("PIN must be exactly 5 digits".to_owned()));
            }
            Some(hash_pin(pin))
        }
    };

    Ok(CheckedRegistration {
        name,
        email,
        email_normalized: normalize_email(email),
        pin_hash,
    })
}

/// Registers a participant. Two emails that normalize to the same key are the
/// same person, so the second registration is rejected.
pub async fn register_participant(conn: &PgPool, id_raffle: i32, req: &Registration<'_>) -> WorkflowResult<Participant> {
    let mut tx = conn.begin().await?;

    let raffle = match model::lock_raffle(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    let checked = check_registration(&raffle, req, Utc::now())?;

    if model::check_raffle_has_email(&mut *tx, id_raffle, &checked.email_normalized).await? {
        get_logger().info("Duplicate registration rejected.", meta! {
            "RaffleID" => id_raffle,
        });
        return Err(WorkflowError::Conflict(DUPLICATE_PARTICIPANT));
    }

    let participant = model::add_participant(
        &mut *tx,
        id_raffle,
        checked.name,
        checked.email,
        &checked.email_normalized,
        checked.pin_hash.as_deref(),
    ).await?;

    tx.commit().await?;

    get_logger().info("Participant registered.", meta! {
        "RaffleID" => id_raffle,
        "ParticipantID" => participant.id,
    });

    Ok(participant)
}

pub async fn list_participants(conn: &PgPool, id_raffle: i32) -> WorkflowResult<Vec<Participant>> {
    if model::get_raffle(conn, id_raffle).await?.is_none() {
        return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND));
    }

    Ok(model::list_participants(conn, id_raffle).await?)
}
