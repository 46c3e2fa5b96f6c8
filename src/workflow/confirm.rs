use evlog::meta;
use serde::Serialize;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{DrawHistory, Participant, Raffle, RaffleDetail, RaffleStatus};
use crate::runtime::get_logger;
use crate::workflow::{WorkflowError, WorkflowResult, ALREADY_FINALIZED, NO_DRAW_YET, RAFFLE_NOT_FOUND};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub raffle: RaffleDetail,
    pub confirmed_winner: Participant,
}

/// A raffle can be confirmed while it is not yet drawn and has a winner backed
/// by at least one draw. Returns the draw to confirm.
pub fn check_confirmable(raffle: &Raffle, latest: Option<DrawHistory>) -> WorkflowResult<DrawHistory> {
    if raffle.status == RaffleStatus::Drawn {
        return Err(WorkflowError::Conflict(ALREADY_FINALIZED));
    }

    match (raffle.id_winner, latest) {
        (Some(_), Some(draw)) => Ok(draw),
        _ => Err(WorkflowError::Conflict(NO_DRAW_YET)),
    }
}

/// Marks the most recent draw as present and finalizes the raffle.
pub async fn confirm_winner(conn: &PgPool, id_raffle: i32) -> WorkflowResult<Confirmation> {
    let mut tx = conn.begin().await?;

    let raffle = match model::lock_raffle(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    let latest = model::latest_draw(&mut *tx, id_raffle).await?;
    let latest = check_confirmable(&raffle, latest)?;

    let confirmed_winner = match model::get_participant(&mut *tx, latest.id_participant).await? {
        None => return Err(anyhow::anyhow!("participant {} of draw {} is missing", latest.id_participant, latest.id).into()),
        Some(v) => v,
    };

    model::mark_draw_present(&mut *tx, latest.id).await?;
    model::set_raffle_status(&mut *tx, id_raffle, RaffleStatus::Drawn).await?;

    let raffle = match model::get_raffle_detail(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    tx.commit().await?;

    get_logger().info("Winner confirmed.", meta! {
        "RaffleID" => id_raffle,
        "DrawNumber" => latest.draw_number,
        "ParticipantID" => confirmed_winner.id,
    });

    Ok(Confirmation {
        raffle,
        confirmed_winner,
    })
}
