use evlog::meta;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{Raffle, RaffleDetail, RaffleStatus};
use crate::runtime::get_logger;
use crate::workflow::{WorkflowError, WorkflowResult, NOT_FINALIZED, RAFFLE_NOT_FOUND};

pub fn check_reopenable(raffle: &Raffle) -> WorkflowResult<()> {
    if raffle.status != RaffleStatus::Drawn {
        return Err(WorkflowError::Conflict(NOT_FINALIZED));
    }
    Ok(())
}

/// Reverts a finalized raffle to active, dropping its whole draw history.
pub async fn reopen_raffle(conn: &PgPool, id_raffle: i32) -> WorkflowResult<RaffleDetail> {
    let mut tx = conn.begin().await?;

    let raffle = match model::lock_raffle(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    check_reopenable(&raffle)?;

    let cleared = model::clear_draw_history(&mut *tx, id_raffle).await?;
    model::reset_raffle(&mut *tx, id_raffle).await?;

    let raffle = match model::get_raffle_detail(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    tx.commit().await?;

    get_logger().info("Raffle reopened.", meta! {
        "RaffleID" => id_raffle,
        "DrawsCleared" => cleared,
    });

    Ok(raffle)
}
