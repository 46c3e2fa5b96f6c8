use std::collections::HashSet;

use evlog::meta;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{DrawHistory, Participant, RaffleDetail, RaffleStatus};
use crate::runtime::get_logger;
use crate::workflow::{WorkflowError, WorkflowResult, ALREADY_FINALIZED, NO_ELIGIBLE, RAFFLE_NOT_FOUND};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawOutcome {
    pub raffle: RaffleDetail,
    pub winner: Participant,
    pub draw_number: i32,
}

/// Picks uniformly among participants that have not been drawn yet in this
/// raffle. An absent winner is never drawn twice.
pub fn pick_candidate<'a, R: Rng + ?Sized>(
    participants: &'a [Participant],
    history: &[DrawHistory],
    rng: &mut R,
) -> Option<&'a Participant> {
    let drawn = history.iter()
        .map(|d| d.id_participant)
        .collect::<HashSet<i32>>();

    let eligible = participants.iter()
        .filter(|p| !drawn.contains(&p.id))
        .collect::<Vec<&Participant>>();

    eligible.choose(rng).copied()
}

/// Draws a new candidate winner and appends it to the draw history.
pub async fn draw_winner(conn: &PgPool, id_raffle: i32) -> WorkflowResult<DrawOutcome> {
    let mut tx = conn.begin().await?;

    let raffle = match model::lock_raffle(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    if raffle.status == RaffleStatus::Drawn {
        return Err(WorkflowError::Conflict(ALREADY_FINALIZED));
    }

    let participants = model::list_participants(&mut *tx, id_raffle).await?;
    let history = model::list_draw_history(&mut *tx, id_raffle).await?;

    let winner = {
        let mut rng = rand::thread_rng();
        pick_candidate(&participants, &history, &mut rng).cloned()
    };
    let winner = match winner {
        None => return Err(WorkflowError::Conflict(NO_ELIGIBLE)),
        Some(v) => v,
    };

    let draw = model::add_draw(&mut *tx, id_raffle, winner.id).await?;
    model::set_raffle_winner(&mut *tx, id_raffle, winner.id).await?;

    let raffle = match model::get_raffle_detail(&mut *tx, id_raffle).await? {
        None => return Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND)),
        Some(v) => v,
    };

    tx.commit().await?;

    get_logger().info("Winner drawn.", meta! {
        "RaffleID" => id_raffle,
        "DrawNumber" => draw.draw_number,
        "ParticipantID" => winner.id,
    });

    Ok(DrawOutcome {
        raffle,
        winner,
        draw_number: draw.draw_number,
    })
}
