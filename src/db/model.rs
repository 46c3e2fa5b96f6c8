use chrono::Utc;
use futures::TryStreamExt;
use sqlx::{query, query_as, FromRow, PgConnection, PgExecutor, Row};

use crate::db::schema::{
    compute_time_ends, Attendance, DrawHistory, DrawHistoryEntry, Participant, Raffle, RaffleDetail, RaffleStatus,
    RaffleSummary, Talk,
};

pub struct NewRaffle<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub prize: &'a str,
    pub timebox_minutes: Option<i32>,
    pub require_pin: bool,
    pub allowed_domain: Option<&'a str>,
}

pub async fn add_raffle(conn: impl PgExecutor<'_>, new: &NewRaffle<'_>) -> anyhow::Result<Raffle> {
    let time_created = Utc::now();
    let time_ends = compute_time_ends(time_created, new.timebox_minutes);

    let r = query_as::<_, Raffle>(
        "INSERT INTO raffle (name, description, prize, status, time_created, timebox_minutes, time_ends, require_pin, allowed_domain)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *;")
        .bind(new.name)
        .bind(new.description)
        .bind(new.prize)
        .bind(RaffleStatus::Active.as_str())
        .bind(time_created)
        .bind(new.timebox_minutes)
        .bind(time_ends)
        .bind(new.require_pin)
        .bind(new.allowed_domain)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn get_raffle(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Option<Raffle>> {
    let r = query_as::<_, Raffle>("SELECT * FROM raffle WHERE id=$1;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

/// Loads a raffle and holds its row lock until the surrounding transaction
/// ends. Every workflow that changes a raffle goes through this first.
pub async fn lock_raffle(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Option<Raffle>> {
    let r = query_as::<_, Raffle>("SELECT * FROM raffle WHERE id=$1 FOR UPDATE;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn list_raffles(conn: impl PgExecutor<'_>) -> anyhow::Result<Vec<RaffleSummary>> {
    let mut stream = query(
        "SELECT r.*, (SELECT COUNT(*) FROM participant p WHERE p.id_raffle = r.id) AS participant_count
         FROM raffle r
         ORDER BY r.time_created DESC, r.id DESC;")
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(RaffleSummary {
            raffle: Raffle::from_row(&row)?,
            participant_count: row.try_get("participant_count")?,
        });
    }

    Ok(result)
}

pub async fn close_raffle(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Raffle> {
    let r = query_as::<_, Raffle>("UPDATE raffle SET status=$2, time_closed=NOW() WHERE id=$1 RETURNING *;")
        .bind(id)
        .bind(RaffleStatus::Closed.as_str())
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn set_raffle_status(conn: impl PgExecutor<'_>, id: i32, status: RaffleStatus) -> anyhow::Result<()> {
    query("UPDATE raffle SET status=$2 WHERE id=$1;")
        .bind(id)
        .bind(status.as_str())
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn set_raffle_winner(conn: impl PgExecutor<'_>, id: i32, id_winner: i32) -> anyhow::Result<()> {
    query("UPDATE raffle SET id_winner=$2 WHERE id=$1;")
        .bind(id)
        .bind(id_winner)
        .execute(conn)
        .await?;

    Ok(())
}

/// Puts a raffle back to active with no winner and no closing time.
pub async fn reset_raffle(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Raffle> {
    let r = query_as::<_, Raffle>(
        "UPDATE raffle SET status=$2, id_winner=NULL, time_closed=NULL WHERE id=$1 RETURNING *;")
        .bind(id)
        .bind(RaffleStatus::Active.as_str())
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn add_participant(
    conn: impl PgExecutor<'_>,
    id_raffle: i32,
    name: &str,
    email: &str,
    email_normalized: &str,
    pin_hash: Option<&str>,
) -> anyhow::Result<Participant> {
    let r = query_as::<_, Participant>(
        "INSERT INTO participant (id_raffle, name, email, email_normalized, time_created, pin_hash)
         VALUES ($1, $2, $3, $4, NOW(), $5)
         RETURNING *;")
        .bind(id_raffle)
        .bind(name)
        .bind(email)
        .bind(email_normalized)
        .bind(pin_hash)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn get_participant(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Option<Participant>> {
    let r = query_as::<_, Participant>("SELECT * FROM participant WHERE id=$1;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn check_raffle_has_email(conn: impl PgExecutor<'_>, id_raffle: i32, email_normalized: &str) -> anyhow::Result<bool> {
    let r = query("SELECT EXISTS(SELECT 1 FROM participant WHERE id_raffle=$1 AND email_normalized=$2) AS known;")
        .bind(id_raffle)
        .bind(email_normalized)
        .fetch_one(conn)
        .await?;

    Ok(r.try_get("known")?)
}

pub async fn list_participants(conn: impl PgExecutor<'_>, id_raffle: i32) -> anyhow::Result<Vec<Participant>> {
    let mut stream = query_as::<_, Participant>("SELECT * FROM participant WHERE id_raffle=$1 ORDER BY time_created, id;")
        .bind(id_raffle)
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(row);
    }

    Ok(result)
}

pub async fn list_draw_history(conn: impl PgExecutor<'_>, id_raffle: i32) -> anyhow::Result<Vec<DrawHistory>> {
    let r = query_as::<_, DrawHistory>("SELECT * FROM draw_history WHERE id_raffle=$1 ORDER BY draw_number ASC;")
        .bind(id_raffle)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

/// The current draw result of a raffle: the entry with the highest draw number.
pub async fn latest_draw(conn: impl PgExecutor<'_>, id_raffle: i32) -> anyhow::Result<Option<DrawHistory>> {
    let r = query_as::<_, DrawHistory>(
        "SELECT * FROM draw_history WHERE id_raffle=$1 ORDER BY draw_number DESC LIMIT 1;")
        .bind(id_raffle)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

/// Appends a draw with the next draw number of the raffle.
pub async fn add_draw(conn: impl PgExecutor<'_>, id_raffle: i32, id_participant: i32) -> anyhow::Result<DrawHistory> {
    let r = query_as::<_, DrawHistory>(
        "INSERT INTO draw_history (id_raffle, draw_number, id_participant, was_present, time_drawn)
         VALUES ($1, (SELECT COALESCE(MAX(draw_number), 0) + 1 FROM draw_history WHERE id_raffle=$1), $2, FALSE, NOW())
         RETURNING *;")
        .bind(id_raffle)
        .bind(id_participant)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn mark_draw_present(conn: impl PgExecutor<'_>, id_draw: i32) -> anyhow::Result<DrawHistory> {
    let r = query_as::<_, DrawHistory>("UPDATE draw_history SET was_present=TRUE WHERE id=$1 RETURNING *;")
        .bind(id_draw)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn clear_draw_history(conn: impl PgExecutor<'_>, id_raffle: i32) -> anyhow::Result<u64> {
    let r = query("DELETE FROM draw_history WHERE id_raffle=$1;")
        .bind(id_raffle)
        .execute(conn)
        .await?;

    Ok(r.rows_affected())
}

/// Raffle with its winner, participants and draw history (ascending).
pub async fn get_raffle_detail(conn: &mut PgConnection, id: i32) -> anyhow::Result<Option<RaffleDetail>> {
    let raffle = match get_raffle(&mut *conn, id).await? {
        None => return Ok(None),
        Some(v) => v,
    };

    let participants = list_participants(&mut *conn, id).await?;
    let history = list_draw_history(&mut *conn, id).await?;

    let find = |id_participant: i32| participants.iter().find(|p| p.id == id_participant).cloned();

    let winner = raffle.id_winner.and_then(find);
    let draw_history = history.into_iter()
        .map(|draw| DrawHistoryEntry {
            participant: find(draw.id_participant),
            draw,
        })
        .collect();

    Ok(Some(RaffleDetail {
        participant_count: participants.len(),
        raffle,
        winner,
        participants,
        draw_history,
    }))
}

pub async fn add_talk(conn: impl PgExecutor<'_>, title: &str, speaker: Option<&str>) -> anyhow::Result<Talk> {
    let r = query_as::<_, Talk>(
        "INSERT INTO talk (title, speaker, time_created)
         VALUES ($1, $2, NOW())
         RETURNING *;")
        .bind(title)
        .bind(speaker)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn list_talks(conn: impl PgExecutor<'_>) -> anyhow::Result<Vec<Talk>> {
    let r = query_as::<_, Talk>("SELECT * FROM talk ORDER BY time_created DESC, id DESC;")
        .fetch_all(conn)
        .await?;

    Ok(r)
}

pub async fn get_talk(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Option<Talk>> {
    let r = query_as::<_, Talk>("SELECT * FROM talk WHERE id=$1;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn lock_talk(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Option<Talk>> {
    let r = query_as::<_, Talk>("SELECT * FROM talk WHERE id=$1 FOR UPDATE;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn check_talk_has_email(conn: impl PgExecutor<'_>, id_talk: i32, email_normalized: &str) -> anyhow::Result<bool> {
    let r = query("SELECT EXISTS(SELECT 1 FROM attendance WHERE id_talk=$1 AND email_normalized=$2) AS known;")
        .bind(id_talk)
        .bind(email_normalized)
        .fetch_one(conn)
        .await?;

    Ok(r.try_get("known")?)
}

pub async fn add_attendance(
    conn: impl PgExecutor<'_>,
    id_talk: i32,
    name: &str,
    email: &str,
    email_normalized: &str,
) -> anyhow::Result<Attendance> {
    let r = query_as::<_, Attendance>(
        "INSERT INTO attendance (id_talk, name, email, email_normalized, time_created)
         VALUES ($1, $2, $3, $4, NOW())
         RETURNING *;")
        .bind(id_talk)
        .bind(name)
        .bind(email)
        .bind(email_normalized)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn list_attendance(conn: impl PgExecutor<'_>, id_talk: i32) -> anyhow::Result<Vec<Attendance>> {
    let r = query_as::<_, Attendance>("SELECT * FROM attendance WHERE id_talk=$1 ORDER BY time_created, id;")
        .bind(id_talk)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

pub async fn get_attendance(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<Option<Attendance>> {
    let r = query_as::<_, Attendance>("SELECT * FROM attendance WHERE id=$1;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn delete_attendance(conn: impl PgExecutor<'_>, id: i32) -> anyhow::Result<bool> {
    let r = query("DELETE FROM attendance WHERE id=$1;")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(r.rows_affected() > 0)
}
