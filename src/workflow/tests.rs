//! Database-backed workflow tests. They run against the PostgreSQL instance in
//! `EASYRAFFLE_TEST_DATABASE_URL` and are ignored by default; run them with
//! `cargo test -- --ignored`. Every test creates its own rows, so they can
//! share one database.

use std::env;

use sqlx::{Executor, PgPool};

use crate::db::dbclient::DBClient;
use crate::db::model::{self, NewRaffle};
use crate::db::schema::{Raffle, RaffleStatus};
use crate::workflow::confirm::confirm_winner;
use crate::workflow::draw::draw_winner;
use crate::workflow::raffles::{close_raffle, get_raffle, verify_winner_pin};
use crate::workflow::register::{register_participant, Registration};
use crate::workflow::reopen::reopen_raffle;
use crate::workflow::talks::{create_talk, delete_attendance, list_attendance, register_attendance};
use crate::workflow::*;

async fn test_client() -> DBClient {
    let url = env::var("EASYRAFFLE_TEST_DATABASE_URL")
        .expect("EASYRAFFLE_TEST_DATABASE_URL must be set for database tests");

    DBClient::new(&url, 2).await.expect("failed to connect to test database")
}

async fn new_raffle(conn: &PgPool, require_pin: bool) -> Raffle {
    model::add_raffle(conn, &NewRaffle {
        name: "Test raffle",
        description: None,
        prize: "Test prize",
        timebox_minutes: None,
        require_pin,
        allowed_domain: None,
    }).await.unwrap()
}

async fn register(conn: &PgPool, id_raffle: i32, email: &str) -> i32 {
    register_participant(conn, id_raffle, &Registration {
        name: "Someone",
        email,
        pin: None,
    }).await.unwrap().id
}

/// Makes every UPDATE of raffle `id` fail until `allow_raffle_updates` runs.
async fn fail_raffle_updates(conn: &PgPool, id: i32) {
    let sql = format!(r#"
        CREATE FUNCTION fail_raffle_update_{id}() RETURNS trigger AS $$
        BEGIN
            IF NEW.id = {id} THEN
                RAISE EXCEPTION 'raffle {id} rejects updates';
            END IF;
            RETURN NEW;
        END
        $$ LANGUAGE plpgsql;
        CREATE TRIGGER fail_raffle_update_{id} BEFORE UPDATE ON raffle
            FOR EACH ROW EXECUTE FUNCTION fail_raffle_update_{id}();
    "#, id = id);
    conn.execute(sql.as_str()).await.unwrap();
}

async fn allow_raffle_updates(conn: &PgPool, id: i32) {
    let sql = format!(r#"
        DROP TRIGGER fail_raffle_update_{id} ON raffle;
        DROP FUNCTION fail_raffle_update_{id}();
    "#, id = id);
    conn.execute(sql.as_str()).await.unwrap();
}

fn conflict<T: std::fmt::Debug>(r: WorkflowResult<T>) -> &'static str {
    match r {
        Err(WorkflowError::Conflict(m)) => m,
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_confirm_without_draw() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;

    assert_eq!(conflict(confirm_winner(db.conn(), raffle.id).await), NO_DRAW_YET);

    let after = model::get_raffle(db.conn(), raffle.id).await.unwrap().unwrap();
    assert_eq!(after.status, RaffleStatus::Active);
    assert_eq!(after.id_winner, None);
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_missing_raffle() {
    let db = test_client().await;

    assert!(matches!(confirm_winner(db.conn(), i32::MAX).await, Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND))));
    assert!(matches!(reopen_raffle(db.conn(), i32::MAX).await, Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND))));
    assert!(matches!(draw_winner(db.conn(), i32::MAX).await, Err(WorkflowError::NotFound(RAFFLE_NOT_FOUND))));
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_confirm_marks_latest_draw() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;
    register(db.conn(), raffle.id, "b@example.com").await;

    let first = draw_winner(db.conn(), raffle.id).await.unwrap();
    let second = draw_winner(db.conn(), raffle.id).await.unwrap();
    assert_eq!(first.draw_number, 1);
    assert_eq!(second.draw_number, 2);
    assert_ne!(first.winner.id, second.winner.id);

    let confirmed = confirm_winner(db.conn(), raffle.id).await.unwrap();
    assert_eq!(confirmed.raffle.raffle.status, RaffleStatus::Drawn);
    assert_eq!(confirmed.confirmed_winner.id, second.winner.id);
    assert_eq!(confirmed.raffle.winner.as_ref().map(|w| w.id), Some(second.winner.id));

    let history = &confirmed.raffle.draw_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].draw.draw_number, 1);
    assert!(!history[0].draw.was_present);
    assert!(history[1].draw.was_present);

    assert_eq!(conflict(confirm_winner(db.conn(), raffle.id).await), ALREADY_FINALIZED);
    assert_eq!(conflict(draw_winner(db.conn(), raffle.id).await), ALREADY_FINALIZED);
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_reopen_clears_history() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;

    assert_eq!(conflict(reopen_raffle(db.conn(), raffle.id).await), NOT_FINALIZED);

    close_raffle(db.conn(), raffle.id).await.unwrap();
    draw_winner(db.conn(), raffle.id).await.unwrap();
    confirm_winner(db.conn(), raffle.id).await.unwrap();

    let reopened = reopen_raffle(db.conn(), raffle.id).await.unwrap();
    assert_eq!(reopened.raffle.status, RaffleStatus::Active);
    assert_eq!(reopened.raffle.id_winner, None);
    assert_eq!(reopened.raffle.time_closed, None);
    assert!(reopened.winner.is_none());
    assert_eq!(reopened.participant_count, 1);
    assert!(model::list_draw_history(db.conn(), raffle.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_confirm_reopen_confirm() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;

    draw_winner(db.conn(), raffle.id).await.unwrap();
    confirm_winner(db.conn(), raffle.id).await.unwrap();
    reopen_raffle(db.conn(), raffle.id).await.unwrap();

    let redraw = draw_winner(db.conn(), raffle.id).await.unwrap();
    assert_eq!(redraw.draw_number, 1);
    confirm_winner(db.conn(), raffle.id).await.unwrap();

    let history = model::list_draw_history(db.conn(), raffle.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].was_present);
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_concurrent_confirm_finalizes_once() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;
    draw_winner(db.conn(), raffle.id).await.unwrap();

    let (a, b) = tokio::join!(
        confirm_winner(db.conn(), raffle.id),
        confirm_winner(db.conn(), raffle.id),
    );

    let ok = [a.is_ok(), b.is_ok()].iter().filter(|v| **v).count();
    assert_eq!(ok, 1);
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_draw_exhausts_participants() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;

    assert_eq!(conflict(draw_winner(db.conn(), raffle.id).await), NO_ELIGIBLE);

    register(db.conn(), raffle.id, "only@example.com").await;
    draw_winner(db.conn(), raffle.id).await.unwrap();
    assert_eq!(conflict(draw_winner(db.conn(), raffle.id).await), NO_ELIGIBLE);
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_duplicate_registration() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;

    register(db.conn(), raffle.id, "Fulano.Algo@nava.com.br").await;
    let dup = register_participant(db.conn(), raffle.id, &Registration {
        name: "Fulano again",
        email: "fulano_algo@NAVA.com.br",
        pin: None,
    }).await;
    assert_eq!(conflict(dup), DUPLICATE_PARTICIPANT);

    let detail = get_raffle(db.conn(), raffle.id).await.unwrap();
    assert_eq!(detail.participant_count, 1);
    assert_eq!(detail.participants[0].email, "Fulano.Algo@nava.com.br");
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_closed_raffle_rejects_registration() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;

    let closed = close_raffle(db.conn(), raffle.id).await.unwrap();
    assert_eq!(closed.status, RaffleStatus::Closed);
    assert!(closed.time_closed.is_some());
    assert_eq!(conflict(close_raffle(db.conn(), raffle.id).await), NOT_ACTIVE);

    let r = register_participant(db.conn(), raffle.id, &Registration {
        name: "Late",
        email: "late@example.com",
        pin: None,
    }).await;
    assert_eq!(conflict(r), NOT_ACCEPTING);
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_winner_pin() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), true).await;

    assert_eq!(conflict(verify_winner_pin(db.conn(), raffle.id, "12345").await), NO_DRAW_YET);

    register_participant(db.conn(), raffle.id, &Registration {
        name: "Pinned",
        email: "pinned@example.com",
        pin: Some("24680"),
    }).await.unwrap();
    draw_winner(db.conn(), raffle.id).await.unwrap();

    assert!(verify_winner_pin(db.conn(), raffle.id, "24680").await.unwrap());
    assert!(!verify_winner_pin(db.conn(), raffle.id, "13579").await.unwrap());
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_attendance_scoped_to_talk() {
    let db = test_client().await;
    let talk = create_talk(db.conn(), "Rust in production", Some("Ana")).await.unwrap();
    let other = create_talk(db.conn(), "Databases", None).await.unwrap();

    let a = register_attendance(db.conn(), talk.id, "Ana", "ana.maria@example.com").await.unwrap();
    let dup = register_attendance(db.conn(), talk.id, "Ana", "anamaria@example.com").await;
    assert_eq!(conflict(dup), DUPLICATE_ATTENDANCE);

    let r = delete_attendance(db.conn(), other.id, a.id).await;
    assert!(matches!(r, Err(WorkflowError::NotFound(ATTENDANCE_NOT_FOUND))));
    let r = delete_attendance(db.conn(), i32::MAX, a.id).await;
    assert!(matches!(r, Err(WorkflowError::NotFound(TALK_NOT_FOUND))));

    delete_attendance(db.conn(), talk.id, a.id).await.unwrap();
    assert!(list_attendance(db.conn(), talk.id).await.unwrap().is_empty());

    let r = delete_attendance(db.conn(), talk.id, a.id).await;
    assert!(matches!(r, Err(WorkflowError::NotFound(ATTENDANCE_NOT_FOUND))));
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_failed_confirm_leaves_draw_unmarked() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;
    draw_winner(db.conn(), raffle.id).await.unwrap();

    // The draw row is marked present before the raffle status update fails.
    fail_raffle_updates(db.conn(), raffle.id).await;
    let r = confirm_winner(db.conn(), raffle.id).await;
    allow_raffle_updates(db.conn(), raffle.id).await;
    assert!(matches!(r, Err(WorkflowError::Internal(_))));

    let after = model::get_raffle(db.conn(), raffle.id).await.unwrap().unwrap();
    assert_eq!(after.status, RaffleStatus::Active);
    let history = model::list_draw_history(db.conn(), raffle.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].was_present);

    confirm_winner(db.conn(), raffle.id).await.unwrap();
}

#[tokio::test]
#[ignore = "needs EASYRAFFLE_TEST_DATABASE_URL"]
async fn test_failed_reopen_keeps_history() {
    let db = test_client().await;
    let raffle = new_raffle(db.conn(), false).await;
    register(db.conn(), raffle.id, "a@example.com").await;
    register(db.conn(), raffle.id, "b@example.com").await;
    draw_winner(db.conn(), raffle.id).await.unwrap();
    draw_winner(db.conn(), raffle.id).await.unwrap();
    let confirmed = confirm_winner(db.conn(), raffle.id).await.unwrap();

    // History is deleted before the raffle reset fails.
    fail_raffle_updates(db.conn(), raffle.id).await;
    let r = reopen_raffle(db.conn(), raffle.id).await;
    allow_raffle_updates(db.conn(), raffle.id).await;
    assert!(matches!(r, Err(WorkflowError::Internal(_))));

    let after = model::get_raffle(db.conn(), raffle.id).await.unwrap().unwrap();
    assert_eq!(after.status, RaffleStatus::Drawn);
    assert_eq!(after.id_winner, Some(confirmed.confirmed_winner.id));
    let history = model::list_draw_history(db.conn(), raffle.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].was_present);
    assert!(history[1].was_present);

    reopen_raffle(db.conn(), raffle.id).await.unwrap();
}
