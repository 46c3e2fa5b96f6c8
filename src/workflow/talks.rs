use evlog::meta;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{Attendance, Talk};
use crate::runtime::get_logger;
use crate::support::identity::{is_valid_email, normalize_email};
use crate::workflow::{
    optional, required, WorkflowError, WorkflowResult, ATTENDANCE_NOT_FOUND, DUPLICATE_ATTENDANCE, TALK_NOT_FOUND,
};

pub async fn create_talk(conn: &PgPool, title: &str, speaker: Option<&str>) -> WorkflowResult<Talk> {
    let title = required(title, "title")?;
    let talk = model::add_talk(conn, title, optional(speaker)).await?;

    get_logger().info("Talk created.", meta! {
        "TalkID" => talk.id,
        "Title" => talk.title,
    });

    Ok(talk)
}

pub async fn list_talks(conn: &PgPool) -> WorkflowResult<Vec<Talk>> {
    Ok(model::list_talks(conn).await?)
}

pub async fn register_attendance(conn: &PgPool, id_talk: i32, name: &str, email: &str) -> WorkflowResult<Attendance> {
    let name = required(name, "name")?;
    let email = required(email, "email")?;
    if !is_valid_email(email) {
        return Err(WorkflowError::Invalid(format!("'{}' is not a valid email address", email)));
    }
    let email_normalized = normalize_email(email);

    let mut tx = conn.begin().await?;

    if model::lock_talk(&mut *tx, id_talk).await?.is_none() {
        return Err(WorkflowError::NotFound(TALK_NOT_FOUND));
    }

    if model::check_talk_has_email(&mut *tx, id_talk, &email_normalized).await? {
        return Err(WorkflowError::Conflict(DUPLICATE_ATTENDANCE));
    }

    let attendance = model::add_attendance(&mut *tx, id_talk, name, email, &email_normalized).await?;

    tx.commit().await?;

    get_logger().info("Attendance registered.", meta! {
        "TalkID" => id_talk,
        "AttendanceID" => attendance.id,
    });

    Ok(attendance)
}

pub async fn list_attendance(conn: &PgPool, id_talk: i32) -> WorkflowResult<Vec<Attendance>> {
    if model::get_talk(conn, id_talk).await?.is_none() {
        return Err(WorkflowError::NotFound(TALK_NOT_FOUND));
    }

    Ok(model::list_attendance(conn, id_talk).await?)
}

/// Deletes one attendance record. A record that belongs to another talk is
/// reported as missing.
pub async fn delete_attendance(conn: &PgPool, id_talk: i32, id_attendance: i32) -> WorkflowResult<()> {
    if model::get_talk(conn, id_talk).await?.is_none() {
        return Err(WorkflowError::NotFound(TALK_NOT_FOUND));
    }

    match model::get_attendance(conn, id_attendance).await? {
        Some(v) if v.id_talk == id_talk => {}
        _ => return Err(WorkflowError::NotFound(ATTENDANCE_NOT_FOUND)),
    }

    if !model::delete_attendance(conn, id_attendance).await? {
        return Err(WorkflowError::NotFound(ATTENDANCE_NOT_FOUND));
    }

    get_logger().info("Attendance deleted.", meta! {
        "TalkID" => id_talk,
        "AttendanceID" => id_attendance,
    });

    Ok(())
}
