use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::schema::{Attendance, Talk};
use crate::error::{fail, AppError};
use crate::routes::extract::{AppJson, AttendanceIds, TalkId};
use crate::routes::AppData;
use crate::workflow::talks as workflow;

#[derive(Deserialize)]
pub struct CreateTalkBody {
    title: String,
    speaker: Option<String>,
}

#[derive(Deserialize)]
pub struct AttendanceBody {
    name: String,
    email: String,
}

#[derive(Serialize)]
pub struct Deleted {
    success: bool,
}

pub async fn list(State(data): State<AppData>) -> Result<Json<Vec<Talk>>, AppError> {
    let talks = workflow::list_talks(data.db_client.conn()).await
        .map_err(fail("Failed to fetch talks"))?;

    Ok(Json(talks))
}

pub async fn create(
    State(data): State<AppData>,
    AppJson(body): AppJson<CreateTalkBody>,
) -> Result<(StatusCode, Json<Talk>), AppError> {
    let talk = workflow::create_talk(data.db_client.conn(), &body.title, body.speaker.as_deref()).await
        .map_err(fail("Failed to create talk"))?;

    Ok((StatusCode::CREATED, Json(talk)))
}

pub async fn attendance(State(data): State<AppData>, TalkId(id): TalkId) -> Result<Json<Vec<Attendance>>, AppError> {
    let attendance = workflow::list_attendance(data.db_client.conn(), id).await
        .map_err(fail("Failed to fetch attendance"))?;

    Ok(Json(attendance))
}

pub async fn register(
    State(data): State<AppData>,
    TalkId(id): TalkId,
    AppJson(body): AppJson<AttendanceBody>,
) -> Result<(StatusCode, Json<Attendance>), AppError> {
    let attendance = workflow::register_attendance(data.db_client.conn(), id, &body.name, &body.email).await
        .map_err(fail("Failed to register attendance"))?;

    Ok((StatusCode::CREATED, Json(attendance)))
}

pub async fn delete_attendance(
    State(data): State<AppData>,
    AttendanceIds(id, attendance_id): AttendanceIds,
) -> Result<Json<Deleted>, AppError> {
    workflow::delete_attendance(data.db_client.conn(), id, attendance_id).await
        .map_err(fail("Failed to delete attendance"))?;

    Ok(Json(Deleted { success: true }))
}
