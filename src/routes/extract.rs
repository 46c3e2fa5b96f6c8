use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::workflow::{ATTENDANCE_NOT_FOUND, RAFFLE_NOT_FOUND, TALK_NOT_FOUND};

/// An id that does not fit in an `i32` cannot name a row, so it is reported
/// the same way as a missing one.
fn parse_id(raw: &str, missing: &'static str) -> Result<i32, AppError> {
    raw.trim().parse::<i32>().map_err(|_| AppError::NotFound(missing))
}

/// `:id` of a raffle route.
pub struct RaffleId(pub i32);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RaffleId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await
            .map_err(|_| AppError::NotFound(RAFFLE_NOT_FOUND))?;

        Ok(RaffleId(parse_id(&raw, RAFFLE_NOT_FOUND)?))
    }
}

/// `:id` of a talk route.
pub struct TalkId(pub i32);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TalkId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await
            .map_err(|_| AppError::NotFound(TALK_NOT_FOUND))?;

        Ok(TalkId(parse_id(&raw, TALK_NOT_FOUND)?))
    }
}

/// `:id/attendance/:attendance_id`.
pub struct AttendanceIds(pub i32, pub i32);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AttendanceIds {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((talk, attendance)) = Path::<(String, String)>::from_request_parts(parts, state).await
            .map_err(|_| AppError::NotFound(TALK_NOT_FOUND))?;

        Ok(AttendanceIds(
            parse_id(&talk, TALK_NOT_FOUND)?,
            parse_id(&attendance, ATTENDANCE_NOT_FOUND)?,
        ))
    }
}

/// `Json` whose rejections answer 400 with the usual `{error}` body.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(AppJson(v)),
            Err(e) => Err(AppError::from(e)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}
