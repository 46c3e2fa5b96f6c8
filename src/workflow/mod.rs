//! Multi-step operations on raffles and talks.
//!
//! Each workflow that writes runs inside one transaction and takes the row
//! lock of the raffle (or talk) it changes before checking any precondition,
//! so two requests on the same raffle never interleave. A precondition failure
//! drops the transaction, which rolls it back.

use thiserror::Error;

pub mod confirm;
pub mod draw;
pub mod raffles;
pub mod register;
pub mod reopen;
pub mod talks;

#[cfg(test)]
mod tests;

pub const RAFFLE_NOT_FOUND: &str = "Raffle not found";
pub const TALK_NOT_FOUND: &str = "Talk not found";
pub const ATTENDANCE_NOT_FOUND: &str = "Attendance not found";
pub const ALREADY_FINALIZED: &str = "Raffle already finalized";
pub const NO_DRAW_YET: &str = "No draw has been made yet";
pub const NOT_FINALIZED: &str = "Raffle is not finalized";
pub const NOT_ACTIVE: &str = "Raffle is not active";
pub const NO_ELIGIBLE: &str = "No eligible participants";
pub const NOT_ACCEPTING: &str = "Raffle is not accepting registrations";
pub const REGISTRATION_ENDED: &str = "Raffle registration has ended";
pub const DUPLICATE_PARTICIPANT: &str = "Email already registered for this raffle";
pub const DUPLICATE_ATTENDANCE: &str = "Email already registered for this talk";

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    NotFound(&'static str),

    /// The entity is in the wrong state for the requested transition.
    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(e: sqlx::Error) -> Self {
        WorkflowError::Internal(e.into())
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

fn required<'a>(value: &'a str, field: &str) -> WorkflowResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::Invalid(format!("`{}` must not be empty", field)));
    }
    Ok(value)
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
