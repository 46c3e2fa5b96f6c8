use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaffleStatus {
    Active,
    Closed,
    Drawn,
}

impl RaffleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaffleStatus::Active => "active",
            RaffleStatus::Closed => "closed",
            RaffleStatus::Drawn => "drawn",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown raffle status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for RaffleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RaffleStatus::Active),
            "closed" => Ok(RaffleStatus::Closed),
            "drawn" => Ok(RaffleStatus::Drawn),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Raffle {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub prize: String,
    pub status: RaffleStatus,
    #[serde(rename = "winnerId")]
    pub id_winner: Option<i32>,
    #[serde(rename = "createdAt")]
    pub time_created: DateTime<Utc>,
    #[serde(rename = "closedAt")]
    pub time_closed: Option<DateTime<Utc>>,
    pub timebox_minutes: Option<i32>,
    #[serde(rename = "endsAt")]
    pub time_ends: Option<DateTime<Utc>>,
    pub require_pin: bool,
    pub allowed_domain: Option<String>,
}

impl Raffle {
    /// Registration is over once the timebox has run out.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        match self.time_ends {
            None => false,
            Some(ends) => now >= ends,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Raffle {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<RaffleStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_owned(),
                source: Box::new(e),
            })?;

        Ok(Raffle {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            prize: row.try_get("prize")?,
            status,
            id_winner: row.try_get("id_winner")?,
            time_created: row.try_get("time_created")?,
            time_closed: row.try_get("time_closed")?,
            timebox_minutes: row.try_get("timebox_minutes")?,
            time_ends: row.try_get("time_ends")?,
            require_pin: row.try_get("require_pin")?,
            allowed_domain: row.try_get("allowed_domain")?,
        })
    }
}

/// End of the registration window for a raffle created at `created`.
pub fn compute_time_ends(created: DateTime<Utc>, timebox_minutes: Option<i32>) -> Option<DateTime<Utc>> {
    timebox_minutes.map(|m| created + Duration::minutes(m as i64))
}

#[derive(Clone, Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i32,
    #[serde(rename = "raffleId")]
    pub id_raffle: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub email_normalized: String,
    #[serde(rename = "createdAt")]
    pub time_created: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub pin_hash: Option<String>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DrawHistory {
    pub id: i32,
    #[serde(rename = "raffleId")]
    pub id_raffle: i32,
    pub draw_number: i32,
    #[serde(rename = "participantId")]
    pub id_participant: i32,
    pub was_present: bool,
    #[serde(rename = "drawnAt")]
    pub time_drawn: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawHistoryEntry {
    #[serde(flatten)]
    pub draw: DrawHistory,
    pub participant: Option<Participant>,
}

/// A raffle with everything hanging off it, as returned by the detail endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaffleDetail {
    #[serde(flatten)]
    pub raffle: Raffle,
    pub winner: Option<Participant>,
    pub participants: Vec<Participant>,
    pub draw_history: Vec<DrawHistoryEntry>,
    pub participant_count: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaffleSummary {
    #[serde(flatten)]
    pub raffle: Raffle,
    pub participant_count: i64,
}

#[derive(Clone, Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Talk {
    pub id: i32,
    pub title: String,
    pub speaker: Option<String>,
    #[serde(rename = "createdAt")]
    pub time_created: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: i32,
    #[serde(rename = "talkId")]
    pub id_talk: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub email_normalized: String,
    #[serde(rename = "createdAt")]
    pub time_created: DateTime<Utc>,
}
