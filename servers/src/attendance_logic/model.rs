use axum::{Json, http::StatusCode};
use chrono::NaiveDate;
use lib_common::core::{Student, StudentId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::attendance_logic::error::AppError;

/// Date format the front end sends.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of most recent dates shown in the unfiltered attendance view.
pub const RECENT_DATES: usize = 4;

/// Marked attendance sheet. `Ids` is accepted for older front ends.
#[derive(Deserialize, Debug)]
pub struct AttendanceRequest {
    pub date: String,
    #[serde(alias = "Ids")]
    pub ids: Vec<StudentId>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DateFilterRequest {
    #[serde(default)]
    pub date: Option<String>,
}

/// Editable fields of a student.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub last_paid_date: Option<String>,
    #[serde(default)]
    pub selected_class: Option<String>,
}

impl StudentInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }
        Ok(())
    }

    /// Copies the editable fields onto `student`, leaving counters untouched.
    pub fn apply_to(self, student: &mut Student) {
        student.name = self.name;
        student.email = self.email;
        student.phone = self.phone;
        student.last_paid_date = self.last_paid_date;
        student.selected_class = self.selected_class;
    }
}

/// Contact data of one student.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StudentContact {
    pub id: StudentId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub last_paid_date: Option<String>,
    pub selected_class: Option<String>,
}

impl From<Student> for StudentContact {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            phone: s.phone,
            last_paid_date: s.last_paid_date,
            selected_class: s.selected_class,
        }
    }
}

/// A student as listed by the attendance views.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    pub id: StudentId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub total: u64,
    pub consecutive_count: u64,
    pub streak_of_four: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_paid_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_class: Option<String>,
}

impl AttendanceView {
    fn from_student(s: Student, dates: Option<Vec<String>>) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            phone: s.phone,
            total: s.total,
            consecutive_count: s.consecutive_count,
            streak_of_four: s.streak_of_four,
            dates,
            last_paid_date: s.last_paid_date,
            selected_class: s.selected_class,
        }
    }

    pub fn without_dates(s: Student) -> Self {
        Self::from_student(s, None)
    }

    pub fn with_recent_dates(mut s: Student) -> Self {
        let skip = s.dates.len().saturating_sub(RECENT_DATES);
        let recent = s.dates.split_off(skip);
        Self::from_student(s, Some(recent))
    }
}

/// Full export and import document.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Backup {
    pub students: Vec<Student>,
}

#[derive(Deserialize, Debug)]
pub struct OptionRequest {
    pub option: String,
}

/// Rejects anything that is not a `yyyy-MM-dd` calendar date.
pub fn validate_date(date: &str) -> Result<(), AppError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map(|_| ())
        .map_err(|e| AppError::BadRequest(format!("date {date:?} is not yyyy-MM-dd: {e}")))
}

/// Parses a JSON body, mapping failures to `400`.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))
}

/// `{message}` body used by every successful mutation.
pub fn message(status: StatusCode, text: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": text })))
}
