//! # Attendance Data Model
//!
//! A student is stored as a single document carrying both the contact data
//! managed by staff and the attendance counters managed by the
//! [`Accumulator`](crate::core::Accumulator).
//!
//! The counters are derived from `total` and must always satisfy:
//!
//! - `consecutive_count == total % STREAK_LENGTH`
//! - `streak_of_four == total / STREAK_LENGTH`

use serde::{Deserialize, Serialize};

/// Stable numeric identifier of a student document.
pub type StudentId = u64;

/// Number of attended classes that completes one streak.
pub const STREAK_LENGTH: u64 = 4;

/// # Student Document
///
/// The wire and storage representation of a student. Field names are
/// camelCase so documents exported by earlier deployments load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Immutable identifier assigned at creation.
    pub id: StudentId,
    /// Display name used in notifications.
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Number of attendance events ever recorded.
    #[serde(default)]
    pub total: u64,
    /// Position inside the current streak, `total % STREAK_LENGTH`.
    #[serde(default)]
    pub consecutive_count: u64,
    /// Number of completed streaks, `total / STREAK_LENGTH`.
    #[serde(default)]
    pub streak_of_four: u64,
    /// Attended dates in insertion order. Duplicates are kept.
    #[serde(default)]
    pub dates: Vec<String>,
    /// Last date the student paid, free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_paid_date: Option<String>,
    /// Class selected from the dropdown options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_class: Option<String>,
}

impl Student {
    /// Creates a student with zeroed counters and no attended dates.
    pub fn new(id: StudentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            phone: None,
            total: 0,
            consecutive_count: 0,
            streak_of_four: 0,
            dates: Vec::new(),
            last_paid_date: None,
            selected_class: None,
        }
    }

    /// Records one attendance event for `date`.
    ///
    /// The date is appended even if it is already present, so marking the same
    /// day twice counts twice. Returns the streak event when this increment
    /// brings `consecutive_count` back to zero.
    pub fn mark_attended(&mut self, date: &str) -> Option<StreakReached> {
        self.total += 1;
        self.dates.push(date.to_string());
        self.consecutive_count = self.total % STREAK_LENGTH;
        if self.consecutive_count != 0 {
            return None;
        }
        self.streak_of_four += 1;
        Some(StreakReached {
            student_id: self.id,
            student_name: self.name.clone(),
            streaks: self.streak_of_four,
        })
    }

    /// Clears every attendance counter and the date history.
    pub fn reset_attendance(&mut self) {
        self.total = 0;
        self.consecutive_count = 0;
        self.streak_of_four = 0;
        self.dates.clear();
    }

    /// Whether the derived counters agree with `total`.
    pub fn counters_consistent(&self) -> bool {
        self.consecutive_count == self.total % STREAK_LENGTH
            && self.streak_of_four == self.total / STREAK_LENGTH
    }

    /// Re-derives the counters from `total`. Returns `true` if anything changed.
    pub fn normalize_counters(&mut self) -> bool {
        if self.counters_consistent() {
            return false;
        }
        self.consecutive_count = self.total % STREAK_LENGTH;
        self.streak_of_four = self.total / STREAK_LENGTH;
        true
    }
}

/// # Streak Reached
///
/// Domain event produced when an attendance increment completes a streak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakReached {
    /// The student that completed the streak.
    pub student_id: StudentId,
    /// The student's name at the time of the event.
    pub student_name: String,
    /// Completed streaks including this one.
    pub streaks: u64,
}

/// # Notification
///
/// The payload pushed to live clients. Serialized as one JSON object per
/// server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// The student the milestone belongs to.
    pub student_id: StudentId,
    /// The student's display name.
    pub student_name: String,
    /// Human-readable message shown by the front end.
    pub message: String,
}

impl Notification {
    /// Builds the milestone notification for a completed streak.
    pub fn streak(student_id: StudentId, student_name: &str) -> Self {
        Self {
            student_id,
            student_name: student_name.to_string(),
            message: format!("Student {student_name} (ID: {student_id}) has completed a streak!"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_follow_total_for_every_increment() {
        let mut student = Student::new(7, "Ada");
        for n in 1..=13u64 {
            student.mark_attended("2024-01-10");
            assert_eq!(student.total, n);
            assert_eq!(student.consecutive_count, n % 4);
            assert_eq!(student.streak_of_four, n / 4);
            assert!(student.counters_consistent());
        }
    }

    #[test]
    fn streak_event_only_on_cycle_completion() {
        let mut student = Student::new(1, "Grace");
        let events: Vec<_> = (0..8).map(|_| student.mark_attended("2024-02-01")).collect();
        let fired: Vec<usize> = events
            .iter()
            .enumerate()
            .filter_map(|(idx, event)| event.as_ref().map(|_| idx))
            .collect();
        assert_eq!(fired, vec![3, 7]);
        assert_eq!(events[7].as_ref().map(|e| e.streaks), Some(2));
    }

    #[test]
    fn same_date_twice_is_counted_twice() {
        let mut student = Student::new(2, "Linus");
        student.mark_attended("2024-03-05");
        student.mark_attended("2024-03-05");
        assert_eq!(student.total, 2);
        assert_eq!(student.dates, vec!["2024-03-05", "2024-03-05"]);
    }

    #[test]
    fn normalize_rederives_inconsistent_counters() {
        let mut student = Student::new(3, "Barbara");
        student.total = 9;
        student.consecutive_count = 3;
        assert!(student.normalize_counters());
        assert_eq!(student.consecutive_count, 1);
        assert_eq!(student.streak_of_four, 2);
        assert!(!student.normalize_counters());
    }

    #[test]
    fn notification_message_and_wire_format() {
        let notification = Notification::streak(42, "Edsger");
        assert_eq!(notification.message, "Student Edsger (ID: 42) has completed a streak!");
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["studentId"], 42);
        assert_eq!(json["studentName"], "Edsger");
    }

    #[test]
    fn legacy_document_without_counters_deserializes() {
        let student: Student = serde_json::from_str(r#"{"id": 5, "name": "Ken"}"#).unwrap();
        assert_eq!(student.total, 0);
        assert!(student.dates.is_empty());
        assert!(student.counters_consistent());
    }
}
