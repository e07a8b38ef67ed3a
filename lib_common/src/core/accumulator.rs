//! # Attendance Accumulator
//!
//! Applies a marked attendance sheet, one student id at a time, against the
//! student store and reports the streak events it produced.
//!
//! ## Behaviour:
//!
//! - Ids are processed in request order. A repeated id is applied once per
//!   occurrence, so it counts as two attendance events.
//! - Each id is fetched, incremented and saved on its own. A missing student or
//!   a store failure is recorded against that id and processing moves on to the
//!   next one; documents already saved are not rolled back.
//! - Writes are serialized through an internal lock so two concurrent sheets
//!   never interleave the read-modify-write of the same document.
//! - The accumulator never talks to the push channel. Callers hand the returned
//!   events to a [`StreakNotifier`](crate::core::StreakNotifier).

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::core::error::{AttendanceError, StoreError};
use crate::core::model::{StreakReached, StudentId};
use crate::core::store::StudentStore;

/// # Attendance Outcome
///
/// Per-id report of one `record_attendance` call.
#[derive(Debug, Default)]
pub struct AttendanceOutcome {
    /// Ids whose increment was persisted, in processing order.
    pub recorded: Vec<StudentId>,
    /// Streak events produced by the persisted increments.
    pub events: Vec<StreakReached>,
    /// Ids that could not be processed and why.
    pub failures: Vec<(StudentId, AttendanceError)>,
}

impl AttendanceOutcome {
    /// Whether every id in the sheet was recorded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids rejected because no such student exists.
    pub fn not_found(&self) -> Vec<StudentId> {
        self.failures
            .iter()
            .filter(|(_, err)| matches!(err, AttendanceError::NotFound(_)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids that failed because of the store, with the first error's message.
    pub fn store_failures(&self) -> Option<(Vec<StudentId>, String)> {
        let mut ids = Vec::new();
        let mut detail = None;
        for (id, err) in &self.failures {
            if let AttendanceError::Store(store_err) = err {
                ids.push(*id);
                detail.get_or_insert_with(|| store_err.to_string());
            }
        }
        detail.map(|detail| (ids, detail))
    }
}

/// # Accumulator
///
/// Owns the write path for attendance counters.
pub struct Accumulator {
    store: Arc<dyn StudentStore>,
    write_lock: Mutex<()>,
}

impl Accumulator {
    /// Creates an accumulator writing through `store`.
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Records attendance on `date` for every id in `ids`.
    ///
    /// Never fails as a whole: per-id failures are collected in the outcome.
    pub async fn record_attendance(&self, date: &str, ids: &[StudentId]) -> AttendanceOutcome {
        let _guard = self.write_lock.lock().await;
        let mut outcome = AttendanceOutcome::default();

        for &id in ids {
            match self.record_one(date, id).await {
                Ok(event) => {
                    outcome.recorded.push(id);
                    if let Some(event) = event {
                        info!(student_id = id, streaks = event.streaks, "streak completed");
                        outcome.events.push(event);
                    }
                }
                Err(err) => {
                    warn!(student_id = id, error = %err, "attendance not recorded");
                    outcome.failures.push((id, err));
                }
            }
        }

        debug!(
            date,
            recorded = outcome.recorded.len(),
            failed = outcome.failures.len(),
            streaks = outcome.events.len(),
            "attendance sheet applied"
        );
        outcome
    }

    async fn record_one(&self, date: &str, id: StudentId) -> Result<Option<StreakReached>, AttendanceError> {
        let mut student = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AttendanceError::NotFound(id))?;
        let event = student.mark_attended(date);
        self.store.save(&student).await?;
        Ok(event)
    }

    /// Resets every student's counters and date history. Returns how many
    /// documents were reset.
    pub async fn reset_all(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut students = self.store.list().await?;
        for student in &mut students {
            student.reset_attendance();
        }
        let count = students.len();
        self.store.replace_all(students).await?;
        info!(students = count, "attendance reset");
        Ok(count)
    }

    /// Holds the write lock for a read-modify-write done outside the
    /// accumulator, such as editing a student's contact data.
    pub async fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::model::Student;
    use crate::core::store::{MemoryStore, StoreFuture};
    use futures_util::FutureExt;

    fn student_with_total(id: StudentId, name: &str, total: u64) -> Student {
        let mut student = Student::new(id, name);
        for _ in 0..total {
            student.mark_attended("2024-01-01");
        }
        student
    }

    #[tokio::test]
    async fn fourth_class_completes_a_streak() {
        let store = Arc::new(MemoryStore::with_students([student_with_total(1, "S1", 3)]));
        let accumulator = Accumulator::new(store.clone());

        let outcome = accumulator.record_attendance("2024-01-10", &[1]).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.recorded, vec![1]);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].student_id, 1);

        let s1 = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(s1.total, 4);
        assert_eq!(s1.consecutive_count, 0);
        assert_eq!(s1.streak_of_four, 1);
        assert_eq!(s1.dates.last().map(String::as_str), Some("2024-01-10"));
    }

    #[tokio::test]
    async fn counters_hold_across_many_sheets() {
        let store = Arc::new(MemoryStore::with_students([Student::new(1, "A"), Student::new(2, "B")]));
        let accumulator = Accumulator::new(store.clone());

        let mut streaks_for_a = 0;
        for day in 0..11 {
            let ids: &[StudentId] = if day % 2 == 0 { &[1, 2] } else { &[1] };
            let outcome = accumulator.record_attendance(&format!("2024-05-{:02}", day + 1), ids).await;
            streaks_for_a += outcome.events.iter().filter(|e| e.student_id == 1).count();
        }

        let a = store.find_by_id(1).await.unwrap().unwrap();
        let b = store.find_by_id(2).await.unwrap().unwrap();
        assert_eq!((a.total, a.consecutive_count, a.streak_of_four), (11, 3, 2));
        assert_eq!((b.total, b.consecutive_count, b.streak_of_four), (6, 2, 1));
        assert_eq!(streaks_for_a, 2);
    }

    #[tokio::test]
    async fn repeated_id_in_one_sheet_applies_twice() {
        let store = Arc::new(MemoryStore::with_students([student_with_total(5, "Dup", 2)]));
        let accumulator = Accumulator::new(store.clone());

        let outcome = accumulator.record_attendance("2024-02-02", &[5, 5]).await;

        assert_eq!(outcome.recorded, vec![5, 5]);
        assert_eq!(outcome.events.len(), 1);
        let student = store.find_by_id(5).await.unwrap().unwrap();
        assert_eq!(student.total, 4);
        assert_eq!(student.dates.iter().filter(|d| *d == "2024-02-02").count(), 2);
    }

    #[tokio::test]
    async fn same_date_on_two_calls_double_counts() {
        let store = Arc::new(MemoryStore::with_students([Student::new(8, "Twice")]));
        let accumulator = Accumulator::new(store.clone());

        accumulator.record_attendance("2024-03-03", &[8]).await;
        accumulator.record_attendance("2024-03-03", &[8]).await;

        let student = store.find_by_id(8).await.unwrap().unwrap();
        assert_eq!(student.total, 2);
        assert_eq!(student.dates, vec!["2024-03-03", "2024-03-03"]);
    }

    #[tokio::test]
    async fn unknown_id_is_reported_and_others_still_apply() {
        let store = Arc::new(MemoryStore::with_students([Student::new(1, "Known"), Student::new(3, "Also")]));
        let accumulator = Accumulator::new(store.clone());

        let outcome = accumulator.record_attendance("2024-04-04", &[1, 2, 3]).await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.recorded, vec![1, 3]);
        assert_eq!(outcome.not_found(), vec![2]);
        assert!(outcome.store_failures().is_none());
        assert_eq!(store.find_by_id(3).await.unwrap().unwrap().total, 1);
    }

    struct UnavailableStore;

    impl StudentStore for UnavailableStore {
        fn find_by_id(&self, _id: StudentId) -> StoreFuture<'_, Option<Student>> {
            async { Err(StoreError::Unavailable("connection refused".into())) }.boxed()
        }
        fn save<'a>(&'a self, _student: &'a Student) -> StoreFuture<'a, ()> {
            async { Err(StoreError::Unavailable("connection refused".into())) }.boxed()
        }
        fn list(&self) -> StoreFuture<'_, Vec<Student>> {
            async { Err(StoreError::Unavailable("connection refused".into())) }.boxed()
        }
        fn delete(&self, _id: StudentId) -> StoreFuture<'_, bool> {
            async { Err(StoreError::Unavailable("connection refused".into())) }.boxed()
        }
        fn replace_all(&self, _students: Vec<Student>) -> StoreFuture<'_, ()> {
            async { Err(StoreError::Unavailable("connection refused".into())) }.boxed()
        }
    }

    #[tokio::test]
    async fn store_failures_are_reported_without_events() {
        let accumulator = Accumulator::new(Arc::new(UnavailableStore));

        let outcome = accumulator.record_attendance("2024-04-04", &[1, 2]).await;

        assert!(outcome.recorded.is_empty());
        assert!(outcome.events.is_empty());
        let (ids, detail) = outcome.store_failures().unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert!(detail.contains("connection refused"));
        assert!(accumulator.reset_all().await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_counters_for_everyone() {
        let store = Arc::new(MemoryStore::with_students([
            student_with_total(1, "A", 5),
            student_with_total(2, "B", 8),
        ]));
        let accumulator = Accumulator::new(store.clone());

        assert_eq!(accumulator.reset_all().await.unwrap(), 2);

        for student in store.list().await.unwrap() {
            assert_eq!((student.total, student.consecutive_count, student.streak_of_four), (0, 0, 0));
            assert!(student.dates.is_empty());
        }
    }
}
