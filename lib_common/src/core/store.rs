//! # Store Seams
//!
//! The engine only needs document semantics from persistence: fetch one
//! student by id, write one student back, list, delete and bulk replace. The
//! traits return boxed futures so they can live behind `Arc<dyn ...>` in the
//! server state.

use std::collections::BTreeMap;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::RwLock;

use crate::core::error::StoreError;
use crate::core::model::{Student, StudentId};

/// Future returned by every store operation.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

/// Persistence of student documents.
pub trait StudentStore: Send + Sync {
    /// Fetches one student, `None` when the id is unknown.
    fn find_by_id(&self, id: StudentId) -> StoreFuture<'_, Option<Student>>;

    /// Inserts or overwrites the document keyed by `student.id`.
    fn save<'a>(&'a self, student: &'a Student) -> StoreFuture<'a, ()>;

    /// All students ordered by id.
    fn list(&self) -> StoreFuture<'_, Vec<Student>>;

    /// Removes one student. Returns whether a document was removed.
    fn delete(&self, id: StudentId) -> StoreFuture<'_, bool>;

    /// Replaces the whole collection.
    fn replace_all(&self, students: Vec<Student>) -> StoreFuture<'_, ()>;
}

/// Persistence of the class dropdown options.
pub trait SettingsStore: Send + Sync {
    /// The configured options, empty when none were ever saved.
    fn dropdown_options(&self) -> StoreFuture<'_, Vec<String>>;

    /// Overwrites the option list.
    fn set_dropdown_options(&self, options: Vec<String>) -> StoreFuture<'_, ()>;
}

/// # Memory Store
///
/// Process-local backend. Used when no external store is configured and by
/// the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore {
    students: RwLock<BTreeMap<StudentId, Student>>,
    dropdown_options: RwLock<Vec<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with `students`.
    pub fn with_students(students: impl IntoIterator<Item = Student>) -> Self {
        let students = students.into_iter().map(|s| (s.id, s)).collect();
        Self {
            students: RwLock::new(students),
            dropdown_options: RwLock::default(),
        }
    }
}

impl StudentStore for MemoryStore {
    fn find_by_id(&self, id: StudentId) -> StoreFuture<'_, Option<Student>> {
        async move { Ok(self.students.read().await.get(&id).cloned()) }.boxed()
    }

    fn save<'a>(&'a self, student: &'a Student) -> StoreFuture<'a, ()> {
        async move {
            self.students.write().await.insert(student.id, student.clone());
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> StoreFuture<'_, Vec<Student>> {
        async move { Ok(self.students.read().await.values().cloned().collect()) }.boxed()
    }

    fn delete(&self, id: StudentId) -> StoreFuture<'_, bool> {
        async move { Ok(self.students.write().await.remove(&id).is_some()) }.boxed()
    }

    fn replace_all(&self, students: Vec<Student>) -> StoreFuture<'_, ()> {
        async move {
            let mut guard = self.students.write().await;
            *guard = students.into_iter().map(|s| (s.id, s)).collect();
            Ok(())
        }
        .boxed()
    }
}

impl SettingsStore for MemoryStore {
    fn dropdown_options(&self) -> StoreFuture<'_, Vec<String>> {
        async move { Ok(self.dropdown_options.read().await.clone()) }.boxed()
    }

    fn set_dropdown_options(&self, options: Vec<String>) -> StoreFuture<'_, ()> {
        async move {
            *self.dropdown_options.write().await = options;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_find_round_trips_the_document() {
        let store = MemoryStore::new();
        let mut student = Student::new(1, "Ada");
        student.mark_attended("2024-01-01");
        store.save(&student).await.unwrap();

        let found = store.find_by_id(1).await.unwrap();
        assert_eq!(found, Some(student));
        assert_eq!(store.find_by_id(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id_and_replace_all_swaps_collection() {
        let store = MemoryStore::with_students([Student::new(3, "C"), Student::new(1, "A")]);
        let ids: Vec<_> = store.list().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);

        store.replace_all(vec![Student::new(9, "Z")]).await.unwrap();
        let ids: Vec<_> = store.list().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![9]);
        assert!(store.delete(9).await.unwrap());
        assert!(!store.delete(9).await.unwrap());
    }

    #[tokio::test]
    async fn dropdown_options_default_to_empty() {
        let store = MemoryStore::new();
        assert!(store.dropdown_options().await.unwrap().is_empty());
        store.set_dropdown_options(vec!["Yoga".into()]).await.unwrap();
        assert_eq!(store.dropdown_options().await.unwrap(), vec!["Yoga".to_string()]);
    }
}
