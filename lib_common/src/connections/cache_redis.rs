//! # Redis Store Implementation
//!
//! Keeps student documents as JSON strings in one Redis hash, keyed by the
//! student id, and the dropdown options as a JSON array under a plain key.
//! A single multiplexed `ConnectionManager` is shared by every request and
//! reconnects on its own after a dropped connection.

use std::collections::HashMap;

use futures_util::future::FutureExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tracing::info;

use crate::core::error::StoreError;
use crate::core::model::{Student, StudentId};
use crate::core::store::{SettingsStore, StoreFuture, StudentStore};

/// Hash holding one field per student.
pub const STUDENTS_KEY: &str = "attendance:students";
/// Key holding the dropdown option list.
pub const DROPDOWN_OPTIONS_KEY: &str = "attendance:settings:dropdown_options";

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// A store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens a managed connection to `url` (e.g. "redis://127.0.0.1/").
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(url, "connected to redis store");
        Ok(Self { conn })
    }
}

fn decode(field: &str, raw: &str) -> Result<Student, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Malformed {
        id: field.to_string(),
        source,
    })
}

impl StudentStore for RedisStore {
    fn find_by_id(&self, id: StudentId) -> StoreFuture<'_, Option<Student>> {
        let mut conn = self.conn.clone();
        async move {
            let field = id.to_string();
            let raw: Option<String> = conn.hget(STUDENTS_KEY, &field).await?;
            raw.map(|raw| decode(&field, &raw)).transpose()
        }
        .boxed()
    }

    fn save<'a>(&'a self, student: &'a Student) -> StoreFuture<'a, ()> {
        let mut conn = self.conn.clone();
        async move {
            let raw = serde_json::to_string(student)?;
            let _: () = conn.hset(STUDENTS_KEY, student.id.to_string(), raw).await?;
            Ok(())
        }
        .boxed()
    }

    fn list(&self) -> StoreFuture<'_, Vec<Student>> {
        let mut conn = self.conn.clone();
        async move {
            let raw: HashMap<String, String> = conn.hgetall(STUDENTS_KEY).await?;
            let mut students = raw
                .iter()
                .map(|(field, doc)| decode(field, doc))
                .collect::<Result<Vec<_>, _>>()?;
            students.sort_by_key(|s| s.id);
            Ok(students)
        }
        .boxed()
    }

    fn delete(&self, id: StudentId) -> StoreFuture<'_, bool> {
        let mut conn = self.conn.clone();
        async move {
            let removed: usize = conn.hdel(STUDENTS_KEY, id.to_string()).await?;
            Ok(removed > 0)
        }
        .boxed()
    }

    fn replace_all(&self, students: Vec<Student>) -> StoreFuture<'_, ()> {
        let mut conn = self.conn.clone();
        async move {
            let items = students
                .iter()
                .map(|s| Ok((s.id.to_string(), serde_json::to_string(s)?)))
                .collect::<Result<Vec<(String, String)>, StoreError>>()?;

            let mut pipe = redis::pipe();
            pipe.atomic().del(STUDENTS_KEY).ignore();
            if !items.is_empty() {
                pipe.hset_multiple(STUDENTS_KEY, &items).ignore();
            }
            pipe.query_async::<()>(&mut conn).await?;
            Ok(())
        }
        .boxed()
    }
}

impl SettingsStore for RedisStore {
    fn dropdown_options(&self) -> StoreFuture<'_, Vec<String>> {
        let mut conn = self.conn.clone();
        async move {
            let raw: Option<String> = conn.get(DROPDOWN_OPTIONS_KEY).await?;
            match raw {
                Some(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
                    id: DROPDOWN_OPTIONS_KEY.to_string(),
                    source,
                }),
                None => Ok(Vec::new()),
            }
        }
        .boxed()
    }

    fn set_dropdown_options(&self, options: Vec<String>) -> StoreFuture<'_, ()> {
        let mut conn = self.conn.clone();
        async move {
            let raw = serde_json::to_string(&options)?;
            let _: () = conn.set(DROPDOWN_OPTIONS_KEY, raw).await?;
            Ok(())
        }
        .boxed()
    }
}
