//! Redis-backed session store.
//!
//! # Key Patterns
//!
//! - `session:{id}` - Session HASH (`data` JSON, `version`, `status`)
//! - `session:{id}:participants` - Membership records (HASH, user -> JSON)
//! - `pair:{lo}:{hi}:active` - Session ID of the non-terminal call for a user pair
//! - `room:{name}:active` - Session ID of the non-terminal room holding a name
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently, so each operation clones it instead of locking.

use crate::errors::ScError;
use crate::models::{pair_key, room_key, CallSession, Participant, SessionStatus};
use crate::observability::metrics;
use crate::store::lua_scripts;
use crate::store::{SessionStore, SessionUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

const SESSION_PREFIX: &str = "session:";

fn session_key(id: SessionId) -> String {
    format!("{SESSION_PREFIX}{id}")
}

fn participants_key(id: SessionId) -> String {
    format!("{SESSION_PREFIX}{id}:participants")
}

fn pair_index_key(pair: &str) -> String {
    format!("pair:{pair}:active")
}

fn room_index_key(room: &str) -> String {
    format!("room:{room}:active")
}

/// Index key claimed by a session, if any.
fn index_key(session: &CallSession) -> Option<String> {
    session
        .pair_key()
        .map(|pair| pair_index_key(&pair))
        .or_else(|| session.room_key().map(|room| room_index_key(&room)))
}

fn store_error(operation: &str, e: &redis::RedisError) -> ScError {
    warn!(
        target: "sc.store.redis",
        error = %e,
        operation = operation,
        "Redis operation failed"
    );
    ScError::Store(format!("{operation} failed: {e}"))
}

fn decode<T: serde::de::DeserializeOwned>(what: &str, json: &str) -> Result<T, ScError> {
    serde_json::from_str(json).map_err(|e| {
        error!(
            target: "sc.store.redis",
            error = %e,
            "Failed to deserialize {what}"
        );
        ScError::Store(format!("Failed to deserialize {what}: {e}"))
    })
}

fn encode<T: serde::Serialize>(what: &str, value: &T) -> Result<String, ScError> {
    serde_json::to_string(value)
        .map_err(|e| ScError::Internal(format!("Failed to serialize {what}: {e}")))
}

/// `SessionStore` backed by Redis.
///
/// Cheaply cloneable; clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: MultiplexedConnection,
    create_script: Script,
    update_script: Script,
    admit_script: Script,
}

impl RedisSessionStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `ScError::Store` if the URL is invalid or the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, ScError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Note: Do NOT log redis_url as it may contain credentials
            error!(
                target: "sc.store.redis",
                error = %e,
                "Failed to open Redis client"
            );
            ScError::Store(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(
                    target: "sc.store.redis",
                    error = %e,
                    "Failed to connect to Redis"
                );
                ScError::Store(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self {
            connection,
            create_script: Script::new(lua_scripts::CREATE_SESSION),
            update_script: Script::new(lua_scripts::CONDITIONAL_UPDATE),
            admit_script: Script::new(lua_scripts::ADD_PARTICIPANT),
        })
    }

    async fn load(&self, id: SessionId) -> Result<Option<CallSession>, ScError> {
        let mut conn = self.connection.clone();
        let data: Option<String> = conn
            .hget(session_key(id), "data")
            .await
            .map_err(|e| store_error("get", &e))?;

        data.map(|json| decode("session", &json)).transpose()
    }

    /// Resolve an index key to its session, ignoring stale terminal holders.
    async fn resolve_index(&self, key: &str) -> Result<Option<CallSession>, ScError> {
        let mut conn = self.connection.clone();
        let holder: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| store_error("find_active", &e))?;

        let Some(holder) = holder else {
            return Ok(None);
        };
        let Ok(id) = holder.parse::<SessionId>() else {
            warn!(target: "sc.store.redis", "Index key holds a malformed session id");
            return Ok(None);
        };

        Ok(self.load(id).await?.filter(|session| !session.is_terminal()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn create(&self, session: &CallSession) -> Result<SessionId, ScError> {
        let start = Instant::now();
        let json = encode("session", session)?;
        let mut conn = self.connection.clone();

        let mut invocation = self.create_script.prepare_invoke();
        invocation.key(session_key(session.id));
        if let Some(index) = index_key(session) {
            invocation.key(index);
        }
        invocation
            .arg(session.id.to_string())
            .arg(json)
            .arg(session.version)
            .arg(session.status.as_str())
            .arg(SESSION_PREFIX);

        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("create", &e))?;

        metrics::record_store_latency("create", start.elapsed());

        match result {
            1 => {
                debug!(target: "sc.store.redis", session_id = %session.id, "Created session");
                Ok(session.id)
            }
            0 if session.is_room() => Err(ScError::RoomNameTaken(
                session.room_key().unwrap_or_default(),
            )),
            0 => Err(ScError::AlreadyInCall),
            _ => Err(ScError::Internal(format!(
                "session {} already exists",
                session.id
            ))),
        }
    }

    async fn get(&self, id: SessionId) -> Result<CallSession, ScError> {
        let start = Instant::now();
        let session = self.load(id).await?;
        metrics::record_store_latency("get", start.elapsed());
        session.ok_or_else(|| ScError::NotFound(id.to_string()))
    }

    async fn find_active_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<CallSession>, ScError> {
        let start = Instant::now();
        let found = self.resolve_index(&pair_index_key(&pair_key(a, b))).await;
        metrics::record_store_latency("find_active_between", start.elapsed());
        found
    }

    async fn find_active_room(&self, room_name: &str) -> Result<Option<CallSession>, ScError> {
        let start = Instant::now();
        let found = self.resolve_index(&room_index_key(&room_key(room_name))).await;
        metrics::record_store_latency("find_active_room", start.elapsed());
        found
    }

    #[instrument(skip_all, fields(session_id = %id, expected_version = expected_version))]
    async fn update(
        &self,
        id: SessionId,
        expected_version: u64,
        expected_status: SessionStatus,
        update: SessionUpdate,
    ) -> Result<CallSession, ScError> {
        let start = Instant::now();
        let current = self
            .load(id)
            .await?
            .ok_or_else(|| ScError::NotFound(id.to_string()))?;

        if current.version != expected_version || current.status != expected_status {
            metrics::record_store_conflict("update");
            return Err(ScError::Conflict(format!(
                "expected version {expected_version} ({expected_status}), found version {} ({})",
                current.version, current.status
            )));
        }

        let next = update.apply_to(&current);
        let json = encode("session", &next)?;
        let mut conn = self.connection.clone();

        let mut invocation = self.update_script.prepare_invoke();
        invocation.key(session_key(id));
        if let Some(index) = index_key(&next) {
            invocation.key(index);
        }
        invocation
            .arg(expected_version)
            .arg(expected_status.as_str())
            .arg(json)
            .arg(next.version)
            .arg(next.status.as_str())
            .arg(if next.is_terminal() { "1" } else { "0" })
            .arg(id.to_string());

        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("update", &e))?;

        metrics::record_store_latency("update", start.elapsed());

        match result {
            1 => {
                debug!(
                    target: "sc.store.redis",
                    session_id = %id,
                    version = next.version,
                    status = %next.status,
                    "Updated session"
                );
                Ok(next)
            }
            0 => {
                metrics::record_store_conflict("update");
                warn!(
                    target: "sc.store.redis",
                    session_id = %id,
                    expected_version = expected_version,
                    "Conditional update lost a race"
                );
                Err(ScError::Conflict(format!(
                    "session {id} changed after version {expected_version}"
                )))
            }
            _ => Err(ScError::NotFound(id.to_string())),
        }
    }

    async fn add_participant(
        &self,
        participant: &Participant,
        capacity: u32,
    ) -> Result<(), ScError> {
        let start = Instant::now();
        let json = encode("participant", participant)?;
        let mut conn = self.connection.clone();
        let id = participant.session_id;

        let result: i32 = self
            .admit_script
            .key(participants_key(id))
            .key(session_key(id))
            .arg(participant.user_id.as_str())
            .arg(json)
            .arg(capacity)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("add_participant", &e))?;

        metrics::record_store_latency("add_participant", start.elapsed());

        match result {
            1 => Ok(()),
            0 => {
                debug!(
                    target: "sc.store.redis",
                    session_id = %id,
                    user_id = %participant.user_id,
                    capacity = capacity,
                    "Admission refused, room full"
                );
                Err(ScError::RoomFull { capacity })
            }
            -2 => Err(ScError::Conflict(format!("session {id} is terminal"))),
            _ => Err(ScError::NotFound(id.to_string())),
        }
    }

    async fn close_participant(
        &self,
        id: SessionId,
        user_id: &UserId,
        left_at: DateTime<Utc>,
    ) -> Result<(), ScError> {
        let start = Instant::now();
        let mut conn = self.connection.clone();
        let key = participants_key(id);

        let existing: Option<String> = conn
            .hget(&key, user_id.as_str())
            .await
            .map_err(|e| store_error("close_participant", &e))?;

        let Some(json) = existing else {
            return Ok(());
        };
        let mut record: Participant = decode("participant", &json)?;
        if !record.is_open() {
            return Ok(());
        }
        record.left_at = Some(left_at);

        let _: () = conn
            .hset(&key, user_id.as_str(), encode("participant", &record)?)
            .await
            .map_err(|e| store_error("close_participant", &e))?;

        metrics::record_store_latency("close_participant", start.elapsed());
        Ok(())
    }

    async fn participants(&self, id: SessionId) -> Result<Vec<Participant>, ScError> {
        let start = Instant::now();
        let mut conn = self.connection.clone();

        let raw: HashMap<String, String> = conn
            .hgetall(participants_key(id))
            .await
            .map_err(|e| store_error("participants", &e))?;

        let mut records = raw
            .values()
            .map(|json| decode::<Participant>("participant", json))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));

        metrics::record_store_latency("participants", start.elapsed());
        Ok(records)
    }

    async fn ping(&self) -> Result<(), ScError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("ping", &e))?;
        Ok(())
    }
}
