//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every resource collection lives in a [`Store`], an in-memory map behind
//! a `parking_lot::RwLock`. Reads never touch the database. When a
//! Postgres pool is configured, handlers write each mutation through to it
//! after the in-memory change, and [`AppState::hydrate_from_db`] reloads
//! the stores on startup.

use std::collections::HashMap;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use mediation_disputes::{Comment, Dispute, FileAttachment, User};

use crate::auth::TokenStore;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points. `parking_lot::RwLock`
/// is non-poisonable: a panicking writer does not permanently corrupt the store.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Insert a record after `check` has accepted every existing record,
    /// all under one write lock. Used for uniqueness constraints.
    pub fn insert_unique<E>(
        &self,
        id: Uuid,
        value: T,
        check: impl Fn(&T) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut guard = self.data.write();
        for existing in guard.values() {
            check(existing)?;
        }
        guard.insert(id, value);
        Ok(())
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Run `f` on a record while holding the read lock. Writers to this
    /// store wait until `f` returns, so checks made in `f` still hold for
    /// any dependent record `f` inserts elsewhere.
    ///
    /// `f` must not touch this store again.
    pub fn with<R>(&self, id: &Uuid, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.data.read().get(id).map(f)
    }

    /// List the records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Whether any record matches `pred`.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(pred)
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure receives a `&mut T` and may inspect the current state,
    /// validate preconditions, mutate the record, and return `Ok(R)` or
    /// `Err(E)`. The entire operation runs under a single write lock,
    /// eliminating TOCTOU races between read and update.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// [`Store::try_update`] preceded by `check` on every other record, all
    /// under one write lock. Used for uniqueness constraints on updates.
    pub fn try_update_unique<R, E>(
        &self,
        id: &Uuid,
        check: impl Fn(&T) -> Result<(), E>,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        let mut guard = self.data.write();
        if !guard.contains_key(id) {
            return None;
        }
        if let Err(e) = guard
            .iter()
            .filter(|(key, _)| *key != id)
            .try_for_each(|(_, existing)| check(existing))
        {
            return Some(Err(e));
        }
        guard.get_mut(id).map(f)
    }

    /// Atomically check-and-remove a record.
    ///
    /// `f` sees the record under the write lock; when it returns `Ok`, the
    /// record is removed before the lock is released. Returns `None` if the
    /// record doesn't exist.
    pub fn try_remove<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&T) -> Result<R, E>,
    ) -> Option<Result<(T, R), E>> {
        let mut guard = self.data.write();
        let record = guard.remove(id)?;
        match f(&record) {
            Ok(r) => Some(Ok((record, r))),
            Err(e) => {
                guard.insert(*id, record);
                Some(Err(e))
            }
        }
    }

    /// Remove every record matching `pred`, returning the removed records.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut guard = self.data.write();
        let ids: Vec<Uuid> = guard
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(k, _)| *k)
            .collect();
        ids.iter().filter_map(|id| guard.remove(id)).collect()
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Configuration ------------------------------------------------------------

/// Default upload limit: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Credentials for the admin account seeded on first start.
///
/// Custom `Debug` redacts the password.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

/// Configuration errors raised while reading the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: \"{value}\"")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Application configuration.
///
/// Custom `Debug` redacts the database URL and admin password to prevent
/// credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Postgres connection string. `None` runs in-memory only.
    pub database_url: Option<String>,
    /// Whether `POST /auth/register/` is open.
    pub registration_enabled: bool,
    /// Whether the Prometheus recorder is installed and `/metrics` served.
    pub metrics_enabled: bool,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Requests per minute per caller.
    pub rate_limit_per_minute: u64,
    /// Admin account to seed when none exists.
    pub admin_seed: Option<AdminSeed>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("registration_enabled", &self.registration_enabled)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("admin_seed", &self.admin_seed)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            registration_enabled: false,
            metrics_enabled: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            rate_limit_per_minute: 1000,
            admin_seed: None,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let admin_seed = match (var("MEDIATION_ADMIN_EMAIL"), var("MEDIATION_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                phone_number: var("MEDIATION_ADMIN_PHONE"),
            }),
            _ => None,
        };

        let log_format = match var("MEDIATION_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "MEDIATION_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            port: parse_var(&var, "PORT", defaults.port)?,
            database_url: var("DATABASE_URL"),
            registration_enabled: parse_bool(&var, "MEDIATION_REGISTRATION_ENABLED", false)?,
            metrics_enabled: parse_bool(&var, "MEDIATION_METRICS_ENABLED", true)?,
            max_upload_bytes: parse_var(
                &var,
                "MEDIATION_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
            rate_limit_per_minute: parse_var(
                &var,
                "MEDIATION_RATE_LIMIT",
                defaults.rate_limit_per_minute,
            )?,
            admin_seed,
            log_format,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Store<User>,
    pub tokens: TokenStore,
    pub disputes: Store<Dispute>,
    pub comments: Store<Comment>,
    pub files: Store<FileAttachment>,

    // -- Database persistence (optional) --
    /// PostgreSQL connection pool for durable state persistence.
    /// When `None`, the API operates in in-memory-only mode.
    pub db_pool: Option<PgPool>,

    /// Prometheus render handle, present when the recorder is installed.
    pub metrics: Option<PrometheusHandle>,

    // -- Configuration --
    pub config: AppConfig,
}

impl AppState {
    /// Create an in-memory application state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None, None)
    }

    /// Create an application state with the given configuration, optional
    /// database pool and optional metrics handle.
    pub fn with_config(
        config: AppConfig,
        db_pool: Option<PgPool>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            users: Store::new(),
            tokens: TokenStore::new(),
            disputes: Store::new(),
            comments: Store::new(),
            files: Store::new(),
            db_pool,
            metrics,
            config,
        }
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let users = crate::db::users::load_all(pool).await?;
        let user_count = users.len();
        for user in users {
            self.users.insert(*user.id.as_uuid(), user);
        }

        let tokens = crate::db::tokens::load_all(pool).await?;
        let token_count = tokens.len();
        for (digest, user_id) in tokens {
            self.tokens.insert(digest, user_id);
        }

        let disputes = crate::db::disputes::load_all(pool).await?;
        let dispute_count = disputes.len();
        for dispute in disputes {
            self.disputes.insert(*dispute.id.as_uuid(), dispute);
        }

        let comments = crate::db::comments::load_all(pool).await?;
        let comment_count = comments.len();
        for comment in comments {
            self.comments.insert(*comment.id.as_uuid(), comment);
        }

        let files = crate::db::attachments::load_all(pool).await?;
        let file_count = files.len();
        for file in files {
            self.files.insert(*file.id.as_uuid(), file);
        }

        tracing::info!(
            users = user_count,
            tokens = token_count,
            disputes = dispute_count,
            comments = comment_count,
            files = file_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Store tests ----------------------------------------------------------

    #[test]
    fn store_insert_get_remove() {
        let store: Store<String> = Store::new();
        let id = Uuid::new_v4();
        assert!(store.insert(id, "a".to_string()).is_none());
        assert_eq!(store.get(&id).as_deref(), Some("a"));
        assert!(store.contains(&id));
        assert_eq!(store.len(), 1);
        let removed: Option<Result<(String, ()), ()>> = store.try_remove(&id, |_| Ok(()));
        assert_eq!(removed, Some(Ok(("a".to_string(), ()))));
        assert!(store.is_empty());
    }

    #[test]
    fn store_try_update_is_all_or_nothing() {
        let store: Store<u32> = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, 1);

        let failed: Option<Result<(), &str>> = store.try_update(&id, |v| {
            if *v == 1 {
                return Err("rejected");
            }
            *v = 99;
            Ok(())
        });
        assert_eq!(failed, Some(Err("rejected")));
        assert_eq!(store.get(&id), Some(1));

        let missing: Option<Result<(), ()>> = store.try_update(&Uuid::new_v4(), |_| Ok(()));
        assert!(missing.is_none());
    }

    #[test]
    fn store_insert_unique_rejects_conflicts() {
        let store: Store<String> = Store::new();
        store.insert(Uuid::new_v4(), "alice".to_string());
        let conflict = store.insert_unique(Uuid::new_v4(), "alice".to_string(), |existing| {
            if existing == "alice" {
                Err("taken")
            } else {
                Ok(())
            }
        });
        assert_eq!(conflict, Err("taken"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_try_update_unique_checks_other_records() {
        let store: Store<String> = Store::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert(alice, "alice".to_string());
        store.insert(bob, "bob".to_string());
        let distinct = |wanted: &'static str| {
            move |other: &String| if other == wanted { Err("taken") } else { Ok(()) }
        };

        let taken = store.try_update_unique(&bob, distinct("alice"), |v| {
            *v = "alice".to_string();
            Ok(())
        });
        assert_eq!(taken, Some(Err("taken")));
        assert_eq!(store.get(&bob).as_deref(), Some("bob"));

        // The record being updated does not conflict with itself.
        let kept = store.try_update_unique(&bob, distinct("bob"), |v| {
            *v = "bob".to_string();
            Ok(())
        });
        assert_eq!(kept, Some(Ok(())));
        assert!(store
            .try_update_unique(&Uuid::new_v4(), distinct("x"), |_| Ok(()))
            .is_none());
    }

    #[test]
    fn store_try_remove_keeps_rejected_record() {
        let store: Store<u32> = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, 7);

        let rejected: Option<Result<(u32, ()), &str>> = store.try_remove(&id, |_| Err("locked"));
        assert_eq!(rejected, Some(Err("locked")));
        assert_eq!(store.get(&id), Some(7));

        let removed: Option<Result<(u32, u32), ()>> = store.try_remove(&id, |v| Ok(v * 2));
        assert_eq!(removed, Some(Ok((7, 14))));
        assert!(store.is_empty());
        assert!(store.try_remove::<(), ()>(&id, |_| Ok(())).is_none());
    }

    #[test]
    fn store_with_blocks_writers_until_done() {
        let store: Store<u32> = Store::new();
        let id = Uuid::new_v4();
        store.insert(id, 1);

        let writer_store = store.clone();
        let seen = store.with(&id, |v| {
            let writer = std::thread::spawn(move || {
                writer_store.try_update(&id, |v| {
                    *v = 2;
                    Ok::<(), ()>(())
                })
            });
            std::thread::sleep(std::time::Duration::from_millis(20));
            let during = *v;
            (during, writer)
        });
        let (during, writer) = seen.unwrap();
        assert_eq!(during, 1);
        writer.join().unwrap();
        assert_eq!(store.get(&id), Some(2));
        assert!(store.with(&Uuid::new_v4(), |v| *v).is_none());
    }

    #[test]
    fn store_filter_and_remove_where() {
        let store: Store<u32> = Store::new();
        for n in 0..6 {
            store.insert(Uuid::new_v4(), n);
        }
        assert_eq!(store.filter(|n| n % 2 == 0).len(), 3);
        assert!(store.any(|n| *n == 5));
        assert_eq!(store.remove_where(|n| *n >= 4).len(), 2);
        assert_eq!(store.len(), 4);
    }

    // -- Config tests ---------------------------------------------------------

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn config_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.registration_enabled);
        assert!(config.metrics_enabled);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.admin_seed.is_none());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn config_reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("MEDIATION_REGISTRATION_ENABLED", "true"),
            ("MEDIATION_RATE_LIMIT", "10"),
            ("MEDIATION_LOG_FORMAT", "json"),
            ("MEDIATION_ADMIN_EMAIL", "root@example.com"),
            ("MEDIATION_ADMIN_PASSWORD", "Sup3rSecret"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.registration_enabled);
        assert_eq!(config.rate_limit_per_minute, 10);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.admin_seed.unwrap().email, "root@example.com");
    }

    #[test]
    fn config_rejects_garbage() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err(),
            ConfigError::Invalid {
                name: "PORT",
                value: "eighty".to_string()
            }
        );
        assert!(AppConfig::from_lookup(lookup(&[("MEDIATION_METRICS_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn config_debug_redacts_secrets() {
        let config = AppConfig {
            database_url: Some("postgres://user:hunter2@db/mediation".to_string()),
            admin_seed: Some(AdminSeed {
                email: "root@example.com".to_string(),
                password: "hunter2".to_string(),
                phone_number: None,
            }),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
