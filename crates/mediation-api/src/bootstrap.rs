//! # Startup Bootstrap
//!
//! Seeds the first admin account so a fresh deployment can be managed
//! without direct database access. Runs after hydration, so an admin
//! restored from Postgres suppresses the seed.
//!
//! The seed is read from `MEDIATION_ADMIN_EMAIL`, `MEDIATION_ADMIN_PASSWORD`
//! and optionally `MEDIATION_ADMIN_PHONE`. Without them the server starts
//! with whatever accounts already exist.

use mediation_disputes::{Role, User};

use crate::error::AppError;
use crate::routes::users::{build_user, insert_user, CreateUserRequest};
use crate::state::AppState;

/// Phone number used when the seed does not provide one.
const SEED_PHONE_PLACEHOLDER: &str = "0";

/// Errors during bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The configured admin seed was rejected.
    #[error("admin seed rejected: {0}")]
    InvalidSeed(#[from] AppError),
}

/// Create the configured admin account unless an admin already exists.
///
/// Returns the created user, or `None` when nothing was seeded.
pub async fn seed_admin(state: &AppState) -> Result<Option<User>, BootstrapError> {
    let Some(seed) = state.config.admin_seed.clone() else {
        return Ok(None);
    };

    if state.users.any(|u| u.role == Role::Admin) {
        tracing::info!("admin account present, skipping seed");
        return Ok(None);
    }

    let request = CreateUserRequest {
        email: seed.email,
        first_name: "Admin".to_string(),
        last_name: "Admin".to_string(),
        phone_number: seed
            .phone_number
            .unwrap_or_else(|| SEED_PHONE_PLACEHOLDER.to_string()),
        password: seed.password,
        role: None,
    };
    let user = insert_user(state, build_user(request, Role::Admin).await?).await?;

    tracing::info!(user_id = %user.id, email = %user.email.as_str(), "seeded admin account");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AdminSeed, AppConfig};

    fn state_with_seed(seed: Option<AdminSeed>) -> AppState {
        let config = AppConfig {
            admin_seed: seed,
            ..AppConfig::default()
        };
        AppState::with_config(config, None, None)
    }

    fn seed(password: &str) -> AdminSeed {
        AdminSeed {
            email: "root@example.com".to_string(),
            password: password.to_string(),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn seeds_admin_once() {
        let state = state_with_seed(Some(seed("Adm1n!secret")));

        let user = seed_admin(&state).await.unwrap().expect("admin seeded");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.phone_number.as_str(), SEED_PHONE_PLACEHOLDER);
        assert!(user.password_hash.verify("Adm1n!secret"));

        assert!(seed_admin(&state).await.unwrap().is_none());
        assert_eq!(state.users.len(), 1);
    }

    #[tokio::test]
    async fn no_seed_configured_is_a_no_op() {
        let state = state_with_seed(None);
        assert!(seed_admin(&state).await.unwrap().is_none());
        assert!(state.users.is_empty());
    }

    #[tokio::test]
    async fn weak_seed_password_is_rejected() {
        let state = state_with_seed(Some(seed("short")));
        let err = seed_admin(&state).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::InvalidSeed(AppError::Validation { ref field, .. }) if field == "password"
        ));
    }
}
