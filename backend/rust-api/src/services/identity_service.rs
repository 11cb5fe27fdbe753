use std::sync::Arc;

use crate::{
    error::AppError,
    models::user::{Principal, Role, User},
    services::{
        access_policy::{authorize, Action},
        AppState,
    },
    store::{LearningStore, StoreError},
};

/// Maps an identity-provider principal onto a stored user.
pub struct IdentityService {
    store: Arc<dyn LearningStore>,
    super_admin_email: Option<String>,
}

impl IdentityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            super_admin_email: state.config.auth.super_admin_email.clone(),
        }
    }

    /// Finds the user for `principal.subject`, provisioning one on first sight.
    ///
    /// The configured super-admin email only matters here; roles of existing
    /// users are never re-derived from email.
    pub async fn resolve(&self, principal: Principal) -> Result<User, AppError> {
        if let Some(user) = self.store.find_user_by_subject(&principal.subject).await? {
            return Ok(user);
        }

        let email = principal.email.trim().to_lowercase();
        let role = self.initial_role(&email);
        let user = User::new(&principal.subject, email, role);

        match self.store.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(
                    "Provisioned user {} with role {}",
                    user.id,
                    role.as_str()
                );
                Ok(user)
            }
            // Lost a race with a concurrent first request for the same subject
            Err(StoreError::Conflict(_)) => self
                .store
                .find_user_by_subject(&principal.subject)
                .await?
                .ok_or_else(|| AppError::Internal("User vanished after conflict".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Lets a user pick learner or instructor. Admin can never be chosen;
    /// anything other than the two selectable roles falls back to learner,
    /// and the seeded super-admin always stays admin.
    pub async fn register_profile(&self, user: &User, requested: &str) -> Result<Role, AppError> {
        authorize(user, Action::RegisterProfile)?;

        let role = if self.is_seed(&user.email) {
            Role::Admin
        } else {
            match requested.trim().to_lowercase().as_str() {
                "instructor" => Role::Instructor,
                _ => Role::Learner,
            }
        };

        if role != user.role {
            self.store.update_user_role(&user.id, role).await?;
        }

        tracing::info!(
            "User {} registered profile as {} (requested {:?})",
            user.id,
            role.as_str(),
            requested
        );
        Ok(role)
    }

    fn is_seed(&self, email: &str) -> bool {
        matches!(&self.super_admin_email, Some(seed) if !email.is_empty() && seed == email)
    }

    fn initial_role(&self, email: &str) -> Role {
        if self.is_seed(email) {
            Role::Admin
        } else {
            Role::Learner
        }
    }
}
