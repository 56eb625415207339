use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    AdminStatus, RepositoryError, Role, ServiceError, ServiceResult, User, UserDraft,
};
use crate::repositories::UserRepository;

/// Service for managing registered users and their roles
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.repository.find_all().await?)
    }

    /// Look up a user by id. Absence is not an error here.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: &str) -> ServiceResult<Option<User>> {
        Ok(self.repository.find_by_id(id).await?)
    }

    #[instrument(skip(self), fields(email = %email))]
    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self.repository.find_by_email(email).await?)
    }

    /// Register a user, filling in the default photo and role. Fails with
    /// `UserAlreadyExists` when the email is already registered.
    #[instrument(skip(self, draft))]
    pub async fn create_user(&self, draft: UserDraft) -> ServiceResult<User> {
        let user = draft
            .into_new_user()
            .map_err(|e| ServiceError::validation("User", e))?;

        if self.repository.find_by_email(&user.email).await?.is_some() {
            crate::info_with_trace!(email = %user.email, "User already registered");
            return Err(ServiceError::UserAlreadyExists { email: user.email });
        }

        // The store rejects the insert when another request claimed the email first
        let email = user.email.clone();
        let created = self
            .repository
            .create(user)
            .await
            .map_err(|e| already_exists_as_user(e, &email))?;
        crate::info_with_trace!(user_id = %created.id, "User created");
        Ok(created)
    }

    #[instrument(skip(self, draft), fields(user_id = %id))]
    pub async fn update_user(&self, id: &str, draft: UserDraft) -> ServiceResult<User> {
        let user = draft
            .into_user(id.to_string())
            .map_err(|e| ServiceError::validation("User", e))?;

        let email = user.email.clone();
        self.repository
            .replace(user)
            .await
            .map_err(|e| already_exists_as_user(e, &email))?
            .ok_or_else(|| ServiceError::UserNotFound { id: id.to_string() })
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &str) -> ServiceResult<User> {
        self.repository
            .delete(id)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound { id: id.to_string() })
    }

    /// Whether the user registered with `email` holds the admin role.
    /// An unregistered email is an error, not `false`.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn is_admin(&self, email: &str) -> ServiceResult<AdminStatus> {
        let user = self
            .repository
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::UnregisteredEmail {
                email: email.to_string(),
            })?;

        Ok(AdminStatus {
            is_admin: user.is_admin(),
        })
    }

    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    pub async fn set_role(&self, id: &str, role: Role) -> ServiceResult<User> {
        let user = self
            .repository
            .set_role(id, role)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound { id: id.to_string() })?;

        crate::info_with_trace!(user_id = %id, role = %role, "Role updated");
        Ok(user)
    }
}

fn already_exists_as_user(error: RepositoryError, email: &str) -> ServiceError {
    match error {
        RepositoryError::AlreadyExists { .. } => ServiceError::UserAlreadyExists {
            email: email.to_string(),
        },
        other => other.into(),
    }
}
