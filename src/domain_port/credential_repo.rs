use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CredentialsRecord {
    pub user_id: UserId,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Insert a row. Fails with `AuthError::EmailTaken` on a duplicate email.
    async fn create(&self, record: &CredentialsRecord) -> Result<(), AuthError>;

    /// Fetch credentials by normalized email (for login).
    async fn get_by_email(&self, email: &Email) -> Result<Option<CredentialsRecord>, AuthError>;

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<CredentialsRecord>, AuthError>;

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError>;
}
