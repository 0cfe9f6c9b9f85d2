use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// In-memory credential store. Email uniqueness is enforced through the
/// email index, which is the single point of insertion.
#[derive(Default)]
pub struct MemoryCredentialRepo {
    by_email: DashMap<Email, UserId>,
    by_id: DashMap<UserId, CredentialsRecord>,
}

impl MemoryCredentialRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, user_id: UserId, is_active: bool) {
        if let Some(mut record) = self.by_id.get_mut(&user_id) {
            record.is_active = is_active;
        }
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MemoryCredentialRepo {
    async fn create(&self, record: &CredentialsRecord) -> Result<(), AuthError> {
        match self.by_email.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::EmailTaken),
            Entry::Vacant(slot) => {
                self.by_id.insert(record.user_id, record.clone());
                slot.insert(record.user_id);
                Ok(())
            }
        }
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<CredentialsRecord>, AuthError> {
        let user_id = match self.by_email.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.by_id.get(&user_id).map(|r| r.clone()))
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<CredentialsRecord>, AuthError> {
        Ok(self.by_id.get(&user_id).map(|r| r.clone()))
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut record = self
            .by_id
            .get_mut(&user_id)
            .ok_or(AuthError::InvalidCredentials)?;
        record.password_hash = password_hash.to_string();
        Ok(())
    }
}
