use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::fmt::Display;

pub struct RedisRevocationStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRevocationStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, family: &str, id: impl Display) -> String {
        format!("{}:{}:{}", self.prefix, family, id)
    }

    fn session_key(&self, jti: &TokenId) -> String {
        self.key("refresh", jti)
    }

    fn blacklist_key(&self, jti: &TokenId) -> String {
        self.key("blacklist", jti)
    }

    fn epoch_key(&self, user_id: UserId) -> String {
        self.key("user_epoch", user_id)
    }
}

fn unavailable(e: redis::RedisError) -> RevocationStoreError {
    RevocationStoreError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn register_session(
        &self,
        jti: &TokenId,
        user_id: UserId,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        let key = self.session_key(jti);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, user_id.to_string(), ttl_secs)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn take_session(&self, jti: &TokenId) -> Result<Option<UserId>, RevocationStoreError> {
        let key = self.session_key(jti);
        let mut conn = self.conn.clone();
        // GETDEL is atomic on the server, so concurrent rotations have one winner.
        let val: Option<String> = conn.get_del(&key).await.map_err(unavailable)?;
        val.map(|s| {
            s.parse::<UserId>()
                .map_err(|e| RevocationStoreError::Corrupt(format!("{}: {}", key, e)))
        })
        .transpose()
    }

    async fn drop_session(&self, jti: &TokenId) -> Result<(), RevocationStoreError> {
        let key = self.session_key(jti);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(unavailable)?;
        Ok(())
    }

    async fn blacklist(&self, jti: &TokenId, ttl_secs: u64) -> Result<(), RevocationStoreError> {
        let key = self.blacklist_key(jti);
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(&key, 1, ttl_secs).await.map_err(unavailable)?;
        Ok(())
    }

    async fn set_user_epoch(
        &self,
        user_id: UserId,
        epoch: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Result<(), RevocationStoreError> {
        let key = self.epoch_key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, epoch.timestamp_micros(), ttl_secs)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn lookup(
        &self,
        jti: &TokenId,
        user_id: UserId,
    ) -> Result<RevocationLookup, RevocationStoreError> {
        let keys = [self.blacklist_key(jti), self.epoch_key(user_id)];
        let mut conn = self.conn.clone();
        let (blacklisted, epoch): (Option<String>, Option<i64>) =
            conn.mget(&keys).await.map_err(unavailable)?;

        let user_epoch = epoch
            .map(|micros| {
                DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
                    RevocationStoreError::Corrupt(format!("epoch out of range: {}", micros))
                })
            })
            .transpose()?;

        Ok(RevocationLookup {
            blacklisted: blacklisted.is_some(),
            user_epoch,
        })
    }
}
