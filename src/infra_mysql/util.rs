use sqlx::mysql::MySqlDatabaseError;

const ER_DUP_ENTRY: u16 = 1062;

/// True when an insert hit a unique index, e.g. `uq_auth_credential_email`.
pub fn is_dup_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|mysql_err| mysql_err.number() == ER_DUP_ENTRY),
        _ => false,
    }
}
