use sqlx::Error;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// True if the same statement may well succeed when it is retried later, e.g. when SQLite reports BUSY or LOCKED.
pub fn is_transient(e: &Error) -> bool {
    match e {
        Error::PoolTimedOut | Error::Io(_) => true,
        // SQLite reports extended codes. The primary code is the low byte.
        Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}
