//! Small helpers for classifying sqlx errors at retry boundaries.

const UNIQUE_VIOLATION: &str = "23505";

/// True when the error is a Postgres unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// Same check, reaching through an `anyhow` wrapper.
pub fn is_wrapped_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .is_some_and(is_unique_violation)
}

/// True when the error names the given constraint. Used to tell a slug
/// collision apart from any other integrity violation.
pub fn violates_constraint(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}
