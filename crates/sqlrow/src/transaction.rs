//! Transaction helper macro.
//!
//! sqlrow only passes begin/commit/rollback through to the [`Connection`];
//! isolation levels and nesting are the connection's business.
//!
//! # Example
//!
//! ```ignore
//! use sqlrow::{Delete, OrmResult};
//!
//! # async fn demo(conn: &impl sqlrow::Connection, catalog: &sqlrow::SchemaCatalog) -> OrmResult<()> {
//! sqlrow::transaction!(conn, {
//!     Delete::new(catalog, "sessions", &sqlrow::record! { "user_id" => 7 })?
//!         .run(conn)
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```
//!
//! [`Connection`]: crate::Connection

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via [`Connection::begin`](crate::Connection::begin).
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `sqlrow::OrmResult<T>`; the macro evaluates to
/// the same type. Failing to begin or commit propagates with `?`.
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $body:block) => {{
        let __sqlrow_conn = $conn;
        $crate::Connection::begin(__sqlrow_conn)
            .await
            .map_err($crate::OrmError::from)?;

        let __sqlrow_tx_body_result: $crate::OrmResult<_> = async { $body }.await;
        match __sqlrow_tx_body_result {
            Ok(value) => {
                $crate::Connection::commit(__sqlrow_conn)
                    .await
                    .map_err($crate::OrmError::from)?;
                Ok(value)
            }
            Err(error) => match $crate::Connection::rollback(__sqlrow_conn).await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}
