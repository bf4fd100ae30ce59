//! Conversions from external infrastructure errors into domain errors.

use dosetrack_domain::DoseTrackError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and
/// can be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DoseTrackError);

impl From<InfraError> for DoseTrackError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DoseTrackError> for InfraError {
    fn from(value: DoseTrackError) -> Self {
        InfraError(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

/* ---------------------------------------------------------------- */
/* rusqlite::Error → DoseTrackError                                  */
/* ---------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let domain = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => DoseTrackError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        DoseTrackError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => {
                        DoseTrackError::Database(format!("constraint violation: {message}"))
                    }
                    _ => DoseTrackError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                DoseTrackError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                DoseTrackError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                DoseTrackError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidQuery => DoseTrackError::Database("invalid SQL query".into()),
            other => DoseTrackError::Database(other.to_string()),
        };
        InfraError(domain)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(DoseTrackError::Database(format!("connection pool error: {value}")))
    }
}

/* ---------------------------------------------------------------- */
/* reqwest::Error → DoseTrackError                                   */
/* ---------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let domain = if value.is_timeout() {
            DoseTrackError::Network("request timed out".into())
        } else if value.is_connect() {
            DoseTrackError::Network(format!("connection failed: {value}"))
        } else if value.is_builder() {
            DoseTrackError::Internal(format!("failed to build request: {value}"))
        } else {
            DoseTrackError::Network(value.to_string())
        };
        InfraError(domain)
    }
}

/* ---------------------------------------------------------------- */
/* serde_json::Error → DoseTrackError                                */
/* ---------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(DoseTrackError::Internal(format!("serialization error: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: InfraError = SqlError::QueryReturnedNoRows.into();
        assert!(matches!(err.0, DoseTrackError::NotFound(_)));
    }

    #[test]
    fn json_errors_map_to_internal() {
        let json_err =
            serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: InfraError = json_err.into();
        assert!(matches!(err.0, DoseTrackError::Internal(_)));
    }
}
