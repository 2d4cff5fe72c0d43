//! Conversions from external infrastructure errors into domain errors.

use jobtrail_domain::CalendarError;
use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CalendarError);

impl From<InfraError> for CalendarError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CalendarError> for InfraError {
    fn from(value: CalendarError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCalendarError {
    fn into_calendar(self) -> CalendarError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CalendarError */
/* -------------------------------------------------------------------------- */

impl IntoCalendarError for SqlError {
    fn into_calendar(self) -> CalendarError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CalendarError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CalendarError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        CalendarError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CalendarError::Database("foreign key constraint violation".into())
                    }
                    _ => CalendarError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CalendarError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CalendarError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CalendarError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => CalendarError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidParameterName(parameter_name) => {
                CalendarError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => {
                CalendarError::Database(format!("invalid database path: {}", path.to_string_lossy()))
            }
            RE::InvalidQuery => CalendarError::Database("invalid SQL query".into()),
            other => CalendarError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_calendar())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CalendarError */
/* -------------------------------------------------------------------------- */

impl IntoCalendarError for PoolError {
    fn into_calendar(self) -> CalendarError {
        CalendarError::Database(format!("connection pool error: {self}"))
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(value.into_calendar())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CalendarError */
/* -------------------------------------------------------------------------- */

impl IntoCalendarError for HttpError {
    fn into_calendar(self) -> CalendarError {
        if self.is_timeout() {
            return CalendarError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CalendarError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CalendarError::Auth(message),
                404 => CalendarError::NotFound(message),
                429 => CalendarError::Network(message),
                400..=499 => CalendarError::InvalidInput(message),
                _ => CalendarError::Network(message),
            };
        }

        CalendarError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_calendar())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → CalendarError */
/* -------------------------------------------------------------------------- */

impl IntoCalendarError for serde_json::Error {
    fn into_calendar(self) -> CalendarError {
        CalendarError::Database(format!("failed to encode or decode stored JSON: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_calendar())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;
    use tokio::runtime::Runtime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CalendarError = InfraError::from(err).into();
        match mapped {
            CalendarError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn sqlite_no_rows_maps_to_not_found() {
        let mapped: CalendarError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, CalendarError::NotFound(_)));
    }

    #[test]
    fn http_status_401_maps_to_auth_error() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: CalendarError = InfraError::from(error).into();
            match mapped {
                CalendarError::Auth(msg) => assert!(msg.contains("401")),
                other => panic!("expected auth error, got {:?}", other),
            }
        });
    }

    #[test]
    fn http_status_503_maps_to_network_error() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: CalendarError = InfraError::from(error).into();
            assert!(matches!(mapped, CalendarError::Network(_)));
        });
    }
}
