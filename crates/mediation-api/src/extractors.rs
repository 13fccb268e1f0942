//! # Custom Extractors
//!
//! Helpers that turn JSON body and query string rejections into
//! [`AppError`]. Field-level validation happens afterwards, when handlers
//! build the validated domain types from the request DTO.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// This is the primary extraction helper. Handlers should use:
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
///     // use req...
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a query string, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn extract_json_passes_through_value() {
        let named = extract_json(Ok(Json(Named {
            name: "anna".into(),
        })))
        .unwrap();
        assert_eq!(named.name, "anna");
    }

    #[test]
    fn malformed_json_becomes_bad_request() {
        let rejection = axum::extract::rejection::JsonRejection::from(
            axum::extract::rejection::MissingJsonContentType::default(),
        );
        let err = extract_json::<Named>(Err(rejection)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn extract_query_passes_through_value() {
        let named = extract_query(Ok(Query(Named {
            name: "boris".into(),
        })))
        .unwrap();
        assert_eq!(named.name, "boris");
    }
}
