//! The JSON web surface a presentation layer drives. Every route is a thin
//! wrapper over one `Orchestrator` operation

use crate::Error;
use actix_web::error::BlockingError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use std::collections::HashMap;

pub mod protocol;
pub mod routes;

#[derive(Debug)]
pub struct WebError {
    err: Error,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let err = HashMap::from([("errors", vec![self.to_string()])]);

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(err)
    }

    fn status_code(&self) -> StatusCode {
        match self.err {
            Error::Decode(_) | Error::InvalidEpsilon(_) => StatusCode::BAD_REQUEST,
            Error::Busy | Error::NoImage => StatusCode::CONFLICT,
            Error::Missing(_) => StatusCode::NOT_FOUND,
            Error::Transport(_) | Error::Server { .. } => StatusCode::BAD_GATEWAY,
            Error::Encode(_) | Error::Config(_) | Error::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Error> for WebError {
    fn from(err: Error) -> WebError {
        WebError { err }
    }
}

impl From<BlockingError> for WebError {
    fn from(err: BlockingError) -> WebError {
        Error::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::error::ResponseError;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_status_by_error_kind() {
        let cases = [
            (WebError::from(Error::Decode("bad".into())), StatusCode::BAD_REQUEST),
            (Error::InvalidEpsilon(f64::NAN).into(), StatusCode::BAD_REQUEST),
            (Error::Busy.into(), StatusCode::CONFLICT),
            (Error::NoImage.into(), StatusCode::CONFLICT),
            (Error::Missing("perturbed").into(), StatusCode::NOT_FOUND),
            (
                Error::Server { status: 503, message: "down".into() }.into(),
                StatusCode::BAD_GATEWAY,
            ),
            (BlockingError.into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }

        let res = WebError::from(Error::Busy).error_response();
        let body: Value = serde_json::from_slice(&to_bytes(res.into_body()).await.unwrap()).unwrap();
        assert_eq!(body, json!({"errors": ["a request is already in flight"]}));
    }
}
