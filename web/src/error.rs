use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use identity::error::{Error as IdentityError, ErrorKind, OAuthErrorKind, SessionErrorKind};

use crate::session_store::store_error;

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(IdentityError);

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::UnknownProvider => StatusCode::NOT_FOUND,
            ErrorKind::Session(SessionErrorKind::Store) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Session(_) => StatusCode::UNAUTHORIZED,
            ErrorKind::OAuth(OAuthErrorKind::MalformedResponse) => StatusCode::BAD_GATEWAY,
            ErrorKind::OAuth(_) => StatusCode::UNAUTHORIZED,
            ErrorKind::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

// Body shape: {"code": "<status text>", "message": "<error>"}
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {status}: {}", self.0);
        } else {
            debug!("Request failed with {status}: {}", self.0);
        }

        let body = json!({
            "code": status.canonical_reason().unwrap_or_default(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<IdentityError> for Error {
    fn from(err: IdentityError) -> Self {
        Self(err)
    }
}

impl From<tower_sessions::session::Error> for Error {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self(store_error(err))
    }
}
