use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn bad_request(message: &'static str) -> Self {
        Self::new(
            "infra::http::api",
            StatusCode::BAD_REQUEST,
            codes::BAD_REQUEST,
            message,
            message,
        )
    }

    pub fn not_found(message: &'static str, detail: impl Into<String>) -> Self {
        Self::new(
            "infra::http::api",
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            message,
            detail,
        )
    }

    /// Store failures surface as 500 with the full error chain kept for logging.
    pub fn from_repo(source: &'static str, err: &RepoError) -> Self {
        let code = match err {
            RepoError::Timeout => codes::DB_TIMEOUT,
            _ => codes::INTERNAL,
        };
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status,
            code,
            message: "Internal server error",
            report: ErrorReport::from_error(source, status, err),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_map_to_internal_server_error() {
        let timeout = ApiError::from_repo("test", &RepoError::Timeout);
        assert_eq!(timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(timeout.code, codes::DB_TIMEOUT);

        let persistence = ApiError::from_repo("test", &RepoError::from_persistence("boom"));
        assert_eq!(persistence.code, codes::INTERNAL);
    }

    #[test]
    fn response_carries_error_report() {
        let response = ApiError::not_found("Order not found", "order `x` not found").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["order `x` not found".to_string()]);
    }
}
