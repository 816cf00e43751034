//! Error bodies and status mapping shared by the handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

use postagem_core::{
    CarrierError, LabelError, OrderBookError, PrePostingError, PrintQueueError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Status code plus `{"error": ...}` body.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::NOT_FOUND, message)
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

fn carrier_status(error: &CarrierError) -> StatusCode {
    match error {
        CarrierError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn orders_status(error: &OrderBookError) -> StatusCode {
    match error {
        OrderBookError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderBookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn carrier_error(e: CarrierError) -> ApiError {
    api_error(carrier_status(&e), e.to_string())
}

pub fn pre_posting_error(e: PrePostingError) -> ApiError {
    let status = match &e {
        PrePostingError::NotFound(_)
        | PrePostingError::OrderNotFound(_)
        | PrePostingError::ReturnNotFound(_) => StatusCode::NOT_FOUND,
        PrePostingError::MissingDeliveryAddress(_) | PrePostingError::InvalidState { .. } => {
            StatusCode::BAD_REQUEST
        }
        PrePostingError::AlreadyActive(_) => StatusCode::CONFLICT,
        PrePostingError::Carrier(inner) => carrier_status(inner),
        PrePostingError::Orders(inner) => orders_status(inner),
        PrePostingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

pub fn label_error(e: LabelError) -> ApiError {
    let status = match &e {
        LabelError::NotFound(_) => StatusCode::NOT_FOUND,
        LabelError::Validation(_) | LabelError::PrePostingNotReady(_) => StatusCode::BAD_REQUEST,
        LabelError::JobFailed { .. } => StatusCode::BAD_GATEWAY,
        LabelError::Carrier(inner) => carrier_status(inner),
        LabelError::PrePosting(PrePostingError::OrderNotFound(_)) => StatusCode::NOT_FOUND,
        LabelError::PrePosting(_) | LabelError::Storage(_) | LabelError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

pub fn print_queue_error(e: PrintQueueError) -> ApiError {
    let status = match &e {
        PrintQueueError::NotFound(_) | PrintQueueError::LabelNotFound(_) => StatusCode::NOT_FOUND,
        PrintQueueError::InvalidState { .. } => StatusCode::BAD_REQUEST,
        PrintQueueError::Label(LabelError::NotFound(_)) => StatusCode::NOT_FOUND,
        PrintQueueError::Orders(inner) => orders_status(inner),
        PrintQueueError::Label(_) | PrintQueueError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use postagem_core::{PrePostingStatus, PrintStatus};

    #[test]
    fn test_pre_posting_error_statuses() {
        assert_eq!(
            pre_posting_error(PrePostingError::OrderNotFound(1)).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            pre_posting_error(PrePostingError::MissingDeliveryAddress(1)).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            pre_posting_error(PrePostingError::InvalidState {
                id: 1,
                status: PrePostingStatus::Delivered,
                operation: "cancel",
            })
            .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            pre_posting_error(PrePostingError::AlreadyActive(1)).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            pre_posting_error(PrePostingError::Carrier(CarrierError::Api {
                status: 500,
                body: "boom".to_string(),
            }))
            .0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            pre_posting_error(PrePostingError::Carrier(CarrierError::Authentication(
                "denied".to_string()
            )))
            .0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_label_and_queue_error_statuses() {
        assert_eq!(
            label_error(LabelError::Validation("none".to_string())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            label_error(LabelError::NotFound("R1".to_string())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            label_error(LabelError::Storage("disk".to_string())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            print_queue_error(PrintQueueError::InvalidState {
                id: 1,
                status: PrintStatus::Printed,
                operation: "reserve",
            })
            .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            print_queue_error(PrintQueueError::NotFound(9)).0,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_body_carries_message() {
        let (_, Json(body)) = not_found("Pre-posting not found: 3");
        assert_eq!(body.error, "Pre-posting not found: 3");
    }
}
