use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use payment_core::{
    traits::{GatewayError, PaymentStoreError},
    PaymentFlowError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Webhook signature invalid or not provided")]
    InvalidWebhookSignature,
    #[error("Conflicting transaction state. {0}")]
    TransitionConflict(String),
    #[error("A transaction for this order already exists. {0}")]
    DuplicateOrder(String),
    #[error("Refund not allowed. {0}")]
    RefundNotAllowed(String),
    #[error("The payment gateway rejected the request. {0}")]
    UpstreamGatewayError(String),
    #[error("The payment gateway did not respond in time")]
    GatewayTimeout,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::RefundNotAllowed(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::TransitionConflict(_) => StatusCode::CONFLICT,
            Self::DuplicateOrder(_) => StatusCode::CONFLICT,
            Self::UpstreamGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::InvalidSignature(_) => Self::InvalidWebhookSignature,
            PaymentFlowError::MalformedPayload(m) => Self::InvalidRequestBody(m),
            PaymentFlowError::ValidationError(m) => Self::InvalidRequestBody(m),
            PaymentFlowError::TransactionNotFound(id) => Self::NoRecordFound(format!("Transaction {id}")),
            PaymentFlowError::IllegalTransition { .. } => Self::TransitionConflict(e.to_string()),
            PaymentFlowError::RefundExceedsRemainder { .. } => Self::RefundNotAllowed(e.to_string()),
            PaymentFlowError::StoreError(PaymentStoreError::DuplicateOrderId(id)) => {
                Self::DuplicateOrder(id.to_string())
            },
            PaymentFlowError::StoreError(e) => Self::BackendError(format!("Database error: {e}")),
            PaymentFlowError::GatewayError(GatewayError::Timeout) => Self::GatewayTimeout,
            PaymentFlowError::GatewayError(e) => Self::UpstreamGatewayError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use payment_core::db_types::{OrderId, TransactionStatus};

    use super::*;

    #[test]
    fn flow_errors_map_onto_http_statuses() {
        let e: ServerError = PaymentFlowError::InvalidSignature(OrderId::from("a")).into();
        assert_eq!(e.status_code(), StatusCode::UNAUTHORIZED);
        let e: ServerError = PaymentFlowError::TransactionNotFound(OrderId::from("a")).into();
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        let e: ServerError = PaymentFlowError::IllegalTransition {
            order_id: OrderId::from("a"),
            from: TransactionStatus::Failed,
            to: TransactionStatus::Success,
        }
        .into();
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        let e: ServerError = PaymentFlowError::GatewayError(GatewayError::Timeout).into();
        assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
