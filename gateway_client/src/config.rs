use log::*;
use pay_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API, without a trailing slash.
    pub base_url: String,
    /// The merchant server key. Becomes the username of the Basic auth header; the password is empty.
    pub server_key: Secret<String>,
    /// Where the gateway redirects the customer after a completed payment.
    pub finish_url: Option<String>,
    /// Where the gateway redirects the customer after an abandoned payment.
    pub unfinish_url: Option<String>,
    /// Where the gateway redirects the customer after a failed payment.
    pub error_url: Option<String>,
    /// Payment methods to offer, in gateway vocabulary. Empty means "all".
    pub enabled_payments: Vec<String>,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("PPC_GATEWAY_BASE_URL").unwrap_or_else(|_| {
            warn!("PPC_GATEWAY_BASE_URL not set, using the sandbox endpoint as default");
            "https://api.sandbox.paygate.example".to_string()
        });
        let base_url = base_url.trim_end_matches('/').to_string();
        let server_key = Secret::new(std::env::var("PPC_GATEWAY_SERVER_KEY").unwrap_or_else(|_| {
            warn!("PPC_GATEWAY_SERVER_KEY not set, using (probably useless) default");
            "SB-server-00000000000000".to_string()
        }));
        let finish_url = std::env::var("PPC_FINISH_URL").ok();
        let unfinish_url = std::env::var("PPC_UNFINISH_URL").ok();
        let error_url = std::env::var("PPC_ERROR_URL").ok();
        let enabled_payments = std::env::var("PPC_ENABLED_PAYMENTS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        Self { base_url, server_key, finish_url, unfinish_url, error_url, enabled_payments }
    }
}
