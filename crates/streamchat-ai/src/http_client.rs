use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ClientConfig;
use crate::error::{AiError, Result};

const DISABLE_SYSTEM_PROXY_ENV: &str = "STREAMCHAT_DISABLE_SYSTEM_PROXY";
const REQUEST_SOURCE_HEADER: &str = "x-request-source";

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if !config.request_source.is_empty() {
        let value = HeaderValue::from_str(&config.request_source)
            .map_err(|e| AiError::InvalidState(format!("invalid request source header: {e}")))?;
        headers.insert(HeaderName::from_static(REQUEST_SOURCE_HEADER), value);
    }

    let mut builder = Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
    if should_disable_system_proxy() {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| AiError::Network(format!("failed to build HTTP client: {e}")))
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
