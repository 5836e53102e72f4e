use serde::de::DeserializeOwned;

use super::ResolverError;

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Turn one HTTP exchange into a decoded body or a resolver failure.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    order_id: i32,
    sent: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, ResolverError> {
    let response = sent.map_err(|e| ResolverError::Transport {
        service,
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResolverError::UnexpectedStatus {
            service,
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|e| ResolverError::Transport {
        service,
        message: format!("failed reading body: {e}"),
    })?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ResolverError::EmptyResponse { service, order_id });
    }

    serde_json::from_slice(&body).map_err(|e| ResolverError::InvalidResponse {
        service,
        message: e.to_string(),
    })
}
