use reqwest::StatusCode;

use crate::{
    client::{ACCESS_TOKEN_HEADER, API_URL, DEFAULT_TIMEOUT},
    error::{Result, classify_transport},
    session::{GetRequest, HttpSession},
};

/// Whether the API accepts `api_key`.
///
/// Issues a bare `forecast` request with only the access token; a 200 means
/// the key is valid, any other status means it is not.
pub async fn validate_api_key(session: &dyn HttpSession, api_key: &str) -> Result<bool> {
    validate_api_key_at(session, API_URL, api_key).await
}

pub async fn validate_api_key_at(
    session: &dyn HttpSession,
    base_url: &str,
    api_key: &str,
) -> Result<bool> {
    let url = format!("{}/forecast", base_url.trim_end_matches('/'));
    let headers = [(ACCESS_TOKEN_HEADER, api_key)];

    let res = session
        .get(GetRequest {
            url: &url,
            headers: &headers,
            query: &[],
            timeout: DEFAULT_TIMEOUT,
        })
        .await
        .map_err(|err| classify_transport("forecast", err))?;

    Ok(res.status == StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ReqwestSession;

    #[tokio::test]
    async fn accepted_key_is_valid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/forecast")
            .match_header("x-access-token", "12345")
            .with_status(200)
            .with_body(r#"{"result": []}"#)
            .create_async()
            .await;

        let session = ReqwestSession::new(reqwest::Client::new());
        let base = format!("{}/api/v1", server.url());
        assert!(validate_api_key_at(&session, &base, "12345").await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_key_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/forecast")
            .with_status(403)
            .create_async()
            .await;

        let session = ReqwestSession::new(reqwest::Client::new());
        let base = format!("{}/api/v1", server.url());
        assert!(!validate_api_key_at(&session, &base, "bad").await.unwrap());
    }
}
