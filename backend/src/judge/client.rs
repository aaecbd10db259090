use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::judge::errors::JudgeError;
use crate::judge::types::{
    GraphQlRequest, JudgeAccount, JudgeCredential, JudgeEvent, parse_recent_events,
    parse_signed_in,
};

/// Read-only view of the external judge.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// The account's most recent submissions, newest first, at most `limit`.
    async fn recent_events(
        &self,
        account: &JudgeAccount,
        limit: usize,
    ) -> Result<Vec<JudgeEvent>, JudgeError>;

    /// Whether the credential represents a signed-in judge session.
    async fn validate_credential(&self, credential: &JudgeCredential) -> Result<bool, JudgeError>;
}

const RECENT_SUBMISSIONS_QUERY: &str = r#"
query recentAcSubmissions($username: String!, $limit: Int!) {
  recentAcSubmissionList(username: $username, limit: $limit) {
    id
    title
    titleSlug
    timestamp
    statusDisplay
    lang
  }
}
"#;

const USER_STATUS_QUERY: &str = "query { userStatus { username isSignedIn } }";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

#[derive(Serialize)]
struct RecentVariables<'a> {
    username: &'a str,
    limit: usize,
}

/// LeetCode GraphQL client.
#[derive(Clone)]
pub struct LeetCodeClient {
    http: Client,
    url: String,
    site: String,
}

impl LeetCodeClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, JudgeError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        let site = site_of(&url);
        Ok(Self { http, url, site })
    }

    fn headers(&self, credential: &JudgeCredential) -> Result<HeaderMap, JudgeError> {
        let csrf = credential.csrf_token.as_deref().unwrap_or("");
        let mut cookie = format!("LEETCODE_SESSION={}", credential.session_token);
        if let Some(token) = &credential.csrf_token {
            cookie.push_str("; csrftoken=");
            cookie.push_str(token);
        }

        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(ORIGIN, header_value(&self.site)?);
        h.insert(REFERER, header_value(&format!("{}/", self.site))?);
        h.insert("x-csrftoken", header_value(csrf)?);
        h.insert(COOKIE, header_value(&cookie)?);
        Ok(h)
    }

    async fn post<V: Serialize + Send + Sync>(
        &self,
        credential: &JudgeCredential,
        body: &GraphQlRequest<'_, V>,
    ) -> Result<String, JudgeError> {
        let resp = self
            .http
            .post(&self.url)
            .headers(self.headers(credential)?)
            .json(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl JudgeClient for LeetCodeClient {
    #[instrument(
        skip(self, account),
        fields(username = %account.username),
        level = "debug"
    )]
    async fn recent_events(
        &self,
        account: &JudgeAccount,
        limit: usize,
    ) -> Result<Vec<JudgeEvent>, JudgeError> {
        let body = GraphQlRequest {
            query: RECENT_SUBMISSIONS_QUERY,
            variables: RecentVariables {
                username: &account.username,
                limit,
            },
            operation_name: Some("recentAcSubmissions"),
        };

        let text = self.post(&account.credential, &body).await?;
        let mut events = parse_recent_events(&text)?;
        events.truncate(limit);

        debug!(count = events.len(), "judge events fetched");
        Ok(events)
    }

    #[instrument(skip(self, credential), level = "debug")]
    async fn validate_credential(&self, credential: &JudgeCredential) -> Result<bool, JudgeError> {
        let body = GraphQlRequest {
            query: USER_STATUS_QUERY,
            variables: serde_json::json!({}),
            operation_name: None,
        };

        let text = self.post(credential, &body).await?;
        parse_signed_in(&text)
    }
}

fn header_value(v: &str) -> Result<HeaderValue, JudgeError> {
    HeaderValue::from_str(v).map_err(|_| JudgeError::InvalidCredential)
}

/// Scheme and host of the endpoint, used for Origin/Referer.
fn site_of(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(u) => u.origin().ascii_serialization(),
        Err(_) => url.trim_end_matches('/').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LeetCodeClient {
        LeetCodeClient::new(
            "https://leetcode.com/graphql".into(),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn origin_is_derived_from_endpoint() {
        assert_eq!(site_of("https://leetcode.com/graphql"), "https://leetcode.com");
        assert_eq!(site_of("http://localhost:8080/graphql"), "http://localhost:8080");
    }

    #[test]
    fn headers_carry_cookie_and_csrf() {
        let h = client()
            .headers(&JudgeCredential {
                session_token: "abc".into(),
                csrf_token: Some("xyz".into()),
            })
            .unwrap();

        assert_eq!(h[COOKIE], "LEETCODE_SESSION=abc; csrftoken=xyz");
        assert_eq!(h["x-csrftoken"], "xyz");
        assert_eq!(h[ORIGIN], "https://leetcode.com");
        assert_eq!(h[REFERER], "https://leetcode.com/");
    }

    #[test]
    fn headers_without_csrf() {
        let h = client()
            .headers(&JudgeCredential {
                session_token: "abc".into(),
                csrf_token: None,
            })
            .unwrap();

        assert_eq!(h[COOKIE], "LEETCODE_SESSION=abc");
        assert_eq!(h["x-csrftoken"], "");
    }

    #[test]
    fn newline_in_token_is_rejected() {
        let err = client()
            .headers(&JudgeCredential {
                session_token: "abc\r\nX-Evil: 1".into(),
                csrf_token: None,
            })
            .unwrap_err();
        assert!(matches!(err, JudgeError::InvalidCredential));
    }
}
