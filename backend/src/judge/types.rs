use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::judge::errors::JudgeError;
use crate::time::from_secs;

/// Session cookie (plus optional CSRF token) for the judge.
#[derive(Clone, PartialEq, Eq)]
pub struct JudgeCredential {
    pub session_token: String,
    pub csrf_token: Option<String>,
}

impl fmt::Debug for JudgeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeCredential")
            .field("session_token", &"<redacted>")
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A learner's identity on the judge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeAccount {
    pub username: String,
    pub credential: JudgeCredential,
}

impl JudgeAccount {
    pub fn is_configured(&self) -> bool {
        !self.username.trim().is_empty() && !self.credential.session_token.trim().is_empty()
    }
}

/// One entry of the judge's recent-submissions feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeEvent {
    pub external_id: String,
    pub problem_slug: String,
    pub submitted_at: DateTime<Utc>,
    pub status_text: String,
    pub language: String,
}

impl JudgeEvent {
    /// Same problem, strictly after the attempt started.
    pub fn matches(&self, problem_slug: &str, started_at: DateTime<Utc>) -> bool {
        self.problem_slug == problem_slug && self.submitted_at > started_at
    }
}

/* =========================
GraphQL wire types
========================= */

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    pub fn into_data(self) -> Result<T, JudgeError> {
        if !self.errors.is_empty() {
            let msg = self
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(JudgeError::Rejected(msg));
        }
        self.data
            .ok_or_else(|| JudgeError::InvalidResponse("missing data".into()))
    }
}

/// The judge is inconsistent about quoting numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StringOrInt {
    Int(i64),
    Str(String),
}

impl StringOrInt {
    fn into_string(self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Str(s) => s,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentSubmissionsData {
    #[serde(rename = "recentAcSubmissionList")]
    pub recent: Option<Vec<RawSubmission>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSubmission {
    pub id: StringOrInt,
    pub title_slug: String,
    pub timestamp: StringOrInt,
    /// The accepted-only feed may omit the verdict.
    #[serde(default = "accepted")]
    pub status_display: String,
    #[serde(default)]
    pub lang: String,
}

fn accepted() -> String {
    crate::submission::model::ACCEPTED.to_string()
}

impl RawSubmission {
    pub fn into_event(self) -> Result<JudgeEvent, JudgeError> {
        let submitted_at = self
            .timestamp
            .as_i64()
            .and_then(from_secs)
            .ok_or_else(|| JudgeError::InvalidResponse(format!("bad timestamp: {:?}", self.timestamp)))?;

        Ok(JudgeEvent {
            external_id: self.id.into_string(),
            problem_slug: self.title_slug,
            submitted_at,
            status_text: self.status_display,
            language: self.lang,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserStatusData {
    #[serde(rename = "userStatus")]
    pub user_status: Option<UserStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserStatus {
    #[serde(rename = "isSignedIn", default)]
    pub is_signed_in: bool,
}

/// Decodes a recent-submissions response into events, newest first.
pub fn parse_recent_events(body: &str) -> Result<Vec<JudgeEvent>, JudgeError> {
    let envelope: GraphQlResponse<RecentSubmissionsData> = serde_json::from_str(body)?;
    let raw = envelope
        .into_data()?
        .recent
        .ok_or_else(|| JudgeError::InvalidResponse("recentAcSubmissionList missing".into()))?;

    let mut events = raw
        .into_iter()
        .map(RawSubmission::into_event)
        .collect::<Result<Vec<_>, _>>()?;

    // stable: equal timestamps keep the judge's order
    events.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(events)
}

/// Decodes a user-status response; anything but an explicit sign-in is `false`.
pub fn parse_signed_in(body: &str) -> Result<bool, JudgeError> {
    let envelope: GraphQlResponse<UserStatusData> = serde_json::from_str(body)?;
    Ok(envelope
        .into_data()?
        .user_status
        .map(|s| s.is_signed_in)
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_feed_with_mixed_number_encodings() {
        let body = r#"{"data":{"recentAcSubmissionList":[
            {"id":"1001","title":"Two Sum","titleSlug":"two-sum","timestamp":"1704067200","statusDisplay":"Accepted","lang":"rust"},
            {"id":1002,"title":"Valid Parentheses","titleSlug":"valid-parentheses","timestamp":1704070800,"statusDisplay":"Accepted","lang":"python3"}
        ]}}"#;

        let events = parse_recent_events(body).unwrap();
        assert_eq!(events.len(), 2);

        // newest first
        assert_eq!(events[0].external_id, "1002");
        assert_eq!(events[0].problem_slug, "valid-parentheses");
        assert_eq!(
            events[1].submitted_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(events[1].language, "rust");
    }

    #[test]
    fn omitted_verdict_defaults_to_accepted() {
        let body = r#"{"data":{"recentAcSubmissionList":[
            {"id":"7","titleSlug":"two-sum","timestamp":"1704067200"}
        ]}}"#;
        let events = parse_recent_events(body).unwrap();
        assert_eq!(events[0].status_text, "Accepted");
        assert_eq!(events[0].language, "");
    }

    #[test]
    fn graphql_errors_are_rejections() {
        let body = r#"{"data":null,"errors":[{"message":"That user does not exist."}]}"#;
        let err = parse_recent_events(body).unwrap_err();
        assert!(matches!(err, JudgeError::Rejected(m) if m.contains("does not exist")));
    }

    #[test]
    fn missing_list_is_invalid_response() {
        let body = r#"{"data":{"recentAcSubmissionList":null}}"#;
        assert!(matches!(
            parse_recent_events(body),
            Err(JudgeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn bad_timestamp_is_invalid_response() {
        let body = r#"{"data":{"recentAcSubmissionList":[
            {"id":"1","titleSlug":"two-sum","timestamp":"yesterday","statusDisplay":"Accepted","lang":"rust"}
        ]}}"#;
        assert!(matches!(
            parse_recent_events(body),
            Err(JudgeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            parse_recent_events("<html>"),
            Err(JudgeError::Decode(_))
        ));
    }

    #[test]
    fn signed_in_flag() {
        assert!(parse_signed_in(r#"{"data":{"userStatus":{"username":"ann","isSignedIn":true}}}"#).unwrap());
        assert!(!parse_signed_in(r#"{"data":{"userStatus":{"username":null,"isSignedIn":false}}}"#).unwrap());
        assert!(!parse_signed_in(r#"{"data":{"userStatus":null}}"#).unwrap());
    }

    #[test]
    fn event_matching_is_strictly_after_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let ev = JudgeEvent {
            external_id: "1".into(),
            problem_slug: "two-sum".into(),
            submitted_at: start,
            status_text: "Accepted".into(),
            language: "rust".into(),
        };

        assert!(!ev.matches("two-sum", start));
        assert!(ev.matches("two-sum", start - chrono::Duration::seconds(1)));
        assert!(!ev.matches("3sum", start - chrono::Duration::seconds(1)));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = JudgeCredential {
            session_token: "secret-cookie".into(),
            csrf_token: Some("csrf".into()),
        };
        let out = format!("{c:?}");
        assert!(!out.contains("secret-cookie"));
        assert!(!out.contains("\"csrf\""));
    }
}
