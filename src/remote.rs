use crate::{
    error::{
        LedgerError,
        Result,
    },
    ledger::LedgerService,
    model::UserRecord,
    session::Session,
    transaction::UpdateRequest,
};
use reqwest::header::{
    CACHE_CONTROL,
    CONTENT_TYPE,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Sent as plain text so the spreadsheet script accepts it without a CORS
/// preflight.
const WRITE_CONTENT_TYPE: &str = "text/plain;charset=utf-8";
const SUCCESS_STATUS: &str = "success";

/// Client for the spreadsheet-backed points service. One URL serves both the
/// user list (`GET`) and updates (`POST`).
#[derive(Clone)]
pub struct HttpLedgerService {
    url: String,
    http: reqwest::Client,
}

impl HttpLedgerService {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let http = reqwest::Client::builder().build().map_err(|err| {
            LedgerError::Load(format!("failed to build HTTP client: {err}"))
        })?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl LedgerService for HttpLedgerService {
    async fn fetch_users(&self, _session: &Session) -> Result<Vec<UserRecord>> {
        debug!(url = %self.url, "fetching users");
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|err| LedgerError::Load(format!("request failed: {err}")))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|err| {
            LedgerError::Load(format!("failed to read response body: {err}"))
        })?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(LedgerError::Load(format!(
                "service responded with {status}: {body}"
            )));
        }
        parse_users(&bytes)
    }

    async fn submit_update(&self, request: &UpdateRequest) -> Result<()> {
        let body = serde_json::to_string(request)
            .map_err(|err| LedgerError::WriteFailed(err.to_string()))?;
        let res = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, WRITE_CONTENT_TYPE)
            .header(CACHE_CONTROL, "no-store")
            .body(body)
            .send()
            .await
            .map_err(|err| LedgerError::WriteFailed(format!("request failed: {err}")))?;
        let bytes = res.bytes().await.map_err(|err| {
            LedgerError::WriteFailed(format!("failed to read response body: {err}"))
        })?;
        parse_write_response(&bytes)
    }
}

impl fmt::Display for HttpLedgerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FetchResponseDto {
    Users(Vec<UserDto>),
    Error { error: String },
}

#[derive(Deserialize)]
struct UserDto {
    username: String,
    #[serde(default)]
    current_local_points: Value,
    #[serde(default)]
    current_global_points: Value,
}

#[derive(Deserialize)]
struct WriteResponseDto {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn parse_users(bytes: &[u8]) -> Result<Vec<UserRecord>> {
    let dto: FetchResponseDto = serde_json::from_slice(bytes)
        .map_err(|err| LedgerError::Load(format!("invalid user list payload: {err}")))?;
    match dto {
        FetchResponseDto::Error { error } => Err(LedgerError::Load(error)),
        FetchResponseDto::Users(users) => users.into_iter().map(UserRecord::try_from).collect(),
    }
}

pub(crate) fn parse_write_response(bytes: &[u8]) -> Result<()> {
    let dto: WriteResponseDto = serde_json::from_slice(bytes).map_err(|err| {
        LedgerError::WriteFailed(format!("invalid update response: {err}"))
    })?;
    if dto.status == SUCCESS_STATUS {
        return Ok(());
    }
    Err(LedgerError::WriteFailed(
        dto.message
            .unwrap_or_else(|| format!("service returned status '{}'", dto.status)),
    ))
}

impl TryFrom<UserDto> for UserRecord {
    type Error = LedgerError;

    fn try_from(dto: UserDto) -> Result<Self> {
        let local = points_from_cell(&dto.username, "local", &dto.current_local_points)?;
        let global =
            points_from_cell(&dto.username, "global", &dto.current_global_points)?;
        Ok(UserRecord::new(dto.username, local, global))
    }
}

/// Spreadsheet cells come back as numbers, numeric strings or blanks. Blank
/// and missing cells count as zero.
fn points_from_cell(username: &str, field: &str, cell: &Value) -> Result<u64> {
    let malformed = || {
        LedgerError::Load(format!(
            "invalid {field} points for '{username}': {cell}"
        ))
    };
    match cell {
        Value::Null => Ok(0),
        Value::Number(number) => {
            if let Some(points) = number.as_u64() {
                return Ok(points);
            }
            match number.as_f64() {
                Some(points)
                    if points >= 0.0 && points.fract() == 0.0 && points < u64::MAX as f64 =>
                {
                    Ok(points as u64)
                }
                _ => Err(malformed()),
            }
        }
        Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(0);
            }
            raw.parse::<u64>().map_err(|_| malformed())
        }
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn parse_users__reads_rows_in_order_defaulting_blank_cells() {
        // given
        let body = br#"[
            {"username": "alice", "current_local_points": 10, "current_global_points": 5},
            {"username": "bob", "current_local_points": "2", "current_global_points": ""},
            {"username": "carol"},
            {"username": "dave", "current_local_points": 4.0, "current_global_points": null}
        ]"#;

        // when
        let users = parse_users(body).unwrap();

        // then
        assert_eq!(
            users,
            vec![
                UserRecord::new("alice", 10, 5),
                UserRecord::new("bob", 2, 0),
                UserRecord::new("carol", 0, 0),
                UserRecord::new("dave", 4, 0),
            ]
        );
    }

    #[test]
    fn parse_users__error_object__is_load_error_with_message() {
        // given
        let body = br#"{"error": "Sheet not found"}"#;

        // when
        let result = parse_users(body);

        // then
        assert_eq!(result, Err(LedgerError::Load("Sheet not found".to_string())));
    }

    #[test]
    fn parse_users__negative_or_fractional_points__are_malformed() {
        // given
        let negative = br#"[{"username": "a", "current_local_points": -1}]"#;
        let fractional = br#"[{"username": "a", "current_global_points": 1.5}]"#;
        let text = br#"[{"username": "a", "current_global_points": "lots"}]"#;
        let too_large = br#"[{"username": "a", "current_local_points": 18446744073709551616.0}]"#;

        // when
        let results = [
            parse_users(negative),
            parse_users(fractional),
            parse_users(text),
            parse_users(too_large),
        ];

        // then
        for result in results {
            assert!(matches!(result, Err(LedgerError::Load(_))));
        }
    }

    #[test]
    fn parse_users__not_json__is_load_error() {
        // given
        let body = b"<html>Sign in</html>";

        // when
        let result = parse_users(body);

        // then
        assert!(matches!(result, Err(LedgerError::Load(_))));
    }

    #[test]
    fn parse_write_response__success_status__confirms() {
        // given
        let body = br#"{"status": "success"}"#;

        // when
        let result = parse_write_response(body);

        // then
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn parse_write_response__other_status__fails_with_server_message() {
        // given
        let with_message = br#"{"status": "error", "message": "Incorrect password"}"#;
        let without_message = br#"{"status": "denied"}"#;

        // when
        let first = parse_write_response(with_message);
        let second = parse_write_response(without_message);

        // then
        assert_eq!(
            first,
            Err(LedgerError::WriteFailed("Incorrect password".to_string()))
        );
        assert_eq!(
            second,
            Err(LedgerError::WriteFailed(
                "service returned status 'denied'".to_string()
            ))
        );
    }

    #[test]
    fn parse_write_response__malformed_body__fails() {
        // given
        let body = b"Internal error";

        // when
        let result = parse_write_response(body);

        // then
        assert!(matches!(result, Err(LedgerError::WriteFailed(_))));
    }
}
