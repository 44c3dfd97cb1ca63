//! Credentials file (`secrets.json`) read fresh on every triggered cycle.
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use crate::model::Credentials;

pub const USERNAME_FIELD: &str = "PLEX_USERNAME";
pub const PASSWORD_FIELD: &str = "PLEX_PASSWORD";

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Please mount dir to /config and load a secrets.json")]
    Missing,
    #[error("failed to read secrets.json: {0}")]
    Io(#[from] std::io::Error),
    #[error("secrets.json is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0} not found in secrets.json")]
    MissingField(&'static str),
    #[error("{0} in secrets.json must be a string")]
    InvalidField(&'static str),
}

/// Read and validate the credentials file at `path`.
pub async fn load(path: &Path) -> Result<Credentials, SecretsError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SecretsError::Missing)
        }
        Err(err) => return Err(err.into()),
    };
    parse(&content)
}

pub fn parse(content: &str) -> Result<Credentials, SecretsError> {
    let doc: Value = serde_json::from_str(content)?;
    Ok(Credentials {
        username: field(&doc, USERNAME_FIELD)?,
        password: field(&doc, PASSWORD_FIELD)?,
    })
}

fn field(doc: &Value, name: &'static str) -> Result<String, SecretsError> {
    match doc.get(name) {
        None | Some(Value::Null) => Err(SecretsError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SecretsError::InvalidField(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_ok() {
        let creds = parse(r#"{"PLEX_USERNAME": "me", "PLEX_PASSWORD": "pw"}"#).unwrap();
        assert_eq!(creds.username, "me");
        assert_eq!(creds.password, "pw");
    }

    #[test]
    fn missing_fields_are_named() {
        let err = parse(r#"{"PLEX_PASSWORD": "pw"}"#).unwrap_err();
        assert_eq!(err.to_string(), "PLEX_USERNAME not found in secrets.json");

        let err = parse(r#"{"PLEX_USERNAME": "me"}"#).unwrap_err();
        assert_eq!(err.to_string(), "PLEX_PASSWORD not found in secrets.json");

        let err = parse(r#"{"PLEX_USERNAME": 7, "PLEX_PASSWORD": "pw"}"#).unwrap_err();
        assert!(matches!(err, SecretsError::InvalidField("PLEX_USERNAME")));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(parse("{nope"), Err(SecretsError::Parse(_))));
    }

    #[tokio::test]
    async fn missing_file_reports_mount_hint() {
        let td = tempdir().unwrap();
        let err = load(&td.path().join("secrets.json")).await.unwrap_err();
        assert!(matches!(err, SecretsError::Missing));
        assert!(err.to_string().contains("/config"));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let td = tempdir().unwrap();
        let p = td.path().join("secrets.json");
        std::fs::write(&p, r#"{"PLEX_USERNAME": "a", "PLEX_PASSWORD": "b"}"#).unwrap();
        let creds = load(&p).await.unwrap();
        assert_eq!(creds.username, "a");
    }
}
