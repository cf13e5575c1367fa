use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Capacity of the credential table; lines past this are ignored.
pub const MAX_RECORDS: usize = 1000;

/// Fields longer than this are silently truncated.
pub const MAX_FIELD: usize = 255;

/// One `<username> <password>` record.
#[derive(Debug, Clone)]
struct Credential {
    username: String,
    password: String,
}

/// In-memory credential table. Loaded once at startup and read-only
/// afterwards; the index of a matching record doubles as the authenticated
/// user handle for the rest of the session.
#[derive(Debug, Default)]
pub struct CredentialStore {
    records: Vec<Credential>,
}

impl CredentialStore {
    /// Load `path`: one record per non-empty line, the first two
    /// whitespace-separated fields are username and password, anything after
    /// them is ignored. Lines without both fields are skipped. Loading again
    /// yields a fresh table that replaces the previous one at the caller.
    pub fn load(path: impl AsRef<Path>) -> Result<CredentialStore> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read credential file {}: {e}", path.display())))?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> CredentialStore {
        let mut records = Vec::new();
        for line in content.lines() {
            if records.len() == MAX_RECORDS {
                break;
            }
            let mut fields = line.split_whitespace();
            let (Some(username), Some(password)) = (fields.next(), fields.next()) else {
                continue;
            };
            records.push(Credential {
                username: truncate_field(username),
                password: truncate_field(password),
            });
        }
        CredentialStore { records }
    }

    /// Index of the record matching both fields, if any.
    pub fn verify(&self, username: &str, password: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|c| c.username == username && c.password == password)
    }

    /// Username of the record at `index`. Callers only hold indices returned
    /// by `verify`, so the access is always in range.
    pub fn username_at(&self, index: usize) -> &str {
        &self.records[index].username
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn truncate_field(field: &str) -> String {
    if field.len() <= MAX_FIELD {
        return field.to_string();
    }
    let mut end = MAX_FIELD;
    while !field.is_char_boundary(end) {
        end -= 1;
    }
    field[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_verify_returns_matching_index() {
        let store = CredentialStore::parse("alice secret\nbob hunter2\n");
        assert_eq!(store.len(), 2);
        assert_eq!(store.verify("alice", "secret"), Some(0));
        assert_eq!(store.verify("bob", "hunter2"), Some(1));
        assert_eq!(store.username_at(1), "bob");
    }

    #[test]
    fn test_verify_misses() {
        let store = CredentialStore::parse("alice secret\n");
        assert_eq!(store.verify("alice", "wrong"), None);
        assert_eq!(store.verify("mallory", "secret"), None);
    }

    #[test]
    fn test_blank_and_partial_lines_skipped() {
        let store = CredentialStore::parse("\n   \nloner\nalice secret\n");
        assert_eq!(store.len(), 1);
        assert_eq!(store.verify("alice", "secret"), Some(0));
    }

    #[test]
    fn test_whitespace_runs_and_extra_fields() {
        let store = CredentialStore::parse("alice \t  secret  ignored trailing\n");
        assert_eq!(store.verify("alice", "secret"), Some(0));
    }

    #[test]
    fn test_fields_truncated() {
        let long = "x".repeat(400);
        let store = CredentialStore::parse(&format!("{long} pw\n"));
        assert_eq!(store.username_at(0).len(), MAX_FIELD);
        assert_eq!(store.verify(&"x".repeat(MAX_FIELD), "pw"), Some(0));
    }

    #[test]
    fn test_capacity_capped() {
        let mut content = String::new();
        for i in 0..MAX_RECORDS + 50 {
            content.push_str(&format!("user{i} pass{i}\n"));
        }
        let store = CredentialStore::parse(&content);
        assert_eq!(store.len(), MAX_RECORDS);
        assert_eq!(store.verify("user999", "pass999"), Some(999));
        assert_eq!(store.verify("user1000", "pass1000"), None);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = CredentialStore::load("/nonexistent/credentials.txt").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "alice secret").unwrap();
        writeln!(f, "bob hunter2").unwrap();
        let store = CredentialStore::load(f.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.verify("bob", "hunter2"), Some(1));
    }
}
