//! The user database: a text file of whitespace-separated tokens in groups
//! of four (`name pass group home_dir`), with records optionally separated
//! by any of `= ; { } \n`. Re-read in full on every `authorization`.

use std::path::Path;

/// One parsed user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Login name.
    pub name: String,
    /// Plaintext password, compared verbatim against the client's claim.
    pub pass: String,
    /// Group name (carried through, not otherwise interpreted).
    pub group: String,
    /// Home directory the session `chdir`s into on success.
    pub home_dir: String,
}

/// Parse the full contents of a user database file into records.
///
/// Tokens are separated by any run of whitespace or the record-separator
/// characters `= ; { }`; every run of four consecutive tokens forms one
/// record. A trailing partial group (fewer than four tokens) is discarded.
#[must_use]
pub fn parse(contents: &str) -> Vec<UserRecord> {
    let tokens: Vec<&str> =
        contents.split(|c: char| c.is_whitespace() || matches!(c, '=' | ';' | '{' | '}')).filter(|t| !t.is_empty()).collect();

    tokens
        .chunks_exact(4)
        .map(|chunk| UserRecord {
            name: chunk[0].to_string(),
            pass: chunk[1].to_string(),
            group: chunk[2].to_string(),
            home_dir: chunk[3].to_string(),
        })
        .collect()
}

/// Read and parse the user database at `path`.
///
/// # Errors
///
/// Propagates the underlying `std::fs::read_to_string` I/O error.
pub fn load(path: &Path) -> std::io::Result<Vec<UserRecord>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse(&contents))
}

/// Find the record matching `name`/`pass` exactly.
#[must_use]
pub fn authenticate<'a>(records: &'a [UserRecord], name: &str, pass: &str) -> Option<&'a UserRecord> {
    records.iter().find(|r| r.name == name && r.pass == pass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitespace_separated_records() {
        let input = "alice secret staff /home/alice\nbob hunter2 guest /home/bob\n";
        let records = parse(input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], UserRecord {
            name: "alice".into(),
            pass: "secret".into(),
            group: "staff".into(),
            home_dir: "/home/alice".into(),
        });
        assert_eq!(records[1].name, "bob");
    }

    #[test]
    fn parses_delimiter_separated_records() {
        let input = "{alice=secret;staff;/home/alice}{bob=hunter2;guest;/home/bob}";
        let records = parse(input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "alice");
        assert_eq!(records[1].home_dir, "/home/bob");
    }

    #[test]
    fn discards_trailing_partial_group() {
        let input = "alice secret staff /home/alice bob hunter2 guest";
        let records = parse(input);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn authenticate_matches_exact_credentials() {
        let records = parse("alice secret staff /home/alice");
        assert!(authenticate(&records, "alice", "secret").is_some());
        assert!(authenticate(&records, "alice", "wrong").is_none());
        assert!(authenticate(&records, "nope", "secret").is_none());
    }
}
