//! Pre-flight security scan over a changeset.
//!
//! Runs before anything is staged. A file whose name ends with a blocked
//! extension is a high-severity violation and is not read. Binary files
//! (a NUL byte in the first 1 KiB) are skipped entirely. Every other file is
//! read as text and matched against the secret patterns; each match is a
//! medium-severity violation. Only high severity blocks a commit.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::domain::{AutoCommitError, ChangeSet, Result, SecurityViolation, Severity, ViolationKind};

const BINARY_SNIFF_BYTES: usize = 1024;
const MAX_MATCH_CHARS: usize = 50;

/// Compile secret patterns case-insensitively.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| AutoCommitError::config(format!("invalid secret pattern '{p}': {e}")))
        })
        .collect()
}

/// Scan verdict: `safe` is false iff any violation is high severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub safe: bool,
    pub violations: Vec<SecurityViolation>,
}

impl ScanReport {
    pub fn warnings(&self) -> impl Iterator<Item = &SecurityViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Medium)
    }
}

#[derive(Debug, Clone)]
pub struct SecurityScanner {
    patterns: Vec<Regex>,
    blocked_extensions: Vec<String>,
}

impl SecurityScanner {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&config.secret_patterns)?,
            blocked_extensions: config.blocked_extensions.clone(),
        })
    }

    /// Scan every path of `changes`, resolved against `root`.
    ///
    /// Output order follows the changeset, then pattern order, then match
    /// position, so repeated scans of unchanged files are identical.
    pub fn scan(&self, root: &Path, changes: &ChangeSet) -> Vec<SecurityViolation> {
        let mut violations = Vec::new();
        for rel in changes.iter() {
            self.scan_file(root, rel, &mut violations);
        }
        violations
    }

    pub fn is_safe_to_commit(&self, root: &Path, changes: &ChangeSet) -> ScanReport {
        let violations = self.scan(root, changes);
        let safe = !violations.iter().any(|v| v.severity == Severity::High);
        ScanReport { safe, violations }
    }

    fn scan_file(&self, root: &Path, rel: &str, out: &mut Vec<SecurityViolation>) {
        if let Some(ext) = self.blocked_extensions.iter().find(|ext| rel.ends_with(ext.as_str())) {
            out.push(SecurityViolation {
                file: rel.to_string(),
                kind: ViolationKind::BlockedExtension,
                severity: Severity::High,
                detail: format!("extension '{ext}' is blocked"),
            });
            return;
        }

        let path = root.join(rel);
        match is_binary(&path) {
            Ok(true) => {
                debug!(file = %rel, "skipping binary file");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(file = %rel, error = %e, "could not scan file");
                return;
            }
        }

        let content = match std::fs::read(&path) {
            Ok(bytes) => decode_lossy(&bytes),
            Err(e) => {
                warn!(file = %rel, error = %e, "could not scan file");
                return;
            }
        };

        for pattern in &self.patterns {
            for m in pattern.find_iter(&content) {
                out.push(SecurityViolation {
                    file: rel.to_string(),
                    kind: ViolationKind::PotentialSecret,
                    severity: Severity::Medium,
                    detail: format!(
                        "pattern /{}/ matched '{}'",
                        pattern.as_str(),
                        truncate_match(m.as_str())
                    ),
                });
            }
        }
    }
}

fn is_binary(path: &Path) -> std::io::Result<bool> {
    let mut buf = [0u8; BINARY_SNIFF_BYTES];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(buf[..filled].contains(&0))
}

/// UTF-8 decode, dropping invalid sequences.
fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\u{FFFD}', "")
}

fn truncate_match(s: &str) -> String {
    if s.chars().count() > MAX_MATCH_CHARS {
        let head: String = s.chars().take(MAX_MATCH_CHARS).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scanner(patterns: &[&str], blocked: &[&str]) -> SecurityScanner {
        SecurityScanner::new(&SecurityConfig {
            scan_for_secrets: true,
            secret_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            blocked_extensions: blocked.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_blocked_extension_is_high_regardless_of_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("server.key"), "nothing secret here").unwrap();
        let s = scanner(&["password"], &[".key"]);

        let changes: ChangeSet = ["server.key"].into_iter().collect();
        let report = s.is_safe_to_commit(dir.path(), &changes);
        assert!(!report.safe);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].severity, Severity::High);
        assert_eq!(report.violations[0].kind, ViolationKind::BlockedExtension);
    }

    #[test]
    fn test_blocked_extension_applies_to_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = scanner(&[], &[".pem"]);
        let changes: ChangeSet = ["deleted/cert.pem"].into_iter().collect();
        assert!(!s.is_safe_to_commit(dir.path(), &changes).safe);
    }

    #[test]
    fn test_binary_file_never_reports_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"password=hunter22\0".to_vec();
        bytes.extend_from_slice(b"password=hunter22");
        fs::write(dir.path().join("blob.bin"), bytes).unwrap();

        let s = scanner(&["password=\\w+"], &[]);
        let changes: ChangeSet = ["blob.bin"].into_iter().collect();
        let report = s.is_safe_to_commit(dir.path(), &changes);
        assert!(report.safe);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_nul_after_first_kib_is_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![b'a'; BINARY_SNIFF_BYTES];
        bytes.extend_from_slice(b"\0password=abc");
        fs::write(dir.path().join("late.txt"), bytes).unwrap();

        let s = scanner(&["password=\\w+"], &[]);
        let changes: ChangeSet = ["late.txt"].into_iter().collect();
        assert_eq!(s.scan(dir.path(), &changes).len(), 1);
    }

    #[test]
    fn test_secret_matches_are_medium_and_do_not_block() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("settings.py"),
            "API_KEY = 'abcdefghijkl'\napi_key = \"zyxwvutsrqpo\"\n",
        )
        .unwrap();

        let s = scanner(&[r#"api_key\s*=\s*['"]\w+['"]"#], &[".key"]);
        let changes: ChangeSet = ["settings.py"].into_iter().collect();
        let report = s.is_safe_to_commit(dir.path(), &changes);
        assert!(report.safe);
        assert_eq!(report.violations.len(), 2, "case-insensitive, one per match");
        assert!(report
            .violations
            .iter()
            .all(|v| v.severity == Severity::Medium && v.kind == ViolationKind::PotentialSecret));
        assert_eq!(report.warnings().count(), 2);
    }

    #[test]
    fn test_long_match_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let token = "x".repeat(80);
        fs::write(dir.path().join("a.txt"), format!("token={token}")).unwrap();

        let s = scanner(&["token=x+"], &[]);
        let changes: ChangeSet = ["a.txt"].into_iter().collect();
        let v = s.scan(dir.path(), &changes);
        assert_eq!(v.len(), 1);
        let expected = format!("'{}...'", &format!("token={token}")[..50]);
        assert!(v[0].detail.ends_with(&expected), "detail: {}", v[0].detail);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let s = scanner(&["secret"], &[]);
        let changes: ChangeSet = ["gone.txt"].into_iter().collect();
        let report = s.is_safe_to_commit(dir.path(), &changes);
        assert!(report.safe);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.env.txt"), "password='aaaaaaaaaa'\ntoken='bbbbbbbbbb'").unwrap();
        fs::write(dir.path().join("b.pem"), "-----BEGIN").unwrap();
        let s = SecurityScanner::new(&SecurityConfig::default()).unwrap();
        let changes: ChangeSet = ["b.pem", "a.env.txt"].into_iter().collect();

        let first = s.scan(dir.path(), &changes);
        let second = s.scan(dir.path(), &changes);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_invalid_utf8_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"pass".to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(b"word=abc");
        fs::write(dir.path().join("mixed.txt"), bytes).unwrap();

        let s = scanner(&["password=\\w+"], &[]);
        let changes: ChangeSet = ["mixed.txt"].into_iter().collect();
        assert_eq!(s.scan(dir.path(), &changes).len(), 1);
    }
}
