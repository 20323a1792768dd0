//! Session persistence codec
//!
//! Serializes sessions to pretty-printed JSON files and loads them back
//! with full structural validation. Write targets are confined to the
//! working directory and the temp-directory allowlist; there is no repair
//! of corrupt files; a truncated write surfaces as malformed JSON.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;
use crate::session::{Session, SCHEMA_VERSION};

/// Temp locations always allowed as save targets (test and scratch use)
const TEMP_ALLOWLIST: &[&str] = &["/tmp", "/var/folders", "/private/tmp", "/private/var/folders"];

/// Save a session as JSON.
///
/// If `target` is a directory (or looks like one: no extension, does not
/// exist), a filename is synthesized as `<slug(model)>-<YYYYMMDD-HHMMSS>.json`
/// from the session's creation time. Note this means an extensionless path
/// that does not exist yet is always treated as a directory; file targets
/// need an extension (`runs/mysession.json`, not `runs/mysession`). Parent
/// directories are created as needed. Returns the path actually written.
pub fn save_session(session: &Session, target: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
    let target = target.as_ref();

    let is_dir_target =
        target.is_dir() || (target.extension().is_none() && !target.exists());
    let final_path = if is_dir_target {
        let filename = format!(
            "{}-{}.json",
            slugify(&session.model),
            session.created_at.format("%Y%m%d-%H%M%S")
        );
        target.join(filename)
    } else {
        target.to_path_buf()
    };

    let resolved = normalize(&std::path::absolute(&final_path)?);
    if !is_allowed(&resolved)? {
        return Err(StorageError::PathEscape(resolved));
    }

    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(session)?;
    fs::write(&resolved, json)?;
    tracing::debug!(path = %resolved.display(), "session saved");
    Ok(resolved)
}

/// Load and validate a session from a JSON file.
pub fn load_session(path: impl AsRef<Path>) -> Result<Session, StorageError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(StorageError::NotAFile(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let session: Session = serde_json::from_str(&content)?;

    if session.schema_version > SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSchemaVersion {
            found: session.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    session.validate()?;
    Ok(session)
}

/// List session JSON files in a directory, most recently modified first.
///
/// A missing directory yields an empty list, not an error.
pub fn list_session_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, StorageError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(StorageError::NotADirectory(dir.to_path_buf()));
    }

    let mut files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") && path.is_file() {
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(std::time::UNIX_EPOCH);
            files.push((path, modified));
        }
    }
    files.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(files.into_iter().map(|(path, _)| path).collect())
}

/// Check a resolved absolute path against the allowed roots: the current
/// working directory plus the temp allowlist.
fn is_allowed(resolved: &Path) -> Result<bool, StorageError> {
    let cwd = normalize(&std::env::current_dir()?);
    if resolved.starts_with(&cwd) {
        return Ok(true);
    }
    let temp = normalize(&std::env::temp_dir());
    if resolved.starts_with(&temp) {
        return Ok(true);
    }
    Ok(TEMP_ALLOWLIST
        .iter()
        .any(|root| resolved.starts_with(root)))
}

/// Lexically resolve `.` and `..` components so traversal cannot sidestep
/// the containment check. Purely textual: the path need not exist.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Reduce a model id to a filesystem-safe slug
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;
    for ch in input.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "session".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;
    use orchat_api::{Message, Usage};
    use std::fs::OpenOptions;
    use std::time::{Duration, SystemTime};

    fn sample_session() -> Session {
        let mut session = Session::new("openai/gpt-4", Some("be brief".to_string()));
        session.turns.push(Turn {
            messages: vec![
                Message::user("q1").unwrap(),
                Message::assistant("a1").unwrap(),
            ],
            usage: Some(Usage::new(12, 34)),
            latency_ms: Some(321.0),
            cost_estimate: Some(0.002),
        });
        session.turns.push(Turn {
            messages: vec![
                Message::user("q2").unwrap(),
                Message::assistant("a2").unwrap(),
            ],
            usage: None,
            latency_ms: None,
            cost_estimate: None,
        });
        session.turns.push(Turn {
            messages: vec![
                Message::user("q3").unwrap(),
                Message::assistant("a3").unwrap(),
            ],
            usage: Some(Usage::new(56, 78)),
            latency_ms: Some(0.0),
            cost_estimate: None,
        });
        session.usage_totals = Some(session.recompute_usage_totals());
        session.budget_max = Some(5.0);
        session.estimate_usd_total = Some(0.002);
        session
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        let path = save_session(&session, dir.path()).unwrap();
        let loaded = load_session(&path).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(
            loaded.recompute_usage_totals(),
            loaded.usage_totals.unwrap()
        );
    }

    #[test]
    fn test_directory_target_synthesizes_filename() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        let path = save_session(&session, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("openai-gpt-4-"), "got {name}");
        assert!(name.ends_with(".json"));
        let stamp = session.created_at.format("%Y%m%d-%H%M%S").to_string();
        assert!(name.contains(&stamp));
    }

    #[test]
    fn test_extensionless_missing_target_becomes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mysession");
        let written = save_session(&sample_session(), &target).unwrap();
        // Not a file named "mysession": a directory holding a synthesized file
        assert!(target.is_dir());
        assert_eq!(written.parent().unwrap(), target);
        assert_eq!(written.extension().and_then(|e| e.to_str()), Some("json"));
    }

    #[test]
    fn test_explicit_file_target_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/run.json");
        let path = save_session(&sample_session(), &target).unwrap();
        assert_eq!(path, target);
        assert!(target.is_file());
    }

    #[test]
    fn test_path_escape_rejected_without_writing() {
        let err = save_session(&sample_session(), "/etc/orchat-test.json").unwrap_err();
        assert!(matches!(err, StorageError::PathEscape(_)));
        assert!(!Path::new("/etc/orchat-test.json").exists());
    }

    #[test]
    fn test_traversal_cannot_sidestep_root() {
        let dir = tempfile::tempdir().unwrap();
        let sneaky = dir
            .path()
            .join("../../../../../../etc/orchat-sneaky.json");
        // Lexical normalization lands this outside every allowed root
        let result = save_session(&sample_session(), &sneaky);
        if let Err(err) = result {
            assert!(matches!(err, StorageError::PathEscape(_)));
        } else {
            // Deep tempdirs may normalize back inside /tmp; the write must
            // then still be under an allowed root.
            let written = result.unwrap();
            assert!(TEMP_ALLOWLIST.iter().any(|r| written.starts_with(r))
                || written.starts_with(normalize(&std::env::temp_dir())));
            fs::remove_file(written).unwrap();
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_load_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(dir.path()).unwrap_err();
        assert!(matches!(err, StorageError::NotAFile(_)));
    }

    #[test]
    fn test_load_truncated_file_is_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        let path = save_session(&session, dir.path()).unwrap();
        let full = fs::read_to_string(&path).unwrap();
        fs::write(&path, &full[..full.len() / 2]).unwrap();
        let err = load_session(&path).unwrap_err();
        assert!(matches!(err, StorageError::MalformedJson(_)));
    }

    #[test]
    fn test_load_rejects_newer_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = sample_session();
        session.schema_version = SCHEMA_VERSION + 1;
        let path = dir.path().join("future.json");
        fs::write(&path, serde_json::to_string(&session).unwrap()).unwrap();
        let err = load_session(&path).unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedSchemaVersion { .. }
        ));
    }

    #[test]
    fn test_load_rejects_totals_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = sample_session();
        session.usage_totals = Some(Usage {
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
        });
        let path = dir.path().join("drifted.json");
        fs::write(&path, serde_json::to_string(&session).unwrap()).unwrap();
        let err = load_session(&path).unwrap_err();
        assert!(matches!(err, StorageError::SchemaViolation(_)));
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_session_files(&missing).unwrap().is_empty());
    }

    #[test]
    fn test_list_sorted_by_mtime_desc() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("older.json");
        let newer = dir.path().join("newer.json");
        fs::write(&older, "{}").unwrap();
        fs::write(&newer, "{}").unwrap();
        fs::write(dir.path().join("ignored.txt"), "x").unwrap();

        let base = SystemTime::now();
        OpenOptions::new()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(base - Duration::from_secs(600))
            .unwrap();
        OpenOptions::new()
            .write(true)
            .open(&newer)
            .unwrap()
            .set_modified(base)
            .unwrap();

        let files = list_session_files(dir.path()).unwrap();
        assert_eq!(files, vec![newer, older]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("openai/gpt-4"), "openai-gpt-4");
        assert_eq!(slugify("Meta: Llama 3 (8B)"), "meta-llama-3-8b");
        assert_eq!(slugify("///"), "session");
    }

    #[test]
    fn test_normalize_resolves_dot_segments() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }
}
