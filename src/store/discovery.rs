use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::models::{Session, SessionSource};
use crate::utils::{decode_project_dir, repo_name_from_cwd, validate_decoded_path};

/// Maximum number of session files to collect (prevent resource exhaustion)
const MAX_SESSIONS: usize = 100_000;

/// Where each agent keeps its JSONL transcripts, relative to the home directory
///
/// OpenCode stores one JSON document per session and is not discovered here.
const SOURCE_ROOTS: [(SessionSource, &str); 5] = [
    (SessionSource::Claude, ".claude/projects"),
    (SessionSource::Codex, ".codex/sessions"),
    (SessionSource::Gemini, ".gemini/tmp"),
    (SessionSource::Copilot, ".copilot/session-state"),
    (SessionSource::Droid, ".factory/sessions"),
];

/// Serialized markers of a tool invocation (Claude, Codex, Droid)
const TOOL_CALL_MARKERS: [&str; 8] = [
    r#""type":"tool_use""#,
    r#""type": "tool_use""#,
    r#""type":"function_call""#,
    r#""type": "function_call""#,
    r#""type":"custom_tool_call""#,
    r#""type": "custom_tool_call""#,
    r#""type":"tool_call""#,
    r#""type": "tool_call""#,
];

/// Discover sessions under a home-like directory
///
/// Looks in the known per-agent locations and returns one lightweight
/// [`Session`] per `*.jsonl` file, without parsing any of them. Each file gets
/// a substring pre-scan for tool calls (see [`count_tool_calls`]). Missing
/// agent directories are skipped.
///
/// # Errors
///
/// Returns an error if more than [`MAX_SESSIONS`] files are found.
pub fn discover_sessions(home: &Path) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();

    for (source, relative) in SOURCE_ROOTS {
        let dir = home.join(relative);
        if !dir.is_dir() {
            continue;
        }
        sessions.extend(discover_sessions_in(&dir, source)?);
        if sessions.len() > MAX_SESSIONS {
            bail!("Resource limit exceeded: found more than {} session files", MAX_SESSIONS);
        }
    }

    tracing::info!(sessions = sessions.len(), root = %home.display(), "session discovery finished");
    Ok(sessions)
}

/// Discover every `*.jsonl` transcript below `dir`, attributing it to `source`
///
/// Symlinks are not followed. Unreadable entries are logged and skipped.
pub fn discover_sessions_in(dir: &Path, source: SessionSource) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "jsonl") {
            continue;
        }

        let Some(id) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            continue;
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping session without metadata");
                continue;
            }
        };

        if sessions.len() >= MAX_SESSIONS {
            bail!("Resource limit exceeded: found more than {} session files", MAX_SESSIONS);
        }

        let modified_at = metadata.modified().map(system_time_to_utc).unwrap_or_else(|_| Utc::now());
        let mut session = Session::new(id, source, path, modified_at);
        session.file_size_bytes = Some(metadata.len());
        session.lightweight_commands = count_tool_calls(path);

        if source == SessionSource::Claude {
            session.lightweight_cwd = claude_project_cwd(dir, path);
            session.repo_name = session.lightweight_cwd.as_deref().and_then(repo_name_from_cwd);
        }

        sessions.push(session);
    }

    Ok(sessions)
}

/// Working directory encoded in the Claude project folder holding `file`
fn claude_project_cwd(projects_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(projects_dir).ok()?;
    let project = relative.components().next()?.as_os_str().to_string_lossy();
    if !project.starts_with('-') {
        return None;
    }

    let decoded = decode_project_dir(&project);
    if let Err(e) = validate_decoded_path(&decoded) {
        tracing::warn!(project = %project, error = %e, "ignoring suspicious project directory");
        return None;
    }
    Some(decoded.to_string_lossy().into_owned())
}

/// Cheap pre-scan: tool invocations counted by substring, without parsing JSON
///
/// `None` when the file cannot be read.
pub fn count_tool_calls(path: &Path) -> Option<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "tool call pre-scan skipped");
            return None;
        }
    };

    let mut count = 0;
    for line in BufReader::new(file).split(b'\n') {
        let line = line.ok()?;
        let line = String::from_utf8_lossy(&line);
        count += TOOL_CALL_MARKERS.iter().map(|marker| line.matches(marker).count()).sum::<usize>();
    }
    Some(count)
}

fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discovers_per_source_locations() {
        let home = TempDir::new().unwrap();
        write(&home.path().join(".claude/projects/-home-dev-webapp/abc.jsonl"), "{}\n");
        write(&home.path().join(".codex/sessions/2025/01/02/rollout-1.jsonl"), "{}\n{}\n");
        write(&home.path().join(".codex/sessions/notes.txt"), "ignored");

        let mut sessions = discover_sessions(home.path()).unwrap();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "abc");
        assert_eq!(sessions[0].source, SessionSource::Claude);
        assert_eq!(sessions[0].lightweight_cwd.as_deref(), Some("/home/dev/webapp"));
        assert_eq!(sessions[0].repo_name.as_deref(), Some("webapp"));
        assert_eq!(sessions[0].file_size_bytes, Some(3));

        assert_eq!(sessions[1].id, "rollout-1");
        assert_eq!(sessions[1].source, SessionSource::Codex);
        assert_eq!(sessions[1].lightweight_cwd, None);
        assert!(sessions.iter().all(|s| !s.is_parsed()));
    }

    #[test]
    fn test_missing_agent_dirs_are_empty() {
        let home = TempDir::new().unwrap();
        assert!(discover_sessions(home.path()).unwrap().is_empty());
    }

    #[test]
    fn test_traversal_project_dir_ignored() {
        let projects = TempDir::new().unwrap();
        write(&projects.path().join("-a%2F..%2Fetc/x.jsonl"), "{}\n");

        let sessions = discover_sessions_in(projects.path(), SessionSource::Claude).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].lightweight_cwd, None);
    }

    #[test]
    fn test_tool_call_hint_counted_during_discovery() {
        let home = TempDir::new().unwrap();
        let claude = home.path().join(".claude/projects/-home-dev-api/tools.jsonl");
        write(
            &claude,
            concat!(
                r#"{"type":"user","message":{"content":"run the tests"}}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"},{"type":"tool_use","name":"Read"}]}}"#,
                "\n",
                r#"{"type":"user","message":{"content":[{"type":"tool_result","content":"ok"}]}}"#,
                "\n",
            ),
        );
        let codex = home.path().join(".codex/sessions/2025/06/01/rollout-t.jsonl");
        write(
            &codex,
            concat!(
                r#"{"type":"response_item","payload":{"type":"function_call","name":"shell"}}"#,
                "\n",
                r#"{"type":"response_item","payload":{"type":"function_call_output","output":"x"}}"#,
                "\n",
            ),
        );
        write(&home.path().join(".claude/projects/-home-dev-api/chat.jsonl"), "{\"type\":\"user\"}\n");

        let mut sessions = discover_sessions(home.path()).unwrap();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        let hints: Vec<_> = sessions.iter().map(|s| (s.id.as_str(), s.lightweight_commands)).collect();
        assert_eq!(hints, [("chat", Some(0)), ("rollout-t", Some(1)), ("tools", Some(2))]);
        assert!(sessions.iter().find(|s| s.id == "tools").unwrap().hints_tool_output());
        assert!(!sessions.iter().find(|s| s.id == "chat").unwrap().hints_tool_output());
    }

    #[test]
    fn test_copilot_and_droid_locations() {
        let home = TempDir::new().unwrap();
        write(&home.path().join(".copilot/session-state/c1.jsonl"), "{}\n");
        write(&home.path().join(".factory/sessions/-work-app/d1.jsonl"), "{}\n");
        write(&home.path().join(".local/share/opencode/storage/session/ses_1.json"), "{}");

        let mut sessions = discover_sessions(home.path()).unwrap();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        let found: Vec<_> = sessions.iter().map(|s| (s.id.as_str(), s.source)).collect();
        assert_eq!(found, [("c1", SessionSource::Copilot), ("d1", SessionSource::Droid)]);
    }

    #[test]
    fn test_unreadable_file_has_no_tool_hint() {
        let dir = TempDir::new().unwrap();
        assert_eq!(count_tool_calls(&dir.path().join("missing.jsonl")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_skipped() {
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("real.jsonl");
        write(&target, "{}\n");

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.jsonl")).unwrap();

        let sessions = discover_sessions_in(dir.path(), SessionSource::Codex).unwrap();
        assert!(sessions.is_empty());
    }
}
