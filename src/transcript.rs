//! Claude Code JSONL transcript reader.
//!
//! The `Stop` hook event carries a `transcript_path`; the last assistant
//! message from that transcript enriches the summary input in local mode and
//! is shipped untruncated in the remote-legacy payload.

use std::fs;
use std::path::Path;

use tracing::warn;

/// Extract the last assistant text message, truncated to `max_chars`.
///
/// Walks the file backwards to find the most recent assistant entry with a
/// non-empty text block. Unparseable lines are skipped.
pub fn extract_last_assistant_text(transcript_path: &Path, max_chars: usize) -> Option<String> {
    extract(transcript_path).map(|text| text.chars().take(max_chars).collect())
}

/// Full, untruncated variant used by the remote-legacy rich payload.
pub fn extract_full_assistant_text(transcript_path: &Path) -> Option<String> {
    extract(transcript_path)
}

fn extract(transcript_path: &Path) -> Option<String> {
    let contents = match fs::read_to_string(transcript_path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read transcript {}: {e}", transcript_path.display());
            return None;
        }
    };

    for line in contents.lines().rev() {
        let entry: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if entry.get("type").and_then(|t| t.as_str()) != Some("assistant") {
            continue;
        }

        let blocks = entry
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array());

        if let Some(blocks) = blocks {
            for block in blocks {
                if block.get("type").and_then(|t| t.as_str()) != Some("text") {
                    continue;
                }
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_transcript(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn finds_last_assistant_text() {
        let file = write_transcript(&[
            r#"{"type":"user","message":{"content":[{"type":"text","text":"do it"}]}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"First answer."}]}}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Final answer."}]}}"#,
        ]);
        let text = extract_last_assistant_text(file.path(), 2000).unwrap();
        assert_eq!(text, "Final answer.");
    }

    #[test]
    fn truncates_to_max_chars() {
        let file = write_transcript(&[
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"abcdefgh"}]}}"#,
        ]);
        let text = extract_last_assistant_text(file.path(), 4).unwrap();
        assert_eq!(text, "abcd");
    }

    #[test]
    fn skips_malformed_and_tool_blocks() {
        let file = write_transcript(&[
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Kept."}]}}"#,
            "not json at all",
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Edit"}]}}"#,
        ]);
        let text = extract_full_assistant_text(file.path()).unwrap();
        assert_eq!(text, "Kept.");
    }

    #[test]
    fn missing_file_is_none() {
        assert!(extract_full_assistant_text(Path::new("/nonexistent/t.jsonl")).is_none());
    }
}
