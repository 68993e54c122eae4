use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// Durable history of submitted input lines with recall navigation.
///
/// The cursor ranges over [0, N] where N is the number of stored lines.
/// Position N is the sentinel: "not recalling, the input box holds a fresh
/// draft". Moving backward off the sentinel snapshots the draft so that
/// walking forward again restores it exactly.
pub struct LineHistory {
    lines: Vec<String>,
    cursor: usize,
    draft: String,
    file: File,
}

impl LineHistory {
    /// Open (or create) the backing file and load all previously submitted
    /// lines. The cursor starts at the sentinel.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("could not open line history at {}", path.display()))?;

        let mut lines = Vec::new();
        for line in BufReader::new(&file).lines() {
            let line = line.context("could not read line history")?;
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        let cursor = lines.len();
        Ok(Self {
            lines,
            cursor,
            draft: String::new(),
            file,
        })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Move the cursor one step backward (negative) or forward (positive),
    /// clamped to [0, N], and return the input box content for the new
    /// position. `current` is the live input content, snapshotted as the
    /// draft when stepping backward off the sentinel.
    pub fn recall(&mut self, direction: i32, current: &str) -> String {
        let n = self.lines.len();
        if direction < 0 {
            if self.cursor == n {
                self.draft = current.to_string();
            }
            self.cursor = self.cursor.saturating_sub(1);
        } else {
            self.cursor = (self.cursor + 1).min(n);
        }

        if self.cursor == n {
            self.draft.clone()
        } else {
            self.lines[self.cursor].clone()
        }
    }

    /// Record a submitted line. Whitespace-only text is a no-op. The line is
    /// appended to the backing file before this returns; the cursor resets
    /// to the new sentinel.
    pub fn submit(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        writeln!(self.file, "{}", text).context("could not append to line history")?;
        self.file.flush()?;

        self.lines.push(text.to_string());
        self.cursor = self.lines.len();
        self.draft.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_in(dir: &tempfile::TempDir) -> LineHistory {
        LineHistory::open(&dir.path().join("lines.txt")).unwrap()
    }

    #[test]
    fn submit_appends_to_file_and_resets_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = open_in(&dir);

        history.submit("hello").unwrap();
        history.submit("  world  ").unwrap();

        let contents = std::fs::read_to_string(dir.path().join("lines.txt")).unwrap();
        assert_eq!(contents, "hello\nworld\n");
        assert_eq!(history.len(), 2);
        assert_eq!(history.recall(-1, ""), "world");
    }

    #[test]
    fn whitespace_only_submit_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = open_in(&dir);

        history.submit("   ").unwrap();
        history.submit("").unwrap();

        assert!(history.is_empty());
        let contents = std::fs::read_to_string(dir.path().join("lines.txt")).unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn reopen_restores_lines_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        std::fs::write(&path, "first\n  second  \n\nthird\n").unwrap();

        let mut history = LineHistory::open(&path).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.recall(-1, ""), "third");
        assert_eq!(history.recall(-1, ""), "second");
        assert_eq!(history.recall(-1, ""), "first");
    }

    #[test]
    fn recall_is_clamped_at_both_ends() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = open_in(&dir);
        history.submit("only").unwrap();

        assert_eq!(history.recall(-1, ""), "only");
        assert_eq!(history.recall(-1, ""), "only");
        assert_eq!(history.recall(1, ""), "");
        assert_eq!(history.recall(1, ""), "");
    }

    #[test]
    fn recall_round_trip_restores_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = open_in(&dir);
        for line in ["one", "two", "three"] {
            history.submit(line).unwrap();
        }

        let mut content = "unsent draft".to_string();
        for _ in 0..3 {
            content = history.recall(-1, &content);
        }
        assert_eq!(content, "one");
        for _ in 0..3 {
            content = history.recall(1, &content);
        }
        assert_eq!(content, "unsent draft");
    }

    #[test]
    fn recall_round_trip_restores_empty_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = open_in(&dir);
        history.submit("stored").unwrap();

        let back = history.recall(-1, "");
        assert_eq!(back, "stored");
        assert_eq!(history.recall(1, &back), "");
    }

    #[test]
    fn recall_with_no_lines_keeps_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = open_in(&dir);

        assert_eq!(history.recall(-1, "typing"), "typing");
        assert_eq!(history.recall(1, "typing"), "typing");
    }
}
