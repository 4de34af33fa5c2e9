use crate::model::HistoryEntry;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Clipboard worker channel, started on first copy.
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// File name for an exported history entry, e.g. `querio-09-15-00-how-many-customers.json`.
pub fn export_file_name(entry: &HistoryEntry) -> String {
    let mut slug = String::new();
    for c in entry.question.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 32 {
            break;
        }
    }
    let slug = slug.trim_matches('-');
    let time = entry.answered_at.replace(':', "-");
    if slug.is_empty() {
        format!("querio-{time}.json")
    } else {
        format!("querio-{time}-{slug}.json")
    }
}

/// Write `entry` as pretty JSON under `dir`. Returns the written path.
pub fn export_entry_json_to(dir: &Path, entry: &HistoryEntry) -> Result<PathBuf> {
    let path = dir.join(export_file_name(entry));
    let body = serde_json::to_string_pretty(entry).context("encode history entry")?;
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Export to the working directory.
pub fn export_entry_json(entry: &HistoryEntry) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("get current directory")?;
    export_entry_json_to(&current_dir, entry)
}

fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        // X11/Wayland serve the selection from this process; hold it
                        // long enough for clipboard managers to take a copy.
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerResult, Route, StructuredEvidence};

    fn entry(question: &str) -> HistoryEntry {
        HistoryEntry {
            question: question.into(),
            answered_at: "09:15:00".into(),
            result: AnswerResult {
                route: Route::Sql.into(),
                narrative: String::new(),
                structured_evidence: Some(StructuredEvidence::default()),
                document_evidence: None,
            },
        }
    }

    #[test]
    fn file_name_is_slugged() {
        assert_eq!(
            export_file_name(&entry("How many customers?")),
            "querio-09-15-00-how-many-customers.json"
        );
        assert_eq!(export_file_name(&entry("???")), "querio-09-15-00.json");
    }

    #[test]
    fn exports_wire_shaped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_entry_json_to(dir.path(), &entry("count")).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(v["question"], "count");
        assert_eq!(v["result"]["route"], "SQL");
    }
}
