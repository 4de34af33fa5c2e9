//! Local counters for uploaded documents.

use crate::client::UploadReceipt;
use std::collections::VecDeque;

/// Uploads listed on the counters panel.
pub const RECENT_UPLOADS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDoc {
    pub name: String,
    pub chunks: u64,
    pub size_bytes: u64,
    pub uploaded_at: String,
}

#[derive(Debug, Default)]
pub struct UploadTracker {
    recent: VecDeque<UploadedDoc>,
    total_chunks: u64,
    total_bytes: u64,
    documents: u64,
}

impl UploadTracker {
    pub fn record(&mut self, receipt: &UploadReceipt, uploaded_at: impl Into<String>) {
        self.recent.push_front(UploadedDoc {
            name: receipt.filename.clone(),
            chunks: receipt.chunks,
            size_bytes: receipt.size_bytes,
            uploaded_at: uploaded_at.into(),
        });
        self.recent.truncate(RECENT_UPLOADS);
        self.total_chunks += receipt.chunks;
        self.total_bytes += receipt.size_bytes;
        self.documents += 1;
    }

    pub fn recent(&self) -> impl Iterator<Item = &UploadedDoc> {
        self.recent.iter()
    }

    /// One line per recent upload, newest first.
    pub fn recent_lines(&self) -> Vec<String> {
        self.recent()
            .map(|d| {
                format!(
                    "  {} | {} chunks | {} | {}",
                    d.name,
                    d.chunks,
                    format_bytes(d.size_bytes),
                    d.uploaded_at
                )
            })
            .collect()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Documents: {} | Chunks: {} | Storage: {}",
            self.documents,
            self.total_chunks,
            format_bytes(self.total_bytes)
        )
    }
}

/// Human-readable size with up to two decimals, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(name: &str, chunks: u64, size: u64) -> UploadReceipt {
        UploadReceipt {
            filename: name.into(),
            size_bytes: size,
            chunks,
        }
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10 MB");
    }

    #[test]
    fn totals_accumulate_and_recent_is_capped() {
        let mut t = UploadTracker::default();
        for i in 0..10u64 {
            t.record(&receipt(&format!("doc{i}.md"), 3, 1024), "12:00:00");
        }
        let names: Vec<_> = t.recent().map(|d| d.name.clone()).collect();
        assert_eq!(names.len(), RECENT_UPLOADS);
        assert_eq!(names[0], "doc9.md");
        assert_eq!(t.summary_line(), "Documents: 10 | Chunks: 30 | Storage: 10 KB");
    }

    #[test]
    fn recent_lines_show_name_chunks_size_and_time() {
        let mut t = UploadTracker::default();
        t.record(&receipt("policy.pdf", 12, 1536), "09:15:00");
        t.record(&receipt("faq.md", 3, 512), "09:16:30");
        assert_eq!(
            t.recent_lines(),
            vec![
                "  faq.md | 3 chunks | 512 Bytes | 09:16:30".to_string(),
                "  policy.pdf | 12 chunks | 1.5 KB | 09:15:00".to_string(),
            ]
        );
    }
}
