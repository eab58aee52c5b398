//! Helpers shared by the classdrop command-line client.

use anyhow::Context;
use classdrop_core::{SourceFile, TaskStatus, UploadTask};
use std::path::Path;

const NAME_WIDTH: usize = 32;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// One status line for a task.
pub fn render_task_line(task: &UploadTask) -> String {
    let name = truncate_string(&task.name, NAME_WIDTH);
    let detail = match task.status {
        TaskStatus::Uploading => format!("{:>3.0}%", task.progress_percent),
        TaskStatus::Completed => task.public_url.clone().unwrap_or_default(),
        TaskStatus::Rejected | TaskStatus::Failed => task
            .error
            .as_ref()
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_default(),
        _ => String::new(),
    };
    let line = format!(
        "{:<w$} {:<10} {}",
        name,
        task.status.to_string(),
        detail,
        w = NAME_WIDTH
    );
    line.trim_end().to_string()
}

/// Read a file from disk into a source file named after its final path component.
pub async fn read_source_file(path: &Path) -> anyhow::Result<SourceFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SourceFile::new(name, "", data))
}

/// True when every task finished successfully.
pub fn all_completed(tasks: &[UploadTask]) -> bool {
    tasks.iter().all(|t| t.status == TaskStatus::Completed)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
