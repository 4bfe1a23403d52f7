//! Uploaded image storage.
//!
//! Images land on local disk under the configured upload directory and are
//! served statically from `/uploads`. Stored names are
//! `<unix-millis>-<sanitized original name>` so uploads never collide and a
//! hostile filename can never escape the directory.

use chrono::Utc;

use crate::error::ServerError;

/// Create the upload directory if it does not exist yet.
pub async fn ensure_dir(dir: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

/// Persist one uploaded image and return the public `/uploads/...` path that
/// gets stored as the message content.
pub async fn store_image(
    dir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, ServerError> {
    let filename = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_name(original_name)
    );
    let path = std::path::Path::new(dir).join(&filename);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ServerError::Internal(format!("failed to store upload: {e}")))?;
    Ok(format!("/uploads/{filename}"))
}

/// Keep only the final path component, restricted to a safe character set.
fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
