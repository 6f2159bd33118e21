// ─── Classpath Builder ───
// Joins installed library paths into the string handed to `-cp`.

use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        // Java rejects extended-length `\\?\` paths on the classpath.
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

/// Refuses an empty classpath; `java -cp ""` fails much later and less clearly.
pub fn join_classpath(entries: &[PathBuf]) -> LauncherResult<String> {
    if entries.is_empty() {
        return Err(LauncherError::Other(
            "Empty classpath: refusing to launch".into(),
        ));
    }

    Ok(entries
        .iter()
        .map(|p| safe_path_str(p))
        .collect::<Vec<_>>()
        .join(get_classpath_separator()))
}
