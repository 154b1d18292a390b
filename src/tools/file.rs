//! File-system capabilities
//!
//! Every function returns `Result<String, String>`: the Ok side is the text
//! folded into the reply, the Err side a failure description the dispatcher
//! reports. Nothing here panics or aborts the turn.

use std::path::{Path, PathBuf};

/// Character cap for file contents folded into a reply
const READ_CHAR_LIMIT: usize = 5_000;

/// Refuse to read files bigger than this
const READ_SIZE_LIMIT: u64 = 2_000_000;

/// Directory listing cap
const LIST_LIMIT: usize = 40;

/// Search result cap
const SEARCH_LIMIT: usize = 50;

type ToolOutput = Result<String, String>;

/// Expand a leading `~` to the user's home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

/// Read a file's contents, truncated for spoken replies
pub fn read_file(path: &str) -> ToolOutput {
    let resolved = expand_path(path);

    if !resolved.exists() {
        return Err(not_found_with_suggestions(&resolved, path));
    }

    let size = std::fs::metadata(&resolved)
        .map_err(|e| format!("cannot stat {path}: {e}"))?
        .len();
    if size > READ_SIZE_LIMIT {
        return Err(format!("file too large (>2MB): {path}"));
    }

    let bytes = std::fs::read(&resolved).map_err(|e| format!("cannot read {path}: {e}"))?;
    let mut content = String::from_utf8_lossy(&bytes).into_owned();

    if let Some((cut, _)) = content.char_indices().nth(READ_CHAR_LIMIT) {
        content.truncate(cut);
        content.push_str("\n\n... (truncated, file has more content)");
    }

    Ok(format!("{path}:\n\n{content}"))
}

/// Create or overwrite a file
pub fn write_file(path: &str, content: &str) -> ToolOutput {
    let resolved = expand_path(path);

    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("cannot create {path}: {e}"))?;
    }
    std::fs::write(&resolved, content).map_err(|e| format!("cannot write {path}: {e}"))?;

    let lines = content.lines().count().max(1);
    let preview: String = content.chars().take(50).collect();
    Ok(format!(
        "Created {} ({} chars, {lines} lines). Preview: {}",
        resolved.display(),
        content.len(),
        preview.replace('\n', " ")
    ))
}

/// Append to an existing file
pub fn append_to_file(path: &str, content: &str) -> ToolOutput {
    use std::io::Write;

    let resolved = expand_path(path);
    if !resolved.exists() {
        return Err(format!(
            "file not found: {path} (use write_file to create it first)"
        ));
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&resolved)
        .map_err(|e| format!("cannot open {path}: {e}"))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("cannot append to {path}: {e}"))?;

    Ok(format!("Appended {} characters to {path}", content.len()))
}

/// List a directory's folders and files
pub fn list_files(directory: &str) -> ToolOutput {
    let resolved = expand_path(directory);

    if !resolved.exists() {
        return Err(format!("directory not found: {directory}"));
    }
    if !resolved.is_dir() {
        return Err(format!("not a directory: {directory}"));
    }

    let mut folders = Vec::new();
    let mut files = Vec::new();

    let entries =
        std::fs::read_dir(&resolved).map_err(|e| format!("cannot list {directory}: {e}"))?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry.metadata() {
            Ok(meta) if meta.is_dir() => folders.push(format!("  {name}/")),
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .map(|t| {
                        chrono::DateTime::<chrono::Local>::from(t)
                            .format("%Y-%m-%d")
                            .to_string()
                    })
                    .unwrap_or_default();
                files.push(format!("  {name} ({}, {modified})", format_size(meta.len())));
            }
            Err(_) => {}
        }
    }
    folders.sort();
    files.sort();

    let total = folders.len() + files.len();
    if total == 0 {
        return Ok(format!("{}: empty directory", resolved.display()));
    }

    let mut out = format!("{}:\n", resolved.display());
    if !folders.is_empty() {
        out.push_str("Folders:\n");
        out.push_str(&folders[..folders.len().min(LIST_LIMIT)].join("\n"));
        out.push('\n');
    }
    if !files.is_empty() {
        out.push_str("Files:\n");
        out.push_str(&files[..files.len().min(LIST_LIMIT)].join("\n"));
        out.push('\n');
    }
    if total > LIST_LIMIT {
        out.push_str(&format!("... and more ({total} items total)\n"));
    }

    Ok(out.trim_end().to_string())
}

/// Delete a single file (never a directory)
pub fn delete_file(path: &str) -> ToolOutput {
    let resolved = expand_path(path);

    if !resolved.exists() {
        return Err(format!("file not found: {path}"));
    }
    if resolved.is_dir() {
        return Err(format!("cannot delete a directory with delete_file: {path}"));
    }

    std::fs::remove_file(&resolved).map_err(|e| format!("cannot delete {path}: {e}"))?;
    Ok(format!("Deleted {path}"))
}

/// Move a file; a directory destination keeps the original name
pub fn move_file(source: &str, destination: &str) -> ToolOutput {
    let src = expand_path(source);
    let mut dst = expand_path(destination);

    if !src.exists() {
        return Err(format!("source not found: {source}"));
    }
    if dst.is_dir() {
        if let Some(name) = src.file_name() {
            dst = dst.join(name);
        }
    }

    if std::fs::rename(&src, &dst).is_err() {
        // Cross-device move: copy then remove
        std::fs::copy(&src, &dst).map_err(|e| format!("cannot move {source}: {e}"))?;
        std::fs::remove_file(&src).map_err(|e| format!("cannot remove {source}: {e}"))?;
    }

    Ok(format!("Moved {source} to {}", dst.display()))
}

/// Rename a file in place (or to a full path if one is given)
pub fn rename_file(path: &str, new_name: &str) -> ToolOutput {
    let src = expand_path(path);
    if !src.exists() {
        return Err(format!("file not found: {path}"));
    }

    let dst = if new_name.contains('/') || new_name.contains('\\') {
        expand_path(new_name)
    } else {
        src.parent()
            .map_or_else(|| PathBuf::from(new_name), |p| p.join(new_name))
    };

    std::fs::rename(&src, &dst).map_err(|e| format!("cannot rename {path}: {e}"))?;
    Ok(format!("Renamed {path} to {}", dst.display()))
}

/// Create a folder (and any missing parents)
pub fn create_folder(path: &str) -> ToolOutput {
    let resolved = expand_path(path);
    std::fs::create_dir_all(&resolved).map_err(|e| format!("cannot create {path}: {e}"))?;
    Ok(format!("Created folder {}", resolved.display()))
}

/// Recursively search a directory for file names containing `pattern`
pub fn search_files(directory: &str, pattern: &str) -> ToolOutput {
    let root = expand_path(directory);
    if !root.exists() {
        return Err(format!("directory not found: {directory}"));
    }

    let needle = pattern.to_lowercase();
    let mut matches = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(dir) = stack.pop() {
        if matches.len() >= SEARCH_LIMIT {
            break;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if name.contains(&needle) {
                matches.push(path.display().to_string());
                if matches.len() >= SEARCH_LIMIT {
                    break;
                }
            }
        }
    }

    if matches.is_empty() {
        return Ok(format!("No files matching '{pattern}' in {directory}"));
    }

    matches.sort();
    let shown = matches.len().min(30);
    let mut out = format!("Found {} file(s) matching '{pattern}':\n", matches.len());
    out.push_str(&matches[..shown].join("\n"));
    if matches.len() > shown {
        out.push_str(&format!("\n... and {} more", matches.len() - shown));
    }
    Ok(out)
}

/// Size and timestamps for one path
pub fn file_info(path: &str) -> ToolOutput {
    let resolved = expand_path(path);
    if !resolved.exists() {
        return Err(format!("file not found: {path}"));
    }

    let meta = std::fs::metadata(&resolved).map_err(|e| format!("cannot stat {path}: {e}"))?;
    let kind = if meta.is_dir() { "directory" } else { "file" };
    let modified = meta
        .modified()
        .map(|t| {
            chrono::DateTime::<chrono::Local>::from(t)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| "unknown".to_string());

    Ok(format!(
        "{}: {kind}, {}, modified {modified}",
        resolved.display(),
        format_size(meta.len())
    ))
}

fn not_found_with_suggestions(resolved: &Path, original: &str) -> String {
    let similar: Vec<String> = resolved
        .parent()
        .and_then(|parent| {
            let stem = resolved.file_stem()?.to_string_lossy().to_lowercase();
            let entries = std::fs::read_dir(parent).ok()?;
            Some(
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|name| name.to_lowercase().contains(&stem))
                    .take(5)
                    .collect(),
            )
        })
        .unwrap_or_default();

    if similar.is_empty() {
        format!("file not found: {original}")
    } else {
        format!(
            "file not found: {original} (similar: {})",
            similar.join(", ")
        )
    }
}

/// Human-readable byte size
fn format_size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} TB")
}
