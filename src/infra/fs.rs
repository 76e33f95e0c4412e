//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations, such as naming
//! build directories, preserving failed builds and locating tool executables.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如命名构建目录、保留失败的构建以及查找工具可执行文件。

use anyhow::{Context, Result};
use fs_extra::dir::{CopyOptions, copy};
use std::collections::VecDeque;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory levels searched below each extra search root.
const SEARCH_DEPTH: usize = 4;
/// Upper bound on directories visited per search root.
const SEARCH_BUDGET: usize = 20_000;

/// Replaces every non-alphanumeric character so the label is safe in a file name.
pub fn sanitize_name(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(48)
        .collect();
    if sanitized.is_empty() {
        "build".to_string()
    } else {
        sanitized
    }
}

/// Copies the entire content of a source directory into a destination directory.
///
/// # Arguments
/// * `from` - Source directory path
/// * `to` - Destination directory path
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .with_context(|| format!("Failed to create directory: {}", to.display()))?;
    let mut options = CopyOptions::new();
    options.overwrite = true;
    options.content_only = true;
    copy(from, to, &options).with_context(|| {
        format!("Failed to copy {} to {}", from.display(), to.display())
    })?;
    Ok(())
}

/// Checks whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Locates an executable.
///
/// A name containing a path separator is checked as given. Otherwise every
/// `PATH` entry is tried first, then each of `search_roots` is walked
/// breadth-first (a few levels deep) for a file of that name, which finds
/// vendor installs such as `/opt/Xilinx/Vivado/<version>/bin/vivado`.
///
/// 查找可执行文件：先搜索 `PATH`，再在额外的搜索根目录下逐层查找。
pub fn find_executable(name: &str, search_roots: &[PathBuf]) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let direct = Path::new(name);
    if direct.components().count() > 1 || direct.is_absolute() {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    if let Some(path_var) = env::var_os("PATH") {
        if let Some(found) = env::split_paths(&path_var)
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
        {
            return Some(found);
        }
    }

    search_roots.iter().find_map(|root| walk_for(root, name))
}

fn walk_for(root: &Path, name: &str) -> Option<PathBuf> {
    let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);
    let mut visited = 0usize;
    while let Some((dir, depth)) = queue.pop_front() {
        visited += 1;
        if visited > SEARCH_BUDGET {
            break;
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut entries: Vec<_> = entries.flatten().collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if depth < SEARCH_DEPTH {
                    queue.push_back((path, depth + 1));
                }
            } else if entry.file_name() == name && is_executable(&path) {
                return Some(path);
            }
        }
    }
    None
}
