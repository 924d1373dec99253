use std::borrow::Cow;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use percent_encoding::percent_decode_str;

/// Decodes a Claude project directory name back to the working directory it stands for
///
/// Two encodings are in the wild: the percent-encoded form (`-Users%2Ffoo%2Fbar`)
/// and the older dash form (`-Users-foo-bar`), where every separator became `-`.
/// The dash form is lossy; a directory name that contained `-` decodes to nested
/// components.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use agent_session_search::utils::decode_project_dir;
///
/// assert_eq!(decode_project_dir("-Users%2Ffoo%2Fbar"), PathBuf::from("/Users/foo/bar"));
/// assert_eq!(decode_project_dir("-Users-foo-bar"), PathBuf::from("/Users/foo/bar"));
/// ```
pub fn decode_project_dir(encoded: &str) -> PathBuf {
    let without_prefix = encoded.strip_prefix('-').unwrap_or(encoded);

    if without_prefix.contains('%') {
        let decoded = percent_decode_str(without_prefix).decode_utf8_lossy();
        return PathBuf::from(format!("/{}", decoded));
    }

    PathBuf::from(format!("/{}", without_prefix.replace('-', "/")))
}

/// Rejects decoded paths that are relative or contain `..` components
pub fn validate_decoded_path(path: &Path) -> Result<()> {
    if path.components().any(|c| c == Component::ParentDir) {
        bail!("Path contains '..' component: {}", path.display());
    }

    if !path.is_absolute() {
        bail!("Path must be absolute: {}", path.display());
    }

    Ok(())
}

/// Size of a file on disk, `None` when it cannot be read
pub fn file_size_on_disk(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Last path component, used as a repository name guess for a working directory
pub fn repo_name_from_cwd(cwd: &str) -> Option<String> {
    Path::new(cwd)
        .components()
        .rev()
        .find_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .filter(|name| !name.is_empty())
}

/// Formats a path with ~ substitution for the home directory
pub fn format_path_with_tilde(path: &Path) -> String {
    format_path_with_tilde_internal(path, None)
}

pub(crate) fn format_path_with_tilde_internal(path: &Path, home_override: Option<&str>) -> String {
    let home_from_env = env::var("HOME").ok();
    let home = home_override.or(home_from_env.as_deref());

    let path_str = path.to_string_lossy();
    if let Some(home) = home
        && !home.is_empty()
        && path_str.starts_with(home)
    {
        return path_str.replacen(home, "~", 1);
    }

    match path_str {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}
