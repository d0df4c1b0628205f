//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
///
/// Leading `..` components of a relative path are kept, so `../../etc`
/// stays `../../etc` instead of collapsing into `etc`.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::ParentDir) | Some(Component::CurDir) | None => {
                    result.push(component);
                }
            },
            _ => result.push(component),
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
/// Returns true if `path` is under `dir` (i.e., `dir` is a prefix of `path`).
///
/// # Security
/// This function normalizes paths to prevent directory traversal attacks.
/// For example, `/srv/app/../../etc/passwd` is NOT under `/srv/app`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }
    if path_components.first() == Some(&Component::ParentDir)
        && dir_components.first() != Some(&Component::ParentDir)
    {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Calculate the relative path from a directory to a target path.
///
/// For example, with `from_dir` `/work` and `to_path` `/work/conf/app.yaml`
/// this returns `conf/app.yaml`.
///
/// Returns `None` if a relative path cannot be computed (e.g., different drive letters on Windows).
pub fn relative_path_from_dir(from_dir: &Path, to_path: &Path) -> Option<PathBuf> {
    let result = pathdiff::diff_paths(to_path, from_dir)?;

    if result.is_absolute() {
        return None;
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_dot() {
        assert_eq!(
            normalize_path(Path::new("/usr/./local/./bin")),
            PathBuf::from("/usr/local/bin")
        );
    }

    #[test]
    fn test_normalize_path_multiple_parent_dirs() {
        assert_eq!(
            normalize_path(Path::new("/usr/local/bin/../../lib")),
            PathBuf::from("/usr/lib")
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_normalize_path_parent_at_root() {
        assert_eq!(
            normalize_path(Path::new("/usr/../../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[test]
    fn test_normalize_path_relative() {
        assert_eq!(
            normalize_path(Path::new("foo/bar/../baz")),
            PathBuf::from("foo/baz")
        );
    }

    #[test]
    fn test_normalize_path_keeps_leading_parents() {
        assert_eq!(
            normalize_path(Path::new("../../etc")),
            PathBuf::from("../../etc")
        );
        assert_eq!(
            normalize_path(Path::new("a/../../b")),
            PathBuf::from("../b")
        );
    }

    #[test]
    fn test_normalize_path_only_dots() {
        assert_eq!(normalize_path(Path::new("./././.")), PathBuf::from(""));
    }

    #[test]
    fn test_is_path_under_simple() {
        assert!(is_path_under(
            Path::new("/srv/app/conf/file"),
            Path::new("/srv/app")
        ));
        assert!(is_path_under(Path::new("/srv/app"), Path::new("/srv/app")));
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        assert!(!is_path_under(
            Path::new("/srv/app-extra/bin"),
            Path::new("/srv/app")
        ));
    }

    #[test]
    fn test_is_path_under_directory_traversal_attack() {
        assert!(!is_path_under(
            Path::new("/srv/app/bin/../../../etc/passwd"),
            Path::new("/srv/app")
        ));
    }

    #[test]
    fn test_is_path_under_relative_traversal() {
        assert!(!is_path_under(Path::new("./../../x"), Path::new(".")));
        assert!(is_path_under(Path::new("./a/../b"), Path::new(".")));
    }

    #[test]
    fn test_relative_path_from_dir() {
        assert_eq!(
            relative_path_from_dir(Path::new("/work"), Path::new("/work/conf/app.yaml")),
            Some(PathBuf::from("conf/app.yaml"))
        );
        assert_eq!(
            relative_path_from_dir(Path::new("/work"), Path::new("/other/file")),
            Some(PathBuf::from("../other/file"))
        );
    }
}
