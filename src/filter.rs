use std::path::Path;
// Walk-time exclude filtering (rsync-style name patterns)

/// Exclude patterns applied during the source walk
pub struct ExcludeFilter {
    pub exclude_files: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl Default for ExcludeFilter {
    fn default() -> Self {
        Self {
            exclude_files: Vec::new(),
            exclude_dirs: Vec::new(),
        }
    }
}

impl ExcludeFilter {
    /// Check if a regular file should be packed
    pub fn include_file(&self, path: &Path) -> bool {
        let filename = path.file_name().unwrap_or_default().to_string_lossy();
        for pattern in &self.exclude_files {
            if glob_match(pattern, &filename) {
                return false;
            }
        }
        true
    }

    /// Check if a directory should be descended into
    pub fn include_dir(&self, path: &Path) -> bool {
        for pattern in &self.exclude_dirs {
            // Match against any path component (like rsync/robocopy)
            for component in path.components() {
                if let Some(component_str) = component.as_os_str().to_str() {
                    if glob_match(pattern, component_str) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Simple glob matching (supports * wildcards)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if pattern.contains('*') {
        if pattern.starts_with('*') && pattern.ends_with('*') {
            let middle = &pattern[1..pattern.len() - 1];
            return text.contains(middle);
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            return text.ends_with(suffix);
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            return text.starts_with(prefix);
        }
    }

    pattern == text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_glob_match_wildcards() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("*.tmp", "scratch.tmp"));
        assert!(!glob_match("*.tmp", "scratch.txt"));
        assert!(glob_match("cache*", "cache_v2"));
        assert!(glob_match("*cache*", "page_cache_v2"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "inexact"));
    }

    #[test]
    fn test_dir_exclusion_matches_components() {
        let filter = ExcludeFilter {
            exclude_files: Vec::new(),
            exclude_dirs: vec!["node_modules".to_string()],
        };
        assert!(!filter.include_dir(&PathBuf::from("src/node_modules/pkg")));
        assert!(filter.include_dir(&PathBuf::from("src/modules/pkg")));
    }

    #[test]
    fn test_default_filter_includes_everything() {
        let filter = ExcludeFilter::default();
        assert!(filter.include_file(&PathBuf::from("a/b/c.bin")));
        assert!(filter.include_dir(&PathBuf::from("a/b")));
    }
}
