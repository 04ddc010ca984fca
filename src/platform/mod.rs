//! Host integration points used by front-ends.
//!
//! The pipeline itself never depends on these; a front-end asks them for a
//! default and falls back to explicit user input when they have none.

use std::path::{Path, PathBuf};

/// Resolves a default output root for an input directory.
pub trait OutputLocator {
    /// Output root for `input_root`, or `None` when no sensible default exists.
    fn output_root_for(&self, input_root: &Path) -> Option<PathBuf>;
}

/// Places output next to the input directory as `output_<input name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingOutputLocator;

impl OutputLocator for SiblingOutputLocator {
    fn output_root_for(&self, input_root: &Path) -> Option<PathBuf> {
        let name = input_root.file_name()?.to_string_lossy();
        let parent = input_root.parent().unwrap_or_else(|| Path::new(""));
        Some(parent.join(format!("output_{}", name)))
    }
}

/// Places output as `output_<input name>` under a fixed base directory.
#[derive(Debug, Clone)]
pub struct BaseDirOutputLocator {
    pub base: PathBuf,
}

impl OutputLocator for BaseDirOutputLocator {
    fn output_root_for(&self, input_root: &Path) -> Option<PathBuf> {
        let name = input_root.file_name()?.to_string_lossy();
        Some(self.base.join(format!("output_{}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_locator() {
        let locator = SiblingOutputLocator;
        assert_eq!(
            locator.output_root_for(Path::new("/data/session_04")),
            Some(PathBuf::from("/data/output_session_04"))
        );
        assert_eq!(
            locator.output_root_for(Path::new("logs")),
            Some(PathBuf::from("output_logs"))
        );
        assert_eq!(locator.output_root_for(Path::new("/")), None);
    }

    #[test]
    fn test_base_dir_locator() {
        let locator = BaseDirOutputLocator {
            base: PathBuf::from("/home/user/Downloads"),
        };
        assert_eq!(
            locator.output_root_for(Path::new("/mnt/c/runs/day1")),
            Some(PathBuf::from("/home/user/Downloads/output_day1"))
        );
    }
}
