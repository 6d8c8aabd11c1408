use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Default directory (next to the workspace file) holding per-workspace editor state
pub const DEFAULT_META_DIR: &str = ".meta";

/// Default name of the tab-coloring rules file
pub const DEFAULT_RULES_FILE: &str = "rules.txt";

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Workspace file {0} has no parent directory")]
    NoParent(Utf8PathBuf),

    #[error("Workspace file {0} has no file name")]
    NoName(Utf8PathBuf),
}

/// A workspace (solution) file and the locations derived from it.
///
/// The working-tree root is the directory containing the workspace file. The
/// rules file lives at `<workspace-dir>/<meta-dir>/<workspace-name>/<rules-file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: Utf8PathBuf,
    name: String,
}

impl Workspace {
    pub fn from_file(workspace_file: &Utf8Path) -> Result<Self, WorkspaceError> {
        let name = workspace_file
            .file_stem()
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| WorkspaceError::NoName(workspace_file.to_path_buf()))?;

        let root = match workspace_file.parent() {
            Some(parent) if parent.as_str().is_empty() => Utf8PathBuf::from("."),
            Some(parent) => parent.to_path_buf(),
            None => return Err(WorkspaceError::NoParent(workspace_file.to_path_buf())),
        };

        Ok(Self {
            root,
            name: name.to_string(),
        })
    }

    /// Directory the status queries run in
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Workspace file name without extension
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the rules file for this workspace
    pub fn rules_path(&self, meta_dir: &str, rules_file: &str) -> Utf8PathBuf {
        self.root.join(meta_dir).join(&self.name).join(rules_file)
    }

    /// Default directory for `tabsync.yaml`
    pub fn default_config_dir(&self, meta_dir: &str) -> Utf8PathBuf {
        self.root.join(meta_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_path_derivation() {
        let workspace = Workspace::from_file(Utf8Path::new("/projects/Game/Game.sln")).unwrap();

        assert_eq!(workspace.root(), Utf8Path::new("/projects/Game"));
        assert_eq!(workspace.name(), "Game");
        assert_eq!(
            workspace.rules_path(DEFAULT_META_DIR, DEFAULT_RULES_FILE),
            Utf8PathBuf::from("/projects/Game/.meta/Game/rules.txt")
        );
    }

    #[test]
    fn test_relative_file_uses_current_dir() {
        let workspace = Workspace::from_file(Utf8Path::new("Tools.sln")).unwrap();

        assert_eq!(workspace.root(), Utf8Path::new("."));
        assert_eq!(
            workspace.rules_path(".vs", "ColorByRegexConfig.txt"),
            Utf8PathBuf::from("./.vs/Tools/ColorByRegexConfig.txt")
        );
    }

    #[test]
    fn test_root_path_rejected() {
        assert!(matches!(
            Workspace::from_file(Utf8Path::new("/")),
            Err(WorkspaceError::NoName(_))
        ));
    }

    #[test]
    fn test_default_config_dir() {
        let workspace = Workspace::from_file(Utf8Path::new("/w/App.code-workspace")).unwrap();
        assert_eq!(workspace.default_config_dir(".meta"), Utf8PathBuf::from("/w/.meta"));
    }
}
