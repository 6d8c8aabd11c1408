/// Reduces a path reported by git to the token used inside the rule alternation.
///
/// A normalizer is a predicate (`matches`) paired with an extractor (`extract`):
/// paths the predicate accepts are reduced by the extractor, every other path
/// passes through unchanged.
pub trait FragmentNormalizer: Send + Sync {
    /// Whether `path` should be reduced by [`extract`](Self::extract)
    fn matches(&self, path: &str) -> bool;

    /// Reduce an accepted path to its fragment
    fn extract(&self, path: &str) -> String;

    /// Normalize a reported path into a fragment
    fn normalize(&self, path: &str) -> String {
        if self.matches(path) {
            self.extract(path)
        } else {
            path.to_string()
        }
    }
}

/// Normalizer keyed on a single tracked file extension.
///
/// Paths ending in `.<extension>` are reduced to their base name without
/// directory or extension (`src/Game/Player.cs` → `Player`). Git always
/// reports paths with `/` separators, so only `/` is treated as a directory
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNormalizer {
    suffix: String,
}

impl ExtensionNormalizer {
    /// Create a normalizer for `extension` (a leading dot is optional)
    pub fn new(extension: &str) -> Self {
        Self {
            suffix: format!(".{}", extension.trim_start_matches('.')),
        }
    }

    /// The tracked extension without its leading dot
    pub fn extension(&self) -> &str {
        &self.suffix[1..]
    }

    fn base_name<'a>(&self, path: &'a str) -> Option<&'a str> {
        let stem = path.strip_suffix(&self.suffix)?;
        let name = stem.rsplit('/').next().unwrap_or(stem);
        (!name.is_empty()).then_some(name)
    }
}

impl Default for ExtensionNormalizer {
    fn default() -> Self {
        Self::new("cs")
    }
}

impl FragmentNormalizer for ExtensionNormalizer {
    fn matches(&self, path: &str) -> bool {
        self.base_name(path).is_some()
    }

    fn extract(&self, path: &str) -> String {
        self.base_name(path).unwrap_or(path).to_string()
    }
}
