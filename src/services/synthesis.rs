use std::fmt;

/// Marker line delimiting the managed block in the rules file
pub const DEFAULT_MARKER: &str = "//TabsColorTag";

/// Ordered fragments collected during one sync run.
///
/// Modified-file fragments come first, then untracked-file fragments, each in
/// the order git emitted them. Order is significant: the synthesized pattern
/// joins fragments exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSet {
    fragments: Vec<String>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; empty fragments are ignored
    pub fn push(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if !fragment.is_empty() {
            self.fragments.push(fragment);
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(String::as_str)
    }

    /// Join the fragments into the body of a regex alternation
    pub fn join(&self, separator: &str) -> String {
        self.fragments.join(separator)
    }
}

impl<S: Into<String>> FromIterator<S> for FragmentSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for FragmentSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for fragment in iter {
            self.push(fragment);
        }
    }
}

/// A synthesized rule wrapped in its marker lines: `MARKER\n<pattern>\nMARKER`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexBlock {
    text: String,
    pattern_start: usize,
    pattern_end: usize,
}

impl RegexBlock {
    fn new(marker: &str, pattern: &str) -> Self {
        let text = format!("{marker}\n{pattern}\n{marker}");
        let pattern_start = marker.len() + 1;
        Self {
            pattern_start,
            pattern_end: pattern_start + pattern.len(),
            text,
        }
    }

    /// The full block including both marker lines
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The rule line between the markers
    pub fn pattern(&self) -> &str {
        &self.text[self.pattern_start..self.pattern_end]
    }
}

impl fmt::Display for RegexBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds the managed rule block from a fragment set.
///
/// The rule has the shape `^.*(?:a|b|c)\.<ext>$`. Fragments are inserted
/// verbatim unless `escape_fragments` is set, so a fragment containing regex
/// metacharacters changes the meaning of the rule. An empty set yields an empty
/// alternation (`^.*(?:)\.cs$`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSynthesizer {
    marker: String,
    extension: String,
    escape_fragments: bool,
}

impl BlockSynthesizer {
    pub fn new(marker: impl Into<String>, extension: &str, escape_fragments: bool) -> Self {
        Self {
            marker: marker.into(),
            extension: extension.trim_start_matches('.').to_string(),
            escape_fragments,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Render the rule line for `fragments` without markers
    pub fn pattern(&self, fragments: &FragmentSet) -> String {
        let joined = if self.escape_fragments {
            fragments
                .iter()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("|")
        } else {
            fragments.join("|")
        };

        format!(r"^.*(?:{})\.{}$", joined, regex::escape(&self.extension))
    }

    /// Render the complete marker-wrapped block for `fragments`
    pub fn synthesize(&self, fragments: &FragmentSet) -> RegexBlock {
        let block = RegexBlock::new(&self.marker, &self.pattern(fragments));
        tracing::debug!(
            "Synthesized rule from {} fragments: {}",
            fragments.len(),
            block.pattern()
        );
        block
    }
}

impl Default for BlockSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER, "cs", false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_synthesize_joins_in_order() {
        let synthesizer = BlockSynthesizer::default();
        let fragments: FragmentSet = ["a", "b", "c"].into_iter().collect();

        let block = synthesizer.synthesize(&fragments);

        assert_eq!(block.pattern(), r"^.*(?:a|b|c)\.cs$");
        assert_eq!(
            block.as_str(),
            "//TabsColorTag\n^.*(?:a|b|c)\\.cs$\n//TabsColorTag"
        );
    }

    #[test]
    fn test_order_is_significant() {
        let synthesizer = BlockSynthesizer::default();
        let ab: FragmentSet = ["a", "b"].into_iter().collect();
        let ba: FragmentSet = ["b", "a"].into_iter().collect();

        assert_ne!(synthesizer.synthesize(&ab), synthesizer.synthesize(&ba));
    }

    #[test]
    fn test_empty_set_yields_empty_alternation() {
        let synthesizer = BlockSynthesizer::default();
        let block = synthesizer.synthesize(&FragmentSet::new());

        assert_eq!(block.pattern(), r"^.*(?:)\.cs$");
    }

    #[test]
    fn test_fragments_unescaped_by_default() {
        let synthesizer = BlockSynthesizer::default();
        let fragments: FragmentSet = ["a+b"].into_iter().collect();

        assert_eq!(synthesizer.pattern(&fragments), r"^.*(?:a+b)\.cs$");
    }

    #[test]
    fn test_escape_fragments_opt_in() {
        let synthesizer = BlockSynthesizer::new(DEFAULT_MARKER, ".cs", true);
        let fragments: FragmentSet = ["a+b", "c"].into_iter().collect();

        let pattern = synthesizer.pattern(&fragments);
        assert_eq!(pattern, r"^.*(?:a\+b|c)\.cs$");

        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match("src/a+b.cs"));
        assert!(!re.is_match("src/aab.cs"));
    }

    #[test]
    fn test_pattern_matches_collected_files() {
        let synthesizer = BlockSynthesizer::default();
        let fragments: FragmentSet = ["Player", "Enemy"].into_iter().collect();
        let re = Regex::new(&synthesizer.pattern(&fragments)).unwrap();

        assert!(re.is_match("C:/Proj/Assets/Player.cs"));
        assert!(re.is_match("Enemy.cs"));
        assert!(!re.is_match("Assets/Player.txt"));
    }

    #[test]
    fn test_fragment_set_skips_empty() {
        let mut set = FragmentSet::new();
        set.push("");
        set.push("a");
        set.extend(["", "b"]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
