//! Path and filter engine
//!
//! Filters operate on logical paths: `/`-separated, with folder paths
//! carrying a trailing `/`. Candidate folder paths are relative to the data
//! folder and prefixed with `/`, so the data folder root is `/` and a
//! subfolder is `/A/B/`.
//!
//! Three lists combine to decide whether a file is in scope:
//! folder filters (`--exclude` / `--include`), file filters
//! (`--ignore` / `--keep`) and selection filters (`--select`). A file is in
//! scope iff its folder is included, the file itself is included, and the
//! file is selected.

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};

/// Replace backslashes so Windows-style input becomes a logical path.
pub fn logical_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Compile a glob pattern (`*`, `?`) into a matcher. Invalid patterns are
/// usage errors surfaced to the caller.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)
        .with_context(|| format!("invalid filter pattern: {}", pattern))?
        .compile_matcher())
}

/// Prefix a pattern with `*/` unless it is already anchored at the root or
/// starts with a wildcard. This lets `TMP/` or `core.dump` match at any
/// depth.
fn anchor(pattern: &str) -> String {
    if pattern.starts_with('/') || pattern.starts_with('*') {
        pattern.to_string()
    } else {
        format!("*/{}", pattern)
    }
}

/// Raw filter configuration exactly as given on the command line. This is
/// what gets recorded in every snapshot; the compiled form lives in
/// [`FilterEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Folder filter patterns in declaration order.
    pub folder_filters: Vec<String>,
    /// Parallel to `folder_filters`: true for `--include`.
    pub folder_filter_is_inclusive: Vec<bool>,
    /// File filter patterns in declaration order.
    pub file_filters: Vec<String>,
    /// Parallel to `file_filters`: true for `--keep`.
    pub file_filter_is_inclusive: Vec<bool>,
    /// Selection patterns (`--select`); empty selects everything.
    pub selected_file_filters: Vec<String>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.folder_filters.is_empty()
            && self.file_filters.is_empty()
            && self.selected_file_filters.is_empty()
    }
}

enum FolderRule {
    /// Two-way prefix test against the raw pattern: the candidate leading up
    /// to an included subtree stays traversable, and everything below the
    /// subtree is included.
    Include { pattern: String },
    /// Anchored glob with `*` appended; a match excludes the folder.
    Exclude { matcher: GlobMatcher },
}

/// The three-way dispatch shared by file filters and selection filters.
enum FileTest {
    /// Pattern ended with `/`: the folder path decides.
    Folder(GlobMatcher),
    /// Pattern contained `/`: folder part and name part must both match.
    Path {
        folder: GlobMatcher,
        name: GlobMatcher,
    },
    /// Bare pattern: the file name decides.
    Name(GlobMatcher),
}

impl FileTest {
    fn compile(raw: &str) -> Result<FileTest> {
        let pattern = anchor(raw);
        if pattern.ends_with('/') {
            return Ok(FileTest::Folder(compile_glob(&format!("{}*", pattern))?));
        }
        if let Some(split) = pattern.rfind('/') {
            let (folder_part, name_part) = pattern.split_at(split + 1);
            return Ok(FileTest::Path {
                folder: compile_glob(folder_part)?,
                name: compile_glob(name_part)?,
            });
        }
        Ok(FileTest::Name(compile_glob(&pattern)?))
    }

    fn matches(&self, folder_path: &str, name: &str) -> bool {
        match self {
            FileTest::Folder(matcher) => matcher.is_match(folder_path),
            FileTest::Path { folder, name: nm } => {
                folder.is_match(folder_path) && nm.is_match(name)
            }
            FileTest::Name(matcher) => matcher.is_match(name),
        }
    }
}

struct FileRule {
    test: FileTest,
    inclusive: bool,
}

/// Compiled filter set. Built once per invocation from a [`FilterConfig`]
/// and threaded through the scan.
pub struct FilterEngine {
    folder_rules: Vec<FolderRule>,
    file_rules: Vec<FileRule>,
    select_rules: Vec<FileTest>,
}

impl FilterEngine {
    pub fn compile(config: &FilterConfig) -> Result<FilterEngine> {
        let mut folder_rules = Vec::with_capacity(config.folder_filters.len());
        for (pattern, &inclusive) in config
            .folder_filters
            .iter()
            .zip(config.folder_filter_is_inclusive.iter())
        {
            let pattern = logical_path(pattern);
            if inclusive {
                folder_rules.push(FolderRule::Include { pattern });
            } else {
                folder_rules.push(FolderRule::Exclude {
                    matcher: compile_glob(&format!("{}*", anchor(&pattern)))?,
                });
            }
        }

        let mut file_rules = Vec::with_capacity(config.file_filters.len());
        for (pattern, &inclusive) in config
            .file_filters
            .iter()
            .zip(config.file_filter_is_inclusive.iter())
        {
            file_rules.push(FileRule {
                test: FileTest::compile(&logical_path(pattern))?,
                inclusive,
            });
        }

        let mut select_rules = Vec::with_capacity(config.selected_file_filters.len());
        for pattern in &config.selected_file_filters {
            select_rules.push(FileTest::compile(&logical_path(pattern))?);
        }

        Ok(FilterEngine {
            folder_rules,
            file_rules,
            select_rules,
        })
    }

    /// Folder verdict. `folder_path` is the `/`-prefixed relative path with
    /// trailing slash. Filters apply in declaration order, last assignment
    /// wins, default included.
    pub fn folder_included(&self, folder_path: &str) -> bool {
        let mut included = true;
        for rule in &self.folder_rules {
            match rule {
                FolderRule::Include { pattern } => {
                    if pattern.starts_with(folder_path) || folder_path.starts_with(pattern.as_str())
                    {
                        included = true;
                    }
                }
                FolderRule::Exclude { matcher } => {
                    if matcher.is_match(folder_path) {
                        included = false;
                    }
                }
            }
        }
        included
    }

    /// File verdict from `--keep` / `--ignore`, last assignment wins.
    pub fn file_included(&self, folder_path: &str, name: &str) -> bool {
        let mut included = true;
        for rule in &self.file_rules {
            if rule.test.matches(folder_path, name) {
                included = rule.inclusive;
            }
        }
        included
    }

    /// Selection verdict: with no `--select` filters every file is selected,
    /// otherwise at least one must match.
    pub fn file_selected(&self, folder_path: &str, name: &str) -> bool {
        if self.select_rules.is_empty() {
            return true;
        }
        self.select_rules
            .iter()
            .any(|test| test.matches(folder_path, name))
    }

    /// Combined verdict for a file in an already-included folder.
    pub fn file_in_scope(&self, folder_path: &str, name: &str) -> bool {
        self.file_included(folder_path, name) && self.file_selected(folder_path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(
        folders: &[(&str, bool)],
        files: &[(&str, bool)],
        select: &[&str],
    ) -> FilterEngine {
        let config = FilterConfig {
            folder_filters: folders.iter().map(|(p, _)| p.to_string()).collect(),
            folder_filter_is_inclusive: folders.iter().map(|&(_, i)| i).collect(),
            file_filters: files.iter().map(|(p, _)| p.to_string()).collect(),
            file_filter_is_inclusive: files.iter().map(|&(_, i)| i).collect(),
            selected_file_filters: select.iter().map(|s| s.to_string()).collect(),
        };
        FilterEngine::compile(&config).unwrap()
    }

    #[test]
    fn test_no_filters_includes_everything() {
        let engine = engine(&[], &[], &[]);
        assert!(engine.folder_included("/"));
        assert!(engine.folder_included("/A/B/"));
        assert!(engine.file_in_scope("/", "anything.bin"));
    }

    #[test]
    fn test_exclude_rooted_folder() {
        let engine = engine(&[("/TMP/", false)], &[], &[]);
        assert!(engine.folder_included("/"));
        assert!(!engine.folder_included("/TMP/"));
        assert!(!engine.folder_included("/TMP/SUB/"));
        assert!(engine.folder_included("/TEMPER/"));
    }

    #[test]
    fn test_exclude_unanchored_folder_matches_any_depth() {
        let engine = engine(&[("TMP/", false)], &[], &[]);
        assert!(!engine.folder_included("/TMP/"));
        assert!(!engine.folder_included("/A/TMP/"));
        assert!(!engine.folder_included("/A/TMP/B/"));
        assert!(engine.folder_included("/A/B/"));
    }

    #[test]
    fn test_include_reopens_excluded_subtree() {
        // Exclude everything, then include one subtree: its ancestors stay
        // traversable and its descendants are back in.
        let engine = engine(&[("*/", false), ("/A/B/C/", true)], &[], &[]);
        assert!(engine.folder_included("/"));
        assert!(engine.folder_included("/A/"));
        assert!(engine.folder_included("/A/B/"));
        assert!(engine.folder_included("/A/B/C/"));
        assert!(engine.folder_included("/A/B/C/D/"));
        assert!(!engine.folder_included("/X/"));
        assert!(!engine.folder_included("/A/B/X/"));
    }

    #[test]
    fn test_multiple_includes_or_together() {
        let engine = engine(&[("*/", false), ("/A/", true), ("/B/", true)], &[], &[]);
        assert!(engine.folder_included("/A/"));
        assert!(engine.folder_included("/B/SUB/"));
        assert!(!engine.folder_included("/C/"));
    }

    #[test]
    fn test_last_assignment_wins_order() {
        // Exclude after include takes the folder back out.
        let engine = engine(&[("/A/", true), ("*/", false)], &[], &[]);
        assert!(!engine.folder_included("/A/"));
    }

    #[test]
    fn test_ignore_by_name() {
        let engine = engine(&[], &[("*.log", false)], &[]);
        assert!(!engine.file_included("/", "build.log"));
        assert!(!engine.file_included("/A/B/", "build.log"));
        assert!(engine.file_included("/", "build.txt"));
    }

    #[test]
    fn test_keep_overrides_earlier_ignore() {
        let engine1 = engine(&[], &[("*.log", false), ("important.log", true)], &[]);
        assert!(!engine1.file_included("/", "build.log"));
        assert!(engine1.file_included("/", "important.log"));
        // Reversed order: the ignore wins again.
        let engine2 = engine(&[], &[("important.log", true), ("*.log", false)], &[]);
        assert!(!engine2.file_included("/", "important.log"));
    }

    #[test]
    fn test_file_filter_with_folder_part() {
        let engine = engine(&[], &[("/SRC/*.rs", false)], &[]);
        assert!(!engine.file_included("/SRC/", "main.rs"));
        assert!(engine.file_included("/DOC/", "main.rs"));
        assert!(engine.file_included("/SRC/", "main.txt"));
    }

    #[test]
    fn test_file_filter_folder_form() {
        // Trailing slash: the folder path alone decides.
        let engine = engine(&[], &[("CACHE/", false)], &[]);
        assert!(!engine.file_included("/CACHE/", "anything"));
        assert!(!engine.file_included("/A/CACHE/B/", "anything"));
        assert!(engine.file_included("/A/", "anything"));
    }

    #[test]
    fn test_unanchored_name_matches_any_folder() {
        let engine = engine(&[], &[("core.dump", false)], &[]);
        assert!(!engine.file_included("/", "core.dump"));
        assert!(!engine.file_included("/DEEP/DOWN/", "core.dump"));
        assert!(engine.file_included("/", "core.dumpling"));
    }

    #[test]
    fn test_question_mark_glob() {
        let engine = engine(&[], &[("data?.bin", false)], &[]);
        assert!(!engine.file_included("/", "data1.bin"));
        assert!(engine.file_included("/", "data12.bin"));
    }

    #[test]
    fn test_select_empty_selects_all() {
        let engine = engine(&[], &[], &[]);
        assert!(engine.file_selected("/", "whatever"));
    }

    #[test]
    fn test_select_requires_a_match() {
        let engine = engine(&[], &[], &["*.txt", "*.md"]);
        assert!(engine.file_selected("/", "notes.txt"));
        assert!(engine.file_selected("/SUB/", "README.md"));
        assert!(!engine.file_selected("/", "binary.bin"));
    }

    #[test]
    fn test_scope_combines_all_three() {
        // Spec scenario: --exclude /TMP/ --keep *.txt --ignore *.log over
        // /A.txt, /A.log, /TMP/B.txt selects only /A.txt.
        let engine = engine(
            &[("/TMP/", false)],
            &[("*.txt", true), ("*.log", false)],
            &[],
        );
        assert!(engine.folder_included("/"));
        assert!(engine.file_in_scope("/", "A.txt"));
        assert!(!engine.file_in_scope("/", "A.log"));
        assert!(!engine.folder_included("/TMP/"));
    }

    #[test]
    fn test_backslashes_normalised() {
        assert_eq!(logical_path("A\\B\\c.txt"), "A/B/c.txt");
        let engine = engine(&[("\\TMP\\", false)], &[], &[]);
        assert!(!engine.folder_included("/TMP/"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let config = FilterConfig {
            file_filters: vec!["[unclosed".to_string()],
            file_filter_is_inclusive: vec![false],
            ..Default::default()
        };
        assert!(FilterEngine::compile(&config).is_err());
    }
}
