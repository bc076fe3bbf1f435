use crate::config::StageConfig;
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Same separator semantics as `glob::glob`
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Check if a pattern contains glob metacharacters
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_CHARS)
}

/// Check if a pattern descends into subdirectories
pub fn is_recursive(pattern: &str) -> bool {
    pattern.contains("**")
}

/// Leading directory of a pattern that contains no glob metacharacters.
/// For a literal file path this is the file's parent.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    if !is_glob(pattern) {
        return path.parent().map(Path::to_path_buf).unwrap_or_default();
    }

    let mut base = PathBuf::new();
    for component in path.components() {
        if let Component::Normal(part) = component
            && part.to_string_lossy().contains(GLOB_CHARS)
        {
            break;
        }
        base.push(component);
    }
    base
}

/// Expand a stage's input patterns, in order, into its source set.
///
/// Each pattern's matches are taken in path order and duplicates keep their
/// first position. Directories and files below an excluded root are
/// dropped. A literal pattern that matches nothing is reported as not found.
pub fn collect_sources(stage: &StageConfig) -> BuildResult<Vec<SourceFile>> {
    debug!(
        "Collecting {} sources from {} patterns",
        stage.stage,
        stage.inputs.len()
    );

    let mut sources: IndexMap<PathBuf, SourceFile> = IndexMap::new();

    for pattern in &stage.inputs {
        let base = glob_base(pattern);
        let paths = glob::glob_with(pattern, MATCH_OPTIONS)
            .map_err(|e| BuildError::pattern(pattern, e))?;

        let mut matched = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    // Unreadable directories inside a glob are skipped, like a
                    // missing match.
                    warn!("Error reading path while expanding '{}': {}", pattern, e);
                    continue;
                }
            };

            if !path.is_file() || is_excluded(&path, &stage.exclude) {
                continue;
            }

            matched.push(path);
        }

        if matched.is_empty() && !is_glob(pattern) {
            return Err(BuildError::SourceNotFound(pattern.clone()));
        }
        debug!("Pattern '{}' matched {} files", pattern, matched.len());

        matched.sort();
        for path in matched {
            sources
                .entry(path.clone())
                .or_insert_with(|| SourceFile::new(path, base.clone()));
        }
    }

    Ok(sources.into_values().collect())
}

/// Check whether `path` lies below any excluded root
pub fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    exclude
        .iter()
        .any(|root| normalize(path).starts_with(normalize(root)))
}

/// Drop `.` components so `./dist/a` and `dist/a` compare equal
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Compiled watch patterns of one stage
#[derive(Debug, Clone)]
pub struct PatternSet {
    entries: Vec<(Pattern, PathBuf, bool)>,
}

impl PatternSet {
    pub fn new(patterns: &[String]) -> BuildResult<Self> {
        let mut entries = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let normalized = normalize(Path::new(pattern)).to_string_lossy().into_owned();
            let compiled =
                Pattern::new(&normalized).map_err(|e| BuildError::pattern(pattern, e))?;
            entries.push((compiled, normalize(&glob_base(pattern)), is_recursive(pattern)));
        }
        Ok(Self { entries })
    }

    /// Roots to poll, one per distinct pattern base
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for (_, base, _) in &self.entries {
            let root = if base.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                base.clone()
            };
            if !roots.iter().any(|r| root.starts_with(r)) {
                roots.retain(|r| !r.starts_with(&root));
                roots.push(root);
            }
        }
        roots
    }

    pub fn matches_file(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.entries
            .iter()
            .any(|(pattern, _, _)| pattern.matches_path_with(&path, MATCH_OPTIONS))
    }

    /// Directories are relevant when they match a pattern outright or sit
    /// under the base of a recursive pattern
    pub fn matches_dir(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.entries.iter().any(|(pattern, base, recursive)| {
            pattern.matches_path_with(&path, MATCH_OPTIONS)
                || (*recursive && path.starts_with(base) && path != *base)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Stage, StageOptions};
    use std::fs;

    fn stage(inputs: Vec<String>, exclude: Vec<PathBuf>) -> StageConfig {
        StageConfig {
            stage: Stage::Font,
            watch: inputs.clone(),
            inputs,
            output: PathBuf::from("unused"),
            exclude,
            options: StageOptions::Font,
        }
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("./src/img/**/*"), PathBuf::from("./src/img"));
        assert_eq!(glob_base("src/fonts/*.*"), PathBuf::from("src/fonts"));
        assert_eq!(glob_base("vendor/js/bootstrap.js"), PathBuf::from("vendor/js"));
        assert_eq!(glob_base("**/*.html"), PathBuf::new());
    }

    #[test]
    fn test_collect_preserves_pattern_order_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("vendor")).unwrap();
        fs::create_dir_all(root.join("src/js/lib")).unwrap();
        fs::write(root.join("vendor/bundle.js"), "vendor").unwrap();
        fs::write(root.join("src/js/b.js"), "b").unwrap();
        fs::write(root.join("src/js/lib/a.js"), "a").unwrap();

        let inputs = vec![
            root.join("vendor/bundle.js").to_string_lossy().into_owned(),
            root.join("src/js/**/*.js").to_string_lossy().into_owned(),
            root.join("src/js/b.js").to_string_lossy().into_owned(),
        ];
        let sources = collect_sources(&stage(inputs, vec![])).unwrap();

        let relative: Vec<_> = sources.iter().map(SourceFile::relative).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("bundle.js"),
                PathBuf::from("b.js"),
                PathBuf::from("lib/a.js")
            ]
        );
    }

    #[test]
    fn test_collect_skips_directories_and_excluded_roots() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("site/nested")).unwrap();
        fs::create_dir_all(root.join("site/dist")).unwrap();
        fs::write(root.join("site/index.html"), "<p>").unwrap();
        fs::write(root.join("site/dist/index.html"), "<p>").unwrap();

        let inputs = vec![root.join("site/**/*").to_string_lossy().into_owned()];
        let sources = collect_sources(&stage(inputs, vec![root.join("site/dist")])).unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].relative(), PathBuf::from("index.html"));
    }

    #[test]
    fn test_missing_literal_pattern_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let literal = dir.path().join("missing.js").to_string_lossy().into_owned();
        let glob = dir.path().join("*.js").to_string_lossy().into_owned();

        assert!(matches!(
            collect_sources(&stage(vec![literal], vec![])),
            Err(BuildError::SourceNotFound(_))
        ));
        assert!(collect_sources(&stage(vec![glob], vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_pattern_set_matching() {
        let set = PatternSet::new(&[
            "./src/scss/**/*.scss".to_string(),
            "./src/img/*.png".to_string(),
        ])
        .unwrap();

        assert!(set.matches_file(Path::new("src/scss/partials/_grid.scss")));
        assert!(set.matches_file(Path::new("./src/scss/style.scss")));
        assert!(!set.matches_file(Path::new("src/scss/notes.txt")));
        assert!(!set.matches_file(Path::new("src/img/deep/logo.png")));

        assert!(set.matches_dir(Path::new("src/scss/partials")));
        assert!(!set.matches_dir(Path::new("src/img/deep")));
        assert_eq!(
            set.roots(),
            vec![PathBuf::from("src/scss"), PathBuf::from("src/img")]
        );
    }
}
