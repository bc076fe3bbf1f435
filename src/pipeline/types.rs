use crate::config::Stage;
use std::path::{Path, PathBuf};

/// A matched input file together with the non-glob prefix of the
/// pattern that matched it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub base: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, base: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
        }
    }

    /// Path below the pattern base, mirrored under the stage output
    pub fn relative(&self) -> PathBuf {
        match self.path.strip_prefix(&self.base) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => self
                .path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| self.path.clone()),
        }
    }

    /// Destination counterpart inside `output`
    pub fn destination(&self, output: &Path) -> PathBuf {
        output.join(self.relative())
    }
}

/// A file held in memory between read and write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Originating source, used in log lines
    pub source: PathBuf,
    /// Output path relative to the stage output directory
    pub relative: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn from_source(source: &SourceFile, contents: Vec<u8>) -> Self {
        Self {
            source: source.path.clone(),
            relative: source.relative(),
            contents,
        }
    }

    /// Replace the output extension, e.g. `style.scss` → `style.css`
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.relative.set_extension(extension);
        self
    }
}

/// A file dropped from a run after a transform failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of one stage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub matched: usize,
    /// Inputs the change filter found up to date
    pub skipped: Vec<PathBuf>,
    /// Files written, in write order
    pub written: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            matched: 0,
            skipped: Vec::new(),
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, path: &Path, message: impl Into<String>) {
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_below_base() {
        let source = SourceFile::new("./src/img/icons/a.png", "./src/img");
        assert_eq!(source.relative(), PathBuf::from("icons/a.png"));
        assert_eq!(
            source.destination(Path::new("./dist/img")),
            PathBuf::from("./dist/img/icons/a.png")
        );
    }

    #[test]
    fn test_relative_path_falls_back_to_file_name() {
        let source = SourceFile::new("vendor/bootstrap.js", "elsewhere");
        assert_eq!(source.relative(), PathBuf::from("bootstrap.js"));
    }

    #[test]
    fn test_asset_extension_swap() {
        let source = SourceFile::new("src/scss/style.scss", "src/scss");
        let asset = Asset::from_source(&source, Vec::new()).with_extension("css");
        assert_eq!(asset.relative, PathBuf::from("style.css"));
    }
}
