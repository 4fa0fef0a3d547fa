use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Xlsform,
    Result,
}

impl ArtifactKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Xlsform => "xlsform_survey",
            ArtifactKind::Result => "form_result",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Xlsform => "xlsx",
            ArtifactKind::Result => "json",
        }
    }
}

/// Hands out timestamped output paths that never repeat, either within this
/// namer or against files already on disk.
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    issued: Mutex<HashSet<PathBuf>>,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            issued: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// `<dir>/<prefix>_<YYYYMMDD_HHMMSS>.<ext>`, with `_1`, `_2`, ... appended
    /// to the stem when the second-granularity name is already taken.
    pub fn next_path(&self, kind: ArtifactKind, now: DateTime<Local>) -> PathBuf {
        let stem = format!("{}_{}", kind.prefix(), now.format("%Y%m%d_%H%M%S"));
        let mut issued = self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut candidate = self.dir.join(format!("{}.{}", stem, kind.extension()));
        let mut n = 0u32;
        while issued.contains(&candidate) || candidate.exists() {
            n += 1;
            candidate = self.dir.join(format!("{}_{}.{}", stem, n, kind.extension()));
        }

        issued.insert(candidate.clone());
        candidate
    }
}
