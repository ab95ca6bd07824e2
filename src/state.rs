//! Completion detection from filesystem evidence.
//!
//! No manifest is written anywhere: a phase is considered done when the files it produces look
//! plausible on disk. The checks are size and presence heuristics, so a corrupt but large file
//! passes and a legitimately tiny one does not. Replacing them with content hashes or an explicit
//! checkpoint only requires another [`PhaseStateDetector`] implementation.

use std::fs;
use std::path::Path;

use crate::config::PipelineConfig;

/// Outcome of a completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Complete,
    Incomplete,
}

impl Completion {
    pub fn is_complete(self) -> bool {
        matches!(self, Completion::Complete)
    }

    fn from_bool(done: bool) -> Self {
        if done {
            Completion::Complete
        } else {
            Completion::Incomplete
        }
    }
}

/// The artifacts a phase is expected to have produced.
#[derive(Debug, Clone, Copy)]
pub enum PhaseEvidence<'a> {
    /// `archives` are the file names the remote publishes; they should sit in `dir`.
    Download { dir: &'a Path, archives: &'a [String] },
    /// Each archive should have a non-empty directory named after its stem in `working_dir`.
    Extract { working_dir: &'a Path, archives: &'a [String] },
    /// The unified artifact.
    Consolidate { artifact: &'a Path },
    /// `remaining` are the archive files still present in the period directory.
    Cleanup { remaining: &'a [String] },
}

/// Decides whether a phase's output already exists.
pub trait PhaseStateDetector: Send + Sync {
    fn assess(&self, evidence: &PhaseEvidence<'_>) -> Completion;
}

/// Size and presence checks against the local filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStateDetector {
    /// Archives must be strictly larger than this.
    pub min_archive_bytes: u64,
    /// The unified artifact must be strictly larger than this.
    pub min_artifact_bytes: u64,
}

impl FsStateDetector {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            min_archive_bytes: config.min_archive_bytes,
            min_artifact_bytes: config.min_artifact_bytes,
        }
    }
}

impl PhaseStateDetector for FsStateDetector {
    fn assess(&self, evidence: &PhaseEvidence<'_>) -> Completion {
        let done = match evidence {
            PhaseEvidence::Download { dir, archives } => archives
                .iter()
                .all(|name| file_larger_than(&dir.join(name), self.min_archive_bytes)),
            PhaseEvidence::Extract { working_dir, archives } => {
                working_dir.is_dir()
                    && archives
                        .iter()
                        .all(|name| dir_is_non_empty(&working_dir.join(archive_stem(name))))
            }
            PhaseEvidence::Consolidate { artifact } => {
                file_larger_than(artifact, self.min_artifact_bytes)
            }
            PhaseEvidence::Cleanup { remaining } => remaining.is_empty(),
        };
        Completion::from_bool(done)
    }
}

/// Name of the directory an archive extracts into: the file name without its last extension.
pub fn archive_stem(archive: &str) -> &str {
    Path::new(archive)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(archive)
}

pub(crate) fn file_larger_than(path: &Path, min_bytes: u64) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > min_bytes)
        .unwrap_or(false)
}

pub(crate) fn dir_is_non_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{archive_stem, Completion, FsStateDetector, PhaseEvidence, PhaseStateDetector};
    use std::fs;

    fn detector() -> FsStateDetector {
        FsStateDetector {
            min_archive_bytes: 1024,
            min_artifact_bytes: 1024 * 1024,
        }
    }

    #[test]
    fn download_rejects_truncated_archives() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Empresas0.zip"), vec![0u8; 4096]).unwrap();
        fs::write(dir.path().join("Socios0.zip"), vec![0u8; 10]).unwrap();

        let complete = vec!["Empresas0.zip".to_string()];
        let with_truncated = vec!["Empresas0.zip".to_string(), "Socios0.zip".to_string()];
        let with_missing = vec!["Empresas0.zip".to_string(), "Cnaes.zip".to_string()];

        let d = detector();
        let check = |archives: &[String]| {
            d.assess(&PhaseEvidence::Download {
                dir: dir.path(),
                archives,
            })
        };
        assert_eq!(check(complete.as_slice()), Completion::Complete);
        assert_eq!(check(with_truncated.as_slice()), Completion::Incomplete);
        assert_eq!(check(with_missing.as_slice()), Completion::Incomplete);
    }

    #[test]
    fn extract_requires_non_empty_directory_per_archive() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("Temp_brutos");
        fs::create_dir_all(working.join("Empresas0")).unwrap();
        fs::write(working.join("Empresas0").join("x.EMPRECSV"), b"1").unwrap();
        fs::create_dir_all(working.join("Socios0")).unwrap();

        let d = detector();
        let archives = vec!["Empresas0.zip".to_string()];
        assert!(d
            .assess(&PhaseEvidence::Extract {
                working_dir: &working,
                archives: &archives
            })
            .is_complete());

        let archives = vec!["Empresas0.zip".to_string(), "Socios0.zip".to_string()];
        assert!(!d
            .assess(&PhaseEvidence::Extract {
                working_dir: &working,
                archives: &archives
            })
            .is_complete());
    }

    #[test]
    fn extract_without_working_dir_is_incomplete_even_with_no_archives() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("Temp_brutos");
        let d = detector();
        assert_eq!(
            d.assess(&PhaseEvidence::Extract {
                working_dir: &working,
                archives: &[]
            }),
            Completion::Incomplete
        );
    }

    #[test]
    fn small_unified_artifact_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("CSV_Mestre_Final.csv");
        fs::write(&artifact, vec![b'x'; 2048]).unwrap();

        let d = detector();
        assert_eq!(
            d.assess(&PhaseEvidence::Consolidate { artifact: &artifact }),
            Completion::Incomplete
        );

        let lenient = FsStateDetector {
            min_artifact_bytes: 1024,
            ..detector()
        };
        assert_eq!(
            lenient.assess(&PhaseEvidence::Consolidate { artifact: &artifact }),
            Completion::Complete
        );
    }

    #[test]
    fn cleanup_is_complete_when_nothing_remains() {
        let d = detector();
        assert!(d.assess(&PhaseEvidence::Cleanup { remaining: &[] }).is_complete());
        let remaining = vec!["Cnaes.zip".to_string()];
        assert!(!d.assess(&PhaseEvidence::Cleanup { remaining: &remaining }).is_complete());
    }

    #[test]
    fn stem_strips_only_the_last_extension() {
        assert_eq!(archive_stem("Estabelecimentos3.zip"), "Estabelecimentos3");
        assert_eq!(archive_stem("odd.name.zip"), "odd.name");
    }
}
