#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use cnpj_etl::execution::Extractor;
use cnpj_etl::state::archive_stem;
use cnpj_etl::{PipelineError, PipelineResult};

/// Directories of `tests/fixtures/export`, one per archive of the miniature release.
pub const FIXTURE_ARCHIVES: [&str; 6] = [
    "Cnaes",
    "Empresas0",
    "Estabelecimentos0",
    "Leiame",
    "Simples",
    "Socios0",
];

pub fn fixture_export() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/export")
}

/// Copies the fixture export into `dest`, one subdirectory per archive stem.
pub fn copy_fixture_export(dest: &Path) {
    for stem in FIXTURE_ARCHIVES {
        copy_dir(&fixture_export().join(stem), &dest.join(stem));
    }
}

pub fn copy_dir(src: &Path, dest: &Path) {
    fs::create_dir_all(dest).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), dest.join(entry.file_name())).unwrap();
    }
}

/// Writes a placeholder archive for every fixture directory into `period_dir`, each large enough
/// to pass the download size check.
pub fn write_fixture_archives(period_dir: &Path) {
    fs::create_dir_all(period_dir).unwrap();
    for stem in FIXTURE_ARCHIVES {
        fs::write(period_dir.join(format!("{stem}.zip")), vec![0u8; 2048]).unwrap();
    }
}

/// "Extracts" an archive by copying the fixture directory named after its stem.
#[derive(Debug, Default)]
pub struct FixtureExtractor {
    /// Stems whose extraction fails after writing a partial file.
    pub failing: Vec<String>,
}

impl Extractor for FixtureExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> PipelineResult<()> {
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        let stem = archive_stem(&name).to_string();
        if self.failing.contains(&stem) {
            fs::write(dest_dir.join("partial.tmp"), b"half").unwrap();
            return Err(PipelineError::Collaborator {
                phase: "extract".to_string(),
                message: format!("corrupt archive {name}"),
            });
        }
        let src = fixture_export().join(&stem);
        if src.is_dir() {
            copy_dir(&src, dest_dir);
        } else {
            fs::write(dest_dir.join(format!("{stem}.txt")), b"placeholder\n").unwrap();
        }
        Ok(())
    }
}

pub fn read_records(path: &Path) -> Vec<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .from_path(path)
        .unwrap();
    rdr.records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}
