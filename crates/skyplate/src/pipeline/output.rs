use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::error::OutputError;

/// Writes per-image artifacts as `<output dir>/<stem><suffix>`.
///
/// Existing artifacts are replaced. Each file is written under a temporary
/// name and renamed into place, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_directory: PathBuf,
}

impl ArtifactWriter {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn path_for(&self, stem: &str, suffix: &str) -> PathBuf {
        self.output_directory.join(format!("{}{}", stem, suffix))
    }

    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        stem: &str,
        suffix: &str,
        value: &T,
    ) -> Result<PathBuf, OutputError> {
        let content = serde_json::to_vec_pretty(value)?;
        self.write_bytes(stem, suffix, &content)
    }

    pub fn write_bytes(
        &self,
        stem: &str,
        suffix: &str,
        content: &[u8],
    ) -> Result<PathBuf, OutputError> {
        self.ensure_directory()?;

        let path = self.path_for(stem, suffix);
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        std::fs::write(&partial, content).map_err(|e| OutputError::WriteFile {
            path: partial.clone(),
            source: e,
        })?;
        std::fs::rename(&partial, &path).map_err(|e| {
            let _ = std::fs::remove_file(&partial);
            OutputError::WriteFile {
                path: path.clone(),
                source: e,
            }
        })?;

        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }

    fn ensure_directory(&self) -> Result<(), OutputError> {
        std::fs::create_dir_all(&self.output_directory).map_err(|e| OutputError::CreateDirectory {
            path: self.output_directory.clone(),
            source: e,
        })
    }
}
