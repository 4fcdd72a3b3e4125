use crate::common::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Keeps letters, digits, `_` and `-`; spaces become `_`.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_' || *c == '-')
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// Writes model answers that could not be parsed, one file per item, for
/// manual inspection.
#[derive(Debug, Clone)]
pub struct UnparsableDump {
    dir: PathBuf,
}

impl UnparsableDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `unparsable_<id>_<hash>.txt`; the hash of the raw id keeps
    /// sanitized names from colliding.
    pub fn file_name(id: &str) -> String {
        let digest = hex::encode(Sha256::digest(id.as_bytes()));
        format!("unparsable_{}_{}.txt", sanitize_id(id), &digest[..8])
    }

    pub fn write(&self, id: &str, prompt: &str, model: &str, response: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(id));
        fs::write(
            &path,
            format!(
                "---PROMPT---\n{}\n\n---MODEL---\n{}\n\n---RESPONSE---\n{}",
                prompt, model, response
            ),
        )?;
        info!("saved unparsable response to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sanitized_and_distinct() {
        let a = UnparsableDump::file_name("Bar/One?");
        let b = UnparsableDump::file_name("Bar One");
        assert!(a.starts_with("unparsable_BarOne_"));
        assert!(b.starts_with("unparsable_Bar_One_"));
        assert!(a.ends_with(".txt"));
        assert_ne!(UnparsableDump::file_name("a/b"), UnparsableDump::file_name("ab"));
    }

    #[test]
    fn dump_has_three_sections() {
        let dir = tempfile::tempdir().unwrap();
        let dump = UnparsableDump::new(dir.path().join("unparsable"));
        let path = dump.write("42", "the prompt", "qwen-3-32b", "not json").unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "---PROMPT---\nthe prompt\n\n---MODEL---\nqwen-3-32b\n\n---RESPONSE---\nnot json"
        );
    }
}
