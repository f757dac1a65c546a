//! Writing rewritten files.
//!
//! Only files with at least one applied mutation are written. Each file goes
//! to a temporary file in the destination directory first and is then renamed
//! over the target, so a reader sees either the old content or the new one.
//! A failure stops the write with the offending path; files already written
//! stay written. Two files that map to the same target are rejected before
//! anything is written.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::OutputFormat;
use crate::error::{NullpropError, NullpropResult};
use crate::program::{Program, SourceFile};
use crate::render::render_file;

/// SHA-256 of written content, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file written (or, in a dry run, rendered) by a persister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedFile {
    /// Program path of the source file.
    pub source: String,
    /// Where the content went.
    pub path: PathBuf,
    pub hash: ContentHash,
    pub bytes: usize,
}

/// Writes rewritten source files somewhere.
pub trait Persister {
    /// Where `file` would go.
    fn target(&self, file: &SourceFile) -> NullpropResult<PathBuf>;

    fn persist(&self, file: &SourceFile) -> NullpropResult<PersistedFile>;
}

/// Model document holding a single file.
#[derive(Serialize)]
struct FileDocument<'a> {
    files: [&'a SourceFile; 1],
}

/// Render a single file in `format`.
pub fn render(file: &SourceFile, format: OutputFormat) -> NullpropResult<String> {
    match format {
        OutputFormat::Source => Ok(render_file(file)),
        OutputFormat::Json => {
            let doc = FileDocument { files: [file] };
            serde_json::to_string_pretty(&doc).map_err(|e| NullpropError::Persist {
                path: PathBuf::from(&file.path),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })
        }
    }
}

/// Writes files below an output directory, mirroring their program paths.
#[derive(Debug, Clone)]
pub struct DirectoryPersister {
    root: PathBuf,
    format: OutputFormat,
}

impl DirectoryPersister {
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        DirectoryPersister {
            root: root.into(),
            format,
        }
    }

    /// Destination of `file` under the output root.
    ///
    /// Program paths must be relative and stay inside the root.
    pub fn target_path(&self, file: &SourceFile) -> NullpropResult<PathBuf> {
        let relative = Path::new(&file.path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(NullpropError::Persist {
                path: relative.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "program path leaves the output directory",
                ),
            });
        }
        Ok(self
            .root
            .join(relative)
            .with_extension(self.format.extension()))
    }
}

impl Persister for DirectoryPersister {
    fn target(&self, file: &SourceFile) -> NullpropResult<PathBuf> {
        self.target_path(file)
    }

    fn persist(&self, file: &SourceFile) -> NullpropResult<PersistedFile> {
        let path = self.target_path(file)?;
        let content = render(file, self.format)?;
        let to_error = |source: io::Error| NullpropError::Persist {
            path: path.clone(),
            source,
        };

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(to_error)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(to_error)?;
        temp.write_all(content.as_bytes()).map_err(to_error)?;
        temp.persist(&path).map_err(|e| to_error(e.error))?;

        debug!(source = %file.path, path = %path.display(), "wrote file");
        Ok(PersistedFile {
            source: file.path.clone(),
            path,
            hash: ContentHash::compute(content.as_bytes()),
            bytes: content.len(),
        })
    }
}

/// Renders without writing; used for dry runs.
#[derive(Debug, Clone)]
pub struct DryRunPersister {
    inner: DirectoryPersister,
}

impl DryRunPersister {
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        DryRunPersister {
            inner: DirectoryPersister::new(root, format),
        }
    }
}

impl Persister for DryRunPersister {
    fn target(&self, file: &SourceFile) -> NullpropResult<PathBuf> {
        self.inner.target_path(file)
    }

    fn persist(&self, file: &SourceFile) -> NullpropResult<PersistedFile> {
        let path = self.inner.target_path(file)?;
        let content = render(file, self.inner.format)?;
        Ok(PersistedFile {
            source: file.path.clone(),
            path,
            hash: ContentHash::compute(content.as_bytes()),
            bytes: content.len(),
        })
    }
}

/// Persist every modified file of `program`, in path order.
pub fn persist_modified(
    persister: &dyn Persister,
    program: &Program,
) -> NullpropResult<Vec<PersistedFile>> {
    let mut targets: BTreeMap<PathBuf, &str> = BTreeMap::new();
    for file in program.modified_files() {
        let path = persister.target(file)?;
        if let Some(first) = targets.insert(path.clone(), &file.path) {
            return Err(NullpropError::TargetCollision {
                path,
                first: first.to_string(),
                second: file.path.clone(),
            });
        }
    }

    let mut written = Vec::new();
    for file in program.modified_files() {
        written.push(persister.persist(file)?);
    }
    info!(files = written.len(), "persisted modified files");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Declaration, FieldDecl};
    use crate::types::TypeSyntax;

    fn file(path: &str, version: u32) -> SourceFile {
        let mut file = SourceFile::new(
            path,
            vec![Declaration::Field(FieldDecl::new(
                "C",
                "f",
                TypeSyntax::named("string").annotated(),
            ))],
        );
        file.version = version;
        file
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let hash = ContentHash::compute(b"hello");
        assert_eq!(
            hash.to_string(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn writes_only_modified_files() {
        let dir = tempfile::tempdir().unwrap();
        let program = Program::new()
            .with_file(file("src/A.cs", 1))
            .with_file(file("src/B.cs", 0));
        let persister = DirectoryPersister::new(dir.path(), OutputFormat::Source);

        let written = persist_modified(&persister, &program).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].source, "src/A.cs");

        let text = fs::read_to_string(dir.path().join("src").join("A.cs")).unwrap();
        assert!(text.contains("string? f;"));
        assert_eq!(written[0].hash, ContentHash::compute(text.as_bytes()));
        assert!(!dir.path().join("src").join("B.cs").exists());
    }

    #[test]
    fn json_output_reloads_as_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let persister = DirectoryPersister::new(dir.path(), OutputFormat::Json);
        let written = persister.persist(&file("A.cs", 1)).unwrap();
        assert_eq!(written.path, dir.path().join("A.json"));

        let program = Program::load(&written.path).unwrap();
        assert!(program.file("A.cs").is_some());
    }

    #[test]
    fn paths_cannot_leave_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let persister = DirectoryPersister::new(dir.path(), OutputFormat::Source);
        let err = persister.persist(&file("../escape.cs", 1)).unwrap_err();
        assert!(matches!(err, NullpropError::Persist { .. }));
    }

    #[test]
    fn colliding_targets_are_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let program = Program::new()
            .with_file(file("A.cs", 1))
            .with_file(file("A.vb", 1));
        let persister = DirectoryPersister::new(dir.path(), OutputFormat::Json);

        let err = persist_modified(&persister, &program).unwrap_err();
        match err {
            NullpropError::TargetCollision {
                path,
                first,
                second,
            } => {
                assert_eq!(path, dir.path().join("A.json"));
                assert_eq!(first, "A.cs");
                assert_eq!(second, "A.vb");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("A.json").exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let persister = DryRunPersister::new(dir.path(), OutputFormat::Source);
        let written = persister.persist(&file("A.cs", 1)).unwrap();
        assert!(written.bytes > 0);
        assert!(!written.path.exists());
    }
}
