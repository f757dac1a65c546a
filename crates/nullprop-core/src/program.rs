//! Program container and model-file loading.
//!
//! A [`Program`] is the whole shared mutable program representation: every
//! source file with its declarations, plus metadata for external symbols and
//! user-defined value types. Model files are JSON documents with any subset
//! of these keys:
//!
//! ```json
//! {
//!   "files": [{ "path": "Widget.cs", "declarations": [ ... ] }],
//!   "externals": [{ "key": "M:System.IO.File.ReadAllText(string)", "returns": "string" }],
//!   "value_types": ["Point"],
//!   "generic_types": [{ "name": "Cache<K, V>", "type_params": [{ "name": "V" }] }]
//! }
//! ```
//!
//! A directory input is the merge of every `*.json` document below it, in
//! path order. Two documents may not declare the same file path, and the
//! default output directory is never read back as input.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::NullpropError;
use crate::signature::EntityKey;
use crate::syntax::{Declaration, TypeParam};
use crate::types::TypeSyntax;

/// Output directory name used when none is given; never loaded as input.
pub const DEFAULT_OUT_DIR: &str = "nullprop-out";

/// One source file of the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Workspace-relative path; also the file's identity.
    pub path: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    /// Incremented on every applied mutation.
    #[serde(skip)]
    pub version: u32,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        SourceFile {
            path: path.into(),
            declarations,
            version: 0,
        }
    }

    /// Whether any declaration in this file has been rewritten.
    pub fn is_modified(&self) -> bool {
        self.version > 0
    }
}

/// Compiled signature of a symbol with no local declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSymbol {
    pub key: EntityKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<TypeSyntax>,
    #[serde(default)]
    pub params: Vec<TypeSyntax>,
}

impl ExternalSymbol {
    pub fn new(key: impl Into<EntityKey>) -> Self {
        ExternalSymbol {
            key: key.into(),
            returns: None,
            params: Vec::new(),
        }
    }

    pub fn returning(mut self, ty: TypeSyntax) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn with_params(mut self, params: Vec<TypeSyntax>) -> Self {
        self.params = params;
        self
    }
}

/// Type parameters of a generic containing type.
///
/// Parameters spelled in a container name (`Box<T>`) are known without an
/// entry; an entry adds their constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericType {
    /// Container name as member declarations spell it.
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
}

impl GenericType {
    pub fn new(name: impl Into<String>, type_params: Vec<TypeParam>) -> Self {
        GenericType {
            name: name.into(),
            type_params,
        }
    }
}

/// Serialized form of a model document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ModelDocument {
    #[serde(default)]
    files: Vec<SourceFile>,
    #[serde(default)]
    externals: Vec<ExternalSymbol>,
    #[serde(default)]
    value_types: Vec<String>,
    #[serde(default)]
    generic_types: Vec<GenericType>,
}

/// The whole program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    files: BTreeMap<String, SourceFile>,
    externals: Vec<ExternalSymbol>,
    value_types: Vec<String>,
    generic_types: Vec<GenericType>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Add a file, replacing any file with the same path.
    pub fn add_file(&mut self, file: SourceFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn with_file(mut self, file: SourceFile) -> Self {
        self.add_file(file);
        self
    }

    pub fn add_external(&mut self, symbol: ExternalSymbol) {
        self.externals.push(symbol);
    }

    pub fn with_external(mut self, symbol: ExternalSymbol) -> Self {
        self.add_external(symbol);
        self
    }

    /// Register a user-defined value type (struct or enum) by name.
    pub fn add_value_type(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.value_types.contains(&name) {
            self.value_types.push(name);
        }
    }

    /// Register the type parameters of a generic container.
    pub fn add_generic_type(&mut self, generic: GenericType) {
        self.generic_types.push(generic);
    }

    pub fn with_generic_type(mut self, generic: GenericType) -> Self {
        self.add_generic_type(generic);
        self
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn file_mut(&mut self, path: &str) -> Option<&mut SourceFile> {
        self.files.get_mut(path)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn externals(&self) -> &[ExternalSymbol] {
        &self.externals
    }

    pub fn value_types(&self) -> &[String] {
        &self.value_types
    }

    pub fn generic_types(&self) -> &[GenericType] {
        &self.generic_types
    }

    /// Every declaration with its file path.
    pub fn declarations(&self) -> impl Iterator<Item = (&str, &Declaration)> {
        self.files.values().flat_map(|file| {
            file.declarations
                .iter()
                .map(move |decl| (file.path.as_str(), decl))
        })
    }

    /// Files with at least one applied mutation.
    pub fn modified_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values().filter(|f| f.is_modified())
    }

    /// Parse a model document from JSON text.
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self, NullpropError> {
        let doc: ModelDocument =
            serde_json::from_str(json).map_err(|source| NullpropError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        let mut program = Program::new();
        program.merge(doc)?;
        Ok(program)
    }

    /// Load a model file, or every `*.json` model file below a directory.
    pub fn load(path: &Path) -> Result<Self, NullpropError> {
        if !path.is_dir() {
            let json = read_to_string(path)?;
            return Program::from_json_str(&json, path);
        }

        let mut program = Program::new();
        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.file_name() != DEFAULT_OUT_DIR);
        for entry in walker {
            let entry = entry.map_err(|e| NullpropError::Read {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
            let file_path = entry.path();
            if !entry.file_type().is_file()
                || file_path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            debug!(path = %file_path.display(), "loading model document");
            let json = read_to_string(file_path)?;
            let doc: ModelDocument =
                serde_json::from_str(&json).map_err(|source| NullpropError::Parse {
                    path: file_path.to_path_buf(),
                    source,
                })?;
            program.merge(doc)?;
        }
        Ok(program)
    }

    /// Serialize the whole program as a model document.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let doc = ModelDocument {
            files: self.files.values().cloned().collect(),
            externals: self.externals.clone(),
            value_types: self.value_types.clone(),
            generic_types: self.generic_types.clone(),
        };
        serde_json::to_string_pretty(&doc)
    }

    /// Fold a document in. A file path already present is an error: the
    /// second document's declarations would otherwise be lost.
    fn merge(&mut self, doc: ModelDocument) -> Result<(), NullpropError> {
        for file in doc.files {
            if self.files.contains_key(&file.path) {
                return Err(NullpropError::DuplicateFile { path: file.path });
            }
            self.add_file(file);
        }
        self.externals.extend(doc.externals);
        for name in doc.value_types {
            self.add_value_type(name);
        }
        self.generic_types.extend(doc.generic_types);
        Ok(())
    }
}

fn read_to_string(path: &Path) -> Result<String, NullpropError> {
    fs::read_to_string(path).map_err(|source| NullpropError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{FieldDecl, MethodDecl, TypeConstraint};

    const DOC: &str = r#"{
        "files": [{
            "path": "C.cs",
            "declarations": [
                { "decl": "field", "container": "C", "name": "f", "ty": "string" },
                { "decl": "method", "container": "C", "name": "F",
                  "params": [{ "name": "s", "ty": "string" }],
                  "returns": "string?",
                  "body": [{ "stmt": "return", "value": { "expr": "param", "name": "s" } }] }
            ]
        }],
        "externals": [{ "key": "M:Lib.Read(string)", "returns": "string?", "params": ["string"] }],
        "value_types": ["Point"]
    }"#;

    #[test]
    fn parses_model_documents() {
        let program = Program::from_json_str(DOC, Path::new("model.json")).unwrap();
        let file = program.file("C.cs").unwrap();
        assert_eq!(file.declarations.len(), 2);
        assert!(!file.is_modified());
        assert_eq!(program.externals()[0].key.as_str(), "M:Lib.Read(string)");
        assert_eq!(program.value_types(), &["Point".to_string()]);

        let method = file.declarations[1].as_method().unwrap();
        assert_eq!(method.key().as_str(), "M:C.F(string)");
        assert!(method.returns.as_ref().unwrap().nullable);
    }

    #[test]
    fn bad_json_reports_the_origin() {
        let err = Program::from_json_str("{ nope", Path::new("broken.json")).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse broken.json"));
    }

    #[test]
    fn loads_and_merges_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = Program::new().with_file(SourceFile::new(
            "A.cs",
            vec![Declaration::Field(FieldDecl::new(
                "A",
                "f",
                TypeSyntax::named("string"),
            ))],
        ));
        let b = Program::new().with_file(SourceFile::new(
            "B.cs",
            vec![Declaration::Method(MethodDecl::new("B", "Run"))],
        ));
        fs::write(dir.path().join("a.json"), a.to_json_string().unwrap()).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested").join("b.json"),
            b.to_json_string().unwrap(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let program = Program::load(dir.path()).unwrap();
        let paths: Vec<&str> = program.files().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["A.cs", "B.cs"]);
    }

    fn field_file(path: &str, name: &str) -> Program {
        Program::new().with_file(SourceFile::new(
            path,
            vec![Declaration::Field(FieldDecl::new(
                "A",
                name,
                TypeSyntax::named("string"),
            ))],
        ))
    }

    #[test]
    fn a_file_declared_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let one = field_file("A.cs", "one").to_json_string().unwrap();
        let two = field_file("A.cs", "two").to_json_string().unwrap();
        fs::write(dir.path().join("a.json"), one).unwrap();
        fs::write(dir.path().join("b.json"), two).unwrap();

        let err = Program::load(dir.path()).unwrap_err();
        assert!(matches!(err, NullpropError::DuplicateFile { ref path } if path == "A.cs"));
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn directory_loads_skip_the_default_output() {
        let dir = tempfile::tempdir().unwrap();
        let model = field_file("A.cs", "one").to_json_string().unwrap();
        fs::write(dir.path().join("model.json"), &model).unwrap();
        fs::create_dir(dir.path().join(DEFAULT_OUT_DIR)).unwrap();
        fs::write(dir.path().join(DEFAULT_OUT_DIR).join("A.json"), &model).unwrap();

        let program = Program::load(dir.path()).unwrap();
        assert_eq!(program.files().count(), 1);
    }

    #[test]
    fn generic_types_survive_a_round_trip() {
        let program = field_file("A.cs", "one").with_generic_type(GenericType::new(
            "Cache<K, V>",
            vec![TypeParam::new("V").with_constraint(TypeConstraint::Class)],
        ));
        let json = program.to_json_string().unwrap();
        let reloaded = Program::from_json_str(&json, Path::new("model.json")).unwrap();
        assert_eq!(reloaded.generic_types(), program.generic_types());
    }
}
