//! Raw definition document with write-back support.

use crate::error::DefinitionError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization format of a definition document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from the file extension; anything but `.yaml`/`.yml`
    /// is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// The definition document as read from disk.
///
/// The loader only reads from it. The sequence persister mutates it once all
/// publishing has finished and writes it back to the same path.
#[derive(Debug, Clone)]
pub struct DefinitionDocument {
    path: PathBuf,
    format: DocumentFormat,
    root: Value,
}

impl DefinitionDocument {
    /// Read a document from disk. The path is made absolute so that relative
    /// payload paths resolve against the document's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let requested = path.as_ref();
        let path = std::path::absolute(requested).map_err(|source| DefinitionError::Read {
            path: requested.to_path_buf(),
            source,
        })?;
        let content = fs::read_to_string(&path).map_err(|source| DefinitionError::Read {
            path: path.clone(),
            source,
        })?;
        let format = DocumentFormat::from_path(&path);
        Self::parse(&content, format, path)
    }

    /// Parse a document from a string, recording `path` as its location.
    pub fn parse(
        content: &str,
        format: DocumentFormat,
        path: impl Into<PathBuf>,
    ) -> Result<Self, DefinitionError> {
        let root: Value = match format {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => serde_yaml::from_str(content)?,
        };

        if !root.is_object() {
            return Err(DefinitionError::NotAnObject);
        }

        Ok(Self {
            path: path.into(),
            format,
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the document.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// Pretty-print the document in its original format.
    pub fn to_pretty_string(&self) -> Result<String, DefinitionError> {
        let mut content = match self.format {
            DocumentFormat::Json => serde_json::to_string_pretty(&self.root)?,
            DocumentFormat::Yaml => serde_yaml::to_string(&self.root)?,
        };
        if !content.ends_with('\n') {
            content.push('\n');
        }
        Ok(content)
    }

    /// Write the document back to its path.
    pub fn save(&self) -> Result<(), DefinitionError> {
        let content = self.to_pretty_string()?;
        fs::write(&self.path, content).map_err(|source| DefinitionError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("def.json")),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("def.YML")),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("def")),
            DocumentFormat::Json
        );
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err =
            DefinitionDocument::parse("[1, 2]", DocumentFormat::Json, "/tmp/def.json").unwrap_err();
        assert!(matches!(err, DefinitionError::NotAnObject));
    }

    #[test]
    fn test_yaml_document() {
        let doc = DefinitionDocument::parse(
            "exchange: orders\npayloads:\n  - a.tpl\n",
            DocumentFormat::Yaml,
            "/defs/def.yaml",
        )
        .unwrap();

        assert_eq!(doc.root()["exchange"], "orders");
        assert_eq!(doc.base_dir(), PathBuf::from("/defs"));
    }

    #[test]
    fn test_save_preserves_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("def.json");
        fs::write(&path, r#"{"zeta": 1, "alpha": 2, "payloads": []}"#).unwrap();

        let doc = DefinitionDocument::from_file(&path).unwrap();
        doc.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let zeta = written.find("zeta").unwrap();
        let alpha = written.find("alpha").unwrap();
        assert!(zeta < alpha);
        assert!(written.ends_with('\n'));
    }
}
