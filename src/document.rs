//! Workflow document codec
//!
//! Loads workflow YAML into an order-preserving `serde_yaml::Value` tree and
//! writes it back out. `serde_yaml` drops comments, so the leading comment
//! block and `---` marker are captured separately and re-attached on dump.

use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::config::CodecConfig;
use crate::error::{Result, UpdaterError};

/// One line of the preamble that precedes the first YAML content line
#[derive(Debug, Clone, PartialEq)]
enum HeaderLine {
    Comment(String),
    Blank,
    DocumentStart,
}

/// A parsed workflow document
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    header: Vec<HeaderLine>,
}

impl Document {
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// Declared workflow name (`name:` at the root)
    pub fn name(&self) -> Option<&str> {
        self.root.get("name").and_then(Value::as_str)
    }

    /// The `jobs.<key>` mapping, if present and a mapping
    pub fn job(&self, key: &str) -> Option<&Mapping> {
        self.root.get("jobs")?.get(key)?.as_mapping()
    }

    pub fn job_mut(&mut self, key: &str) -> Option<&mut Mapping> {
        self.root.get_mut("jobs")?.get_mut(key)?.as_mapping_mut()
    }
}

/// Round-trip codec for workflow documents
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Read and parse a workflow file, returning the raw text alongside
    pub fn load(&self, path: &Path) -> Result<(String, Document)> {
        let text = fs::read_to_string(path).map_err(|source| UpdaterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document = self.parse(&text)?;
        Ok((text, document))
    }

    pub fn parse(&self, text: &str) -> Result<Document> {
        let text = normalize_line_endings(text);
        let root: Value = serde_yaml::from_str(&text)?;
        Ok(Document {
            root,
            header: scan_header(&text),
        })
    }

    /// Serialize with `\n` line endings
    pub fn dump(&self, document: &Document) -> Result<String> {
        let body = serde_yaml::to_string(&document.root)
            .map_err(|source| UpdaterError::Serialize { source })?;

        let mut out = String::with_capacity(body.len());
        for line in self.header_lines(&document.header) {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&body);
        Ok(normalize_line_endings(&out))
    }

    fn header_lines<'a>(&self, header: &'a [HeaderLine]) -> Vec<&'a str> {
        let mut lines: Vec<&str> = header
            .iter()
            .filter_map(|line| match line {
                HeaderLine::Comment(text) if self.config.preserve_header_comments => {
                    Some(text.as_str())
                }
                HeaderLine::Blank if self.config.preserve_header_comments => Some(""),
                HeaderLine::DocumentStart if self.config.preserve_document_start => Some("---"),
                _ => None,
            })
            .collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        while lines.first().is_some_and(|l| l.is_empty()) {
            lines.remove(0);
        }
        lines
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn scan_header(text: &str) -> Vec<HeaderLine> {
    let mut header = Vec::new();
    let mut seen_start = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            header.push(HeaderLine::Blank);
        } else if trimmed.starts_with('#') {
            header.push(HeaderLine::Comment(line.trim_end().to_string()));
        } else if trimmed == "---" && !seen_start {
            seen_start = true;
            header.push(HeaderLine::DocumentStart);
        } else {
            break;
        }
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> Codec {
        Codec::default()
    }

    #[test]
    fn parse_exposes_name_and_jobs() {
        let doc = codec()
            .parse("name: Smoke\njobs:\n  compare:\n    runs-on: ubuntu-latest\n")
            .unwrap();
        assert_eq!(doc.name(), Some("Smoke"));
        assert!(doc.job("compare").is_some());
        assert!(doc.job("missing").is_none());
    }

    #[test]
    fn job_that_is_not_a_mapping_is_absent() {
        let mut doc = codec().parse("jobs:\n  compare: nope\n").unwrap();
        assert!(doc.job("compare").is_none());
        assert!(doc.job_mut("compare").is_none());
    }

    #[test]
    fn on_key_stays_a_string() {
        let doc = codec().parse("on:\n  push: {}\n").unwrap();
        assert!(doc.root().get("on").is_some());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = codec().parse("jobs: [unclosed\n").unwrap_err();
        assert_eq!(err.code(), "WFU-002");
    }

    #[test]
    fn dump_keeps_key_order() {
        let c = codec();
        let doc = c.parse("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        assert_eq!(c.dump(&doc).unwrap(), "zeta: 1\nalpha: 2\nmid: 3\n");
    }

    #[test]
    fn dump_reattaches_header_comments_and_marker() {
        let c = codec();
        let text = "# Managed by update-workflows\n\n---\nname: Smoke\n";
        let doc = c.parse(text).unwrap();
        assert_eq!(
            c.dump(&doc).unwrap(),
            "# Managed by update-workflows\n\n---\nname: Smoke\n"
        );
    }

    #[test]
    fn header_preservation_can_be_disabled() {
        let c = Codec::new(CodecConfig {
            preserve_header_comments: false,
            preserve_document_start: false,
        });
        let doc = c.parse("# comment\n---\nname: Smoke\n").unwrap();
        assert_eq!(c.dump(&doc).unwrap(), "name: Smoke\n");
    }

    #[test]
    fn crlf_input_dumps_with_lf() {
        let c = codec();
        let doc = c.parse("# head\r\nname: Smoke\r\n").unwrap();
        let out = c.dump(&doc).unwrap();
        assert!(!out.contains('\r'));
        assert_eq!(out, "# head\nname: Smoke\n");
    }

    #[test]
    fn dump_then_parse_is_semantically_identical() {
        let c = codec();
        let text = "name: CI\non:\n  workflow_dispatch: {}\njobs:\n  a:\n    steps:\n    - run: |\n        echo one\n        echo two\n";
        let doc = c.parse(text).unwrap();
        let again = c.parse(&c.dump(&doc).unwrap()).unwrap();
        assert_eq!(doc.root(), again.root());
    }
}
