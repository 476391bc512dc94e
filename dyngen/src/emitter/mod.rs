//! Structural source emitter
//!
//! `SourceWriter` accumulates generated source text and keeps the indentation
//! equal to the number of open blocks. Blocks are opened and closed explicitly,
//! through `BLOCK:`/`END` markers in template text, or through a [`BlockGuard`]
//! that closes its block when dropped.

pub mod block;
pub mod descriptor;

pub use block::BlockGuard;
pub use descriptor::{ArgDef, HasValueType, MemberAccess, MethodDef, TypeRef, ValueType};

use thiserror::Error;

/// Marker that opens a block in template text; the rest of the line is the header.
pub const BLOCK_MARKER: &str = "BLOCK:";
/// Marker that closes the innermost block; the rest of the line trails the delimiter.
pub const END_MARKER: &str = "END";

const INDENT: &str = "    ";

/// Errors raised when generated text would be unbalanced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("unbalanced block: finish_block called with no open block")]
    CloseWithoutOpen,

    #[error("unbalanced block: {} block(s) still open: {}", .0.len(), .0.join(", "))]
    UnclosedBlocks(Vec<String>),
}

/// Target syntax of the emitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Brace-delimited blocks (`{` on its own line, `}` to close).
    #[default]
    Rust,
    /// WebAssembly text: the header line opens the form, `)` closes it.
    Wat,
}

impl Dialect {
    pub fn open_delimiter(&self) -> Option<&'static str> {
        match self {
            Dialect::Rust => Some("{"),
            Dialect::Wat => None,
        }
    }

    pub fn close_delimiter(&self) -> &'static str {
        match self {
            Dialect::Rust => "}",
            Dialect::Wat => ")",
        }
    }

    pub fn namespace_header(&self, name: &str) -> String {
        match self {
            Dialect::Rust => format!("pub mod {}", name),
            Dialect::Wat => format!("(module ${}", name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceWriter {
    text: String,
    dialect: Dialect,
    /// Labels of the currently open blocks, innermost last.
    open_blocks: Vec<String>,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn indentation_level(&self) -> usize {
        self.open_blocks.len()
    }

    pub fn write_line(&mut self, text: &str) {
        for _ in 0..self.open_blocks.len() {
            self.text.push_str(INDENT);
        }
        self.text.push_str(text);
        self.text.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.text.push('\n');
    }

    /// Write multi-line template text, honoring the `BLOCK:` and `END` markers.
    /// Backticks become double quotes.
    pub fn write(&mut self, text: &str) -> Result<(), EmitError> {
        if text.is_empty() {
            self.blank_line();
            return Ok(());
        }

        for raw in text.lines() {
            let line = raw.replace('`', "\"");
            let trimmed = line.trim_start();

            if trimmed.is_empty() {
                self.blank_line();
            } else if let Some(header) = trimmed.strip_prefix(BLOCK_MARKER) {
                let header = header.trim();
                self.write_line(header);
                self.open_block(header.to_string());
            } else if let Some(trailing) = end_marker_trailing(trimmed) {
                let trailing = trailing.trim();
                self.finish_block((!trailing.is_empty()).then_some(trailing))?;
            } else {
                self.write_line(&line);
            }
        }
        Ok(())
    }

    pub fn start_block(&mut self) {
        self.open_block(String::from("<block>"));
    }

    /// Close the innermost block, writing the closing delimiter followed by
    /// `trailing` and a blank line.
    pub fn finish_block(&mut self, trailing: Option<&str>) -> Result<(), EmitError> {
        if self.open_blocks.pop().is_none() {
            return Err(EmitError::CloseWithoutOpen);
        }

        let close = self.dialect.close_delimiter();
        match trailing {
            Some(extra) if !extra.is_empty() => self.write_line(&format!("{}{}", close, extra)),
            _ => self.write_line(close),
        }
        self.blank_line();
        Ok(())
    }

    /// Write an optional declaration line and open a block that is closed when
    /// the returned guard goes out of scope.
    pub fn scoped_block(&mut self, declaration: Option<&str>) -> BlockGuard<'_> {
        let label = match declaration {
            Some(line) if !line.is_empty() => {
                self.write_line(line);
                line.to_string()
            }
            _ => String::from("<block>"),
        };
        self.open_block(label);
        BlockGuard::new(self)
    }

    pub fn start_class(&mut self, declaration: &str) -> BlockGuard<'_> {
        self.scoped_block(Some(declaration))
    }

    pub fn write_method(&mut self, method: &MethodDef) -> BlockGuard<'_> {
        let mut lines = method.declaration(self.dialect);
        let header = lines.pop().unwrap_or_default();
        for line in &lines {
            self.write_line(line);
        }
        self.scoped_block(Some(&header))
    }

    /// Write a namespace header and open its block. The caller closes it.
    pub fn start_namespace(&mut self, name: &str) {
        let header = self.dialect.namespace_header(name);
        self.write_line(&header);
        self.open_block(header);
    }

    pub fn rendered_text(&self) -> Result<String, EmitError> {
        self.check_balanced()?;
        Ok(self.text.clone())
    }

    pub fn into_text(self) -> Result<String, EmitError> {
        self.check_balanced()?;
        Ok(self.text)
    }

    fn check_balanced(&self) -> Result<(), EmitError> {
        if self.open_blocks.is_empty() {
            Ok(())
        } else {
            Err(EmitError::UnclosedBlocks(self.open_blocks.clone()))
        }
    }

    fn open_block(&mut self, label: String) {
        if let Some(open) = self.dialect.open_delimiter() {
            self.write_line(open);
        }
        self.open_blocks.push(label);
    }
}

/// `Some(rest)` when `line` is the end marker, optionally followed by
/// trailing text that does not continue an identifier (`END;`, `END )`).
fn end_marker_trailing(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(END_MARKER)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_alphanumeric() || c == '_' => None,
        Some(_) => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_marker_template() {
        let mut writer = SourceWriter::new();
        writer.write("BLOCK: class Foo\nint x;\nEND;").unwrap();

        assert_eq!(
            writer.rendered_text().unwrap(),
            "class Foo\n{\n    int x;\n};\n\n"
        );
    }

    #[test]
    fn test_backticks_become_quotes() {
        let mut writer = SourceWriter::new();
        writer.write("let s = `hello`;").unwrap();
        assert_eq!(writer.rendered_text().unwrap(), "let s = \"hello\";\n");
    }

    #[test]
    fn test_empty_write_is_blank_line() {
        let mut writer = SourceWriter::new();
        writer.write("").unwrap();
        writer.write("a\n\nb").unwrap();
        assert_eq!(writer.rendered_text().unwrap(), "\na\n\nb\n");
    }

    #[test]
    fn test_end_prefix_inside_identifier_is_not_a_marker() {
        let mut writer = SourceWriter::new();
        writer.write("BLOCK:fn f()\nENDPOINT;\nEND").unwrap();
        assert_eq!(
            writer.rendered_text().unwrap(),
            "fn f()\n{\n    ENDPOINT;\n}\n\n"
        );
    }

    #[test]
    fn test_indented_markers_are_recognized() {
        let mut writer = SourceWriter::new();
        writer
            .write("BLOCK:mod outer\n    BLOCK:fn inner()\n    END\nEND")
            .unwrap();
        assert_eq!(
            writer.rendered_text().unwrap(),
            "mod outer\n{\n    fn inner()\n    {\n    }\n\n}\n\n"
        );
    }

    #[test]
    fn test_finish_without_open_block_fails() {
        let mut writer = SourceWriter::new();
        writer.write_line("x");
        assert_eq!(writer.finish_block(None), Err(EmitError::CloseWithoutOpen));
        assert_eq!(writer.indentation_level(), 0);
        assert_eq!(writer.rendered_text().unwrap(), "x\n");
    }

    #[test]
    fn test_end_marker_without_open_block_fails() {
        let mut writer = SourceWriter::new();
        assert_eq!(writer.write("END;"), Err(EmitError::CloseWithoutOpen));
    }

    #[test]
    fn test_unclosed_blocks_are_reported() {
        let mut writer = SourceWriter::new();
        writer.start_namespace("generated");
        writer.write("BLOCK:struct Point").unwrap();

        let err = writer.rendered_text().unwrap_err();
        assert_eq!(
            err,
            EmitError::UnclosedBlocks(vec![
                "pub mod generated".to_string(),
                "struct Point".to_string()
            ])
        );
        assert!(err.to_string().contains("2 block(s) still open"));
    }

    #[test]
    fn test_indentation_tracks_open_blocks() {
        let mut writer = SourceWriter::new();
        writer.start_block();
        writer.start_block();
        assert_eq!(writer.indentation_level(), 2);
        writer.write_line("deep");
        writer.finish_block(Some(";")).unwrap();
        writer.finish_block(None).unwrap();

        assert_eq!(
            writer.into_text().unwrap(),
            "{\n    {\n        deep\n    };\n\n}\n\n"
        );
    }

    #[test]
    fn test_wat_dialect_blocks() {
        let mut writer = SourceWriter::for_dialect(Dialect::Wat);
        writer.start_namespace("gen");
        {
            let mut func = writer.write_method(
                &MethodDef::new("answer").returns(ValueType::I32),
            );
            func.write_line("i32.const 42");
        }
        writer.finish_block(None).unwrap();

        assert_eq!(
            writer.rendered_text().unwrap(),
            "(module $gen\n    (func $answer (export \"answer\") (result i32)\n        i32.const 42\n    )\n\n)\n\n"
        );
    }

    #[test]
    fn test_write_method_in_rust_dialect() {
        let mut writer = SourceWriter::new();
        {
            let mut method = writer.write_method(
                &MethodDef::new("add")
                    .returns(ValueType::I32)
                    .with_arg("a", ValueType::I32)
                    .with_arg("b", ValueType::I32),
            );
            method.write_line("a + b");
        }

        assert_eq!(
            writer.rendered_text().unwrap(),
            "#[no_mangle]\npub extern \"C\" fn add(a: i32, b: i32) -> i32\n{\n    a + b\n}\n\n"
        );
    }
}
