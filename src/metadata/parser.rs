//! Parser for the type description format.
//!
//! The format stands in for bytecode ingestion in tests and tools. It is
//! line oriented:
//!
//! ```text
//! ; Comments start with semicolon
//! namespace Kernel
//!
//! enum Color {
//!     special value__ : uint8
//!     static Black : Kernel.Color
//! }
//!
//! struct Packed explicit {
//!     a : int32 @ 0
//!     b : uint8 @ 4
//! }
//!
//! class Screen [target_namespace = SharpOS.Kernel] {
//!     static x : int32
//! }
//! ```

use super::{FieldDescriptor, TypeDescriptor, TypeKind};
use crate::core::{CompileError, CompileResult};

pub fn parse_types(text: &str) -> CompileResult<Vec<TypeDescriptor>> {
    Parser::new(text).parse()
}

struct Parser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    namespace: String,
    types: Vec<TypeDescriptor>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            namespace: String::new(),
            types: Vec::new(),
            line: 0,
        }
    }

    fn parse(mut self) -> CompileResult<Vec<TypeDescriptor>> {
        while let Some(line) = self.next_line() {
            if let Some(namespace) = line.strip_prefix("namespace ") {
                self.namespace = namespace.trim().to_string();
                continue;
            }

            let descriptor = self.parse_type(line)?;
            self.types.push(descriptor);
        }

        Ok(self.types)
    }

    /// Next non-empty line with comments stripped.
    fn next_line(&mut self) -> Option<&'a str> {
        for (index, raw) in self.lines.by_ref() {
            self.line = index + 1;
            let line = match raw.find(';') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();

            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    fn error(&self, reason: impl Into<String>) -> CompileError {
        CompileError::Parse {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn parse_type(&mut self, header: &str) -> CompileResult<TypeDescriptor> {
        let header = header
            .strip_suffix('{')
            .ok_or_else(|| self.error("Expected '{' at end of type header"))?
            .trim();

        // Attributes are bracketed and trail the header.
        let (header, attribute) = match header.find('[') {
            Some(pos) => {
                let attribute = header[pos..]
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| self.error("Unterminated attribute"))?;
                (header[..pos].trim(), Some(attribute.trim()))
            }
            None => (header, None),
        };

        let mut words = header.split_whitespace();
        let kind = match words.next() {
            Some("enum") => TypeKind::Enum,
            Some("struct") => TypeKind::ValueType,
            Some("class") => TypeKind::ReferenceType,
            Some("interface") => TypeKind::Interface,
            Some(other) => return Err(self.error(format!("Unknown type kind '{other}'"))),
            None => return Err(self.error("Missing type kind")),
        };
        let name = words
            .next()
            .ok_or_else(|| self.error("Missing type name"))?;

        let mut descriptor = TypeDescriptor::new(&self.namespace, name, kind);
        for modifier in words {
            match modifier {
                "explicit" => descriptor.explicit_layout = true,
                "sequential" => descriptor.explicit_layout = false,
                other => return Err(self.error(format!("Unknown type modifier '{other}'"))),
            }
        }

        if let Some(attribute) = attribute {
            descriptor.override_namespace = Some(self.parse_attribute(attribute)?);
        }

        loop {
            let line = self
                .next_line()
                .ok_or_else(|| self.error(format!("Unterminated type {name}")))?;
            if line == "}" {
                break;
            }
            let field = self.parse_field(line)?;
            descriptor.fields.push(field);
        }

        Ok(descriptor)
    }

    fn parse_attribute(&self, attribute: &str) -> CompileResult<String> {
        let (key, value) = attribute
            .split_once('=')
            .ok_or_else(|| self.error("Expected 'key = value' attribute"))?;

        match key.trim() {
            "target_namespace" => Ok(value.trim().to_string()),
            other => Err(self.error(format!("Unknown attribute '{other}'"))),
        }
    }

    fn parse_field(&self, line: &str) -> CompileResult<FieldDescriptor> {
        let (declaration, offset) = match line.split_once('@') {
            Some((declaration, offset)) => {
                let offset = offset
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| self.error(format!("Invalid field offset: {e}")))?;
                (declaration, Some(offset))
            }
            None => (line, None),
        };

        let (left, type_name) = declaration
            .split_once(':')
            .ok_or_else(|| self.error("Expected 'name : type' field"))?;
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return Err(self.error("Missing field type"));
        }

        let mut words: Vec<&str> = left.split_whitespace().collect();
        let name = words
            .pop()
            .ok_or_else(|| self.error("Missing field name"))?;

        let mut field = FieldDescriptor::instance(name, type_name);
        field.offset = offset;
        for modifier in words {
            match modifier {
                "static" => field.is_static = true,
                "special" => field.is_runtime_special = true,
                other => return Err(self.error(format!("Unknown field modifier '{other}'"))),
            }
        }

        Ok(field)
    }
}
