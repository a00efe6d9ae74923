// This module places compiled methods into one code image and emits the metadata the
// kernel needs at run time. ImageBuilder appends each method's machine code at the next
// address aligned to the configured method alignment, padding the gap with INT3, and
// records the method's [begin, end) range in the MethodBoundaryTable under its
// qualified name. The finished Image can be written as an ELF32/i386 relocatable object
// with the code in .text, the fixed-stride boundary records in .method_boundaries, the
// NUL-terminated names in .method_names, and one text symbol per method. The object is
// meant to be loaded at the image base; no relocations are emitted because all branches
// inside the code are relative. compile_program drives the whole pipeline for a Program.

//! Code image and method-boundary emission.

use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, Object as _, ObjectSection as _, SectionKind,
    SymbolFlags, SymbolKind, SymbolScope,
};

use crate::core::{CompilationSession, CompileError, CompileResult, CompilerOptions};
use crate::ir::Program;
use crate::runtime::{MethodBoundary, MethodBoundaryTable};
use crate::x86::MethodCompiler;

/// Section holding the serialized boundary records.
pub const BOUNDARIES_SECTION: &str = ".method_boundaries";
/// Section holding the method name table.
pub const NAMES_SECTION: &str = ".method_names";

/// Filler between methods.
const INT3: u8 = 0xCC;

pub struct ImageBuilder {
    base: u32,
    alignment: u32,
    code: Vec<u8>,
    table: MethodBoundaryTable,
    names: Vec<String>,
}

impl ImageBuilder {
    pub fn new(options: &CompilerOptions) -> Self {
        Self {
            base: options.image_base,
            alignment: options.method_alignment.max(1),
            code: Vec::new(),
            table: MethodBoundaryTable::new(),
            names: Vec::new(),
        }
    }

    /// Address the next method will be placed at.
    pub fn next_address(&self) -> CompileResult<u32> {
        u32::try_from(self.code.len())
            .ok()
            .and_then(|len| self.base.checked_add(len))
            .and_then(|end| end.checked_next_multiple_of(self.alignment))
            .ok_or_else(|| CompileError::BoundaryTable {
                reason: "image is full: no aligned address left in the 32-bit address space"
                    .to_string(),
            })
    }

    /// Append the code of method `name`, which must have been assembled for
    /// [`Self::next_address`].
    pub fn push_method(&mut self, name: &str, code: &[u8]) -> CompileResult<MethodBoundary> {
        let begin = self.next_address()?;
        let end = u32::try_from(code.len())
            .ok()
            .and_then(|len| begin.checked_add(len))
            .ok_or_else(|| CompileError::BoundaryTable {
                reason: format!("{name} does not fit the 32-bit address space"),
            })?;

        let method = self.table.push(begin, end, name)?;
        self.code.resize((begin - self.base) as usize, INT3);
        self.code.extend_from_slice(code);
        self.names.push(name.to_string());

        log::debug!("Placed {name} at [{begin:#x}, {end:#x})");
        Ok(MethodBoundary { begin, end, method })
    }

    pub fn finish(self) -> Image {
        Image {
            base: self.base,
            code: self.code,
            table: self.table,
            names: self.names,
        }
    }
}

/// A finished code image.
#[derive(Debug, Clone)]
pub struct Image {
    pub base: u32,
    pub code: Vec<u8>,
    pub table: MethodBoundaryTable,
    /// Qualified method names, parallel to the table entries.
    names: Vec<String>,
}

impl Image {
    /// Machine code of one method.
    pub fn method_code(&self, boundary: &MethodBoundary) -> &[u8] {
        let start = (boundary.begin - self.base) as usize;
        let end = (boundary.end - self.base) as usize;
        &self.code[start..end]
    }

    /// Write the image as an ELF32 relocatable object.
    pub fn to_object(&self) -> CompileResult<Vec<u8>> {
        let mut object = Object::new(BinaryFormat::Elf, Architecture::I386, Endianness::Little);

        let text = object.section_id(StandardSection::Text);
        object.append_section_data(text, &self.code, 16);

        let boundaries = object.add_section(
            Vec::new(),
            BOUNDARIES_SECTION.as_bytes().to_vec(),
            SectionKind::ReadOnlyData,
        );
        object.append_section_data(boundaries, &self.table.records_bytes(), 4);

        let names = object.add_section(
            Vec::new(),
            NAMES_SECTION.as_bytes().to_vec(),
            SectionKind::ReadOnlyString,
        );
        object.append_section_data(names, self.table.names_bytes(), 1);

        for (boundary, name) in self.table.entries().iter().zip(&self.names) {
            object.add_symbol(Symbol {
                name: name.as_bytes().to_vec(),
                value: (boundary.begin - self.base) as u64,
                size: boundary.len() as u64,
                kind: SymbolKind::Text,
                scope: SymbolScope::Linkage,
                weak: false,
                section: SymbolSection::Section(text),
                flags: SymbolFlags::None,
            });
        }

        Ok(object.write()?)
    }
}

/// Read the boundary table back out of an object written by [`Image::to_object`].
pub fn read_boundary_table(data: &[u8]) -> CompileResult<MethodBoundaryTable> {
    let file = object::File::parse(data)?;
    MethodBoundaryTable::from_bytes(
        section_data(&file, BOUNDARIES_SECTION)?,
        section_data(&file, NAMES_SECTION)?,
    )
}

fn section_data<'d>(file: &object::File<'d>, name: &str) -> CompileResult<&'d [u8]> {
    let section = file
        .section_by_name(name)
        .ok_or_else(|| CompileError::BoundaryTable {
            reason: format!("object has no {name} section"),
        })?;
    Ok(section.data()?)
}

/// Compile every method of `program` into one image, in arena order.
pub fn compile_program(session: &CompilationSession<'_>, program: &Program) -> CompileResult<Image> {
    let compiler = MethodCompiler::new(session);
    let mut builder = ImageBuilder::new(session.options());

    for (id, method) in program.methods() {
        let name = session.intern_str(&program.qualified_name(id));
        let address = builder.next_address()?;
        let code = compiler.compile(method, address)?;
        builder.push_method(name, &code)?;
    }

    let image = builder.finish();
    log::info!(
        "Compiled {} methods into {} bytes at {:#x}",
        image.table.len(),
        image.code.len(),
        image.base
    );
    Ok(image)
}
