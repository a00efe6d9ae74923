//! Classes and the program arena that owns every method of one compilation.

use std::fmt;

use super::method::Method;
use super::operand::InternalType;
use crate::core::CompilationSession;
use crate::layout::TypeLayoutResolver;
use crate::metadata::{TypeId, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A class being compiled.
///
/// The identity is the target full name, so a namespace override recorded at
/// ingestion is already applied here.
#[derive(Debug, Clone)]
pub struct Class {
    type_id: TypeId,
    full_name: String,
    methods: Vec<MethodId>,
}

impl Class {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn methods(&self) -> &[MethodId] {
        &self.methods
    }

    /// Internal type of the named field, `NotSet` if there is no such field.
    pub fn field_type(&self, registry: &TypeRegistry, field_name: &str) -> InternalType {
        TypeLayoutResolver::new(registry).field_type(registry.descriptor(self.type_id), field_name)
    }

    pub fn internal_type(&self, session: &CompilationSession<'_>, registry: &TypeRegistry) -> InternalType {
        session.class_layout(registry, self.type_id).internal_type
    }

    pub fn size(&self, session: &CompilationSession<'_>, registry: &TypeRegistry) -> i32 {
        session.class_layout(registry, self.type_id).size
    }
}

/// Owner of every class and method of one compilation.
#[derive(Debug, Default)]
pub struct Program {
    classes: Vec<Class>,
    methods: Vec<Method>,
    /// Owning class of each method, parallel to `methods`.
    owners: Vec<ClassId>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class for a registered type.
    pub fn add_class(&mut self, registry: &TypeRegistry, type_id: TypeId) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(Class {
            type_id,
            full_name: registry.descriptor(type_id).target_full_name(),
            methods: Vec::new(),
        });
        id
    }

    /// Move `method` into the arena and attach it to `class`.
    pub fn add_method(&mut self, class: ClassId, method: Method) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(method);
        self.owners.push(class);
        self.classes[class.index()].methods.push(id);
        id
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.index()]
    }

    pub fn owner(&self, id: MethodId) -> ClassId {
        self.owners[id.index()]
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(index, class)| (ClassId(index as u32), class))
    }

    /// Every method in arena order, which is also emission order.
    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(index, method)| (MethodId(index as u32), method))
    }

    pub fn class_methods(&self, class: ClassId) -> impl Iterator<Item = &Method> {
        self.class(class).methods.iter().map(|&id| self.method(id))
    }

    pub fn find_class(&self, full_name: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .position(|class| class.full_name == full_name)
            .map(|index| ClassId(index as u32))
    }

    /// `Namespace.Class::Method`
    pub fn qualified_name(&self, id: MethodId) -> String {
        let class = self.class(self.owner(id));
        format!("{}::{}", class.full_name, self.method(id).name())
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}
