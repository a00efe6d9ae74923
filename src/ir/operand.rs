//! IR operands and their internal types.

use std::fmt;

use crate::core::{CompileError, CompileResult};

/// Classification of a type for code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InternalType {
    #[default]
    NotSet,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    /// Pointer-sized signed integer.
    I,
    /// Pointer-sized unsigned integer, also used for unmanaged pointers.
    U,
    /// Opaque aggregate.
    ValueType,
    /// Object reference.
    O,
}

impl InternalType {
    /// Size of a value of this type, `None` for aggregates and `NotSet`.
    pub fn size(self, pointer_size: u32) -> Option<u32> {
        use InternalType::*;
        match self {
            I1 | U1 => Some(1),
            I2 | U2 => Some(2),
            I4 | U4 | R4 => Some(4),
            I8 | U8 | R8 => Some(8),
            I | U | O => Some(pointer_size),
            ValueType | NotSet => None,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            InternalType::I1 | InternalType::I2 | InternalType::I4 | InternalType::I8 | InternalType::I
        )
    }

    pub fn is_integer(self) -> bool {
        use InternalType::*;
        matches!(self, I1 | U1 | I2 | U2 | I4 | U4 | I8 | U8 | I | U)
    }

    pub fn is_float(self) -> bool {
        matches!(self, InternalType::R4 | InternalType::R8)
    }

    pub fn name(self) -> &'static str {
        use InternalType::*;
        match self {
            NotSet => "NotSet",
            I1 => "I1",
            U1 => "U1",
            I2 => "I2",
            U2 => "U2",
            I4 => "I4",
            U4 => "U4",
            I8 => "I8",
            U8 => "U8",
            R4 => "R4",
            R8 => "R8",
            I => "I",
            U => "U",
            ValueType => "ValueType",
            O => "O",
        }
    }
}

impl fmt::Display for InternalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage class of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentifierKind {
    Argument(u16),
    Local(u16),
    /// Compiler-introduced temporary.
    Temporary(u16),
}

/// An assignable storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub internal_type: InternalType,
}

impl Identifier {
    pub fn argument(index: u16, internal_type: InternalType) -> Self {
        Self {
            kind: IdentifierKind::Argument(index),
            internal_type,
        }
    }

    pub fn local(index: u16, internal_type: InternalType) -> Self {
        Self {
            kind: IdentifierKind::Local(index),
            internal_type,
        }
    }

    pub fn temporary(index: u16, internal_type: InternalType) -> Self {
        Self {
            kind: IdentifierKind::Temporary(index),
            internal_type,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IdentifierKind::Argument(index) => write!(f, "A{index}"),
            IdentifierKind::Local(index) => write!(f, "L{index}"),
            IdentifierKind::Temporary(index) => write!(f, "T{index}"),
        }
    }
}

/// Integer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constant {
    pub value: i64,
    pub internal_type: InternalType,
}

impl Constant {
    pub fn i4(value: i32) -> Self {
        Self {
            value: value as i64,
            internal_type: InternalType::I4,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Relation tested by a boolean condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    /// Operand is non-zero.
    True,
    /// Operand is zero.
    False,
}

impl Relation {
    pub fn is_unary(self) -> bool {
        matches!(self, Relation::True | Relation::False)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Equal => "==",
            Relation::NotEqual => "!=",
            Relation::Less => "<",
            Relation::LessOrEqual => "<=",
            Relation::Greater => ">",
            Relation::GreaterOrEqual => ">=",
            Relation::True => "",
            Relation::False => "!",
        }
    }
}

/// Boolean-valued condition over one or two operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub relation: Relation,
    pub left: Box<Operand>,
    pub right: Option<Box<Operand>>,
}

impl Condition {
    /// `left <relation> right`. Fails for the unary relations, which take
    /// only one operand.
    pub fn compare(relation: Relation, left: Operand, right: Operand) -> CompileResult<Self> {
        if relation.is_unary() {
            return Err(CompileError::InvalidCondition {
                relation: format!("{relation:?}"),
            });
        }

        Ok(Self {
            relation,
            left: Box::new(left),
            right: Some(Box::new(right)),
        })
    }

    /// `value != 0`
    pub fn is_true(value: Operand) -> Self {
        Self {
            relation: Relation::True,
            left: Box::new(value),
            right: None,
        }
    }

    /// `value == 0`
    pub fn is_false(value: Operand) -> Self {
        Self {
            relation: Relation::False,
            left: Box::new(value),
            right: None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.right {
            Some(right) => write!(f, "{} {} {}", self.left, self.relation.symbol(), right),
            None => write!(f, "{}{}", self.relation.symbol(), self.left),
        }
    }
}

/// IR operand. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Identifier(Identifier),
    Boolean(Condition),
    Constant(Constant),
}

impl Operand {
    pub fn internal_type(&self) -> InternalType {
        match self {
            Operand::Identifier(identifier) => identifier.internal_type,
            Operand::Boolean(_) => InternalType::I4,
            Operand::Constant(constant) => constant.internal_type,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Operand::Identifier(identifier) => Some(identifier),
            _ => None,
        }
    }

    /// Visit every identifier referenced by this operand, depth first.
    pub fn for_each_identifier(&self, f: &mut impl FnMut(&Identifier)) {
        match self {
            Operand::Identifier(identifier) => f(identifier),
            Operand::Boolean(condition) => {
                condition.left.for_each_identifier(f);
                if let Some(right) = &condition.right {
                    right.for_each_identifier(f);
                }
            }
            Operand::Constant(_) => {}
        }
    }
}

impl From<Identifier> for Operand {
    fn from(identifier: Identifier) -> Self {
        Operand::Identifier(identifier)
    }
}

impl From<Constant> for Operand {
    fn from(constant: Constant) -> Self {
        Operand::Constant(constant)
    }
}

impl From<Condition> for Operand {
    fn from(condition: Condition) -> Self {
        Operand::Boolean(condition)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Identifier(identifier) => identifier.fmt(f),
            Operand::Boolean(condition) => condition.fmt(f),
            Operand::Constant(constant) => constant.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_type_sizes() {
        assert_eq!(InternalType::U1.size(4), Some(1));
        assert_eq!(InternalType::I8.size(4), Some(8));
        assert_eq!(InternalType::O.size(4), Some(4));
        assert_eq!(InternalType::U.size(8), Some(8));
        assert_eq!(InternalType::ValueType.size(4), None);
        assert_eq!(InternalType::NotSet.size(4), None);
    }

    #[test]
    fn test_operand_display() {
        let local = Identifier::local(0, InternalType::I4);
        let cond = Condition::compare(Relation::Less, local.into(), Constant::i4(10).into()).unwrap();
        assert_eq!(Operand::from(cond).to_string(), "L0 < 10");

        let flag = Condition::is_false(Identifier::argument(1, InternalType::U1).into());
        assert_eq!(flag.to_string(), "!A1");
        assert_eq!(Operand::from(flag).internal_type(), InternalType::I4);
    }

    #[test]
    fn test_identifiers_visited() {
        let cond = Condition::compare(
            Relation::Equal,
            Identifier::local(2, InternalType::I4).into(),
            Identifier::argument(0, InternalType::I4).into(),
        )
        .unwrap();

        let mut seen = Vec::new();
        Operand::from(cond).for_each_identifier(&mut |id| seen.push(id.to_string()));
        assert_eq!(seen, ["L2", "A0"]);
    }

    #[test]
    fn test_unary_relation_rejected_in_compare() {
        for relation in [Relation::True, Relation::False] {
            let err = Condition::compare(relation, Constant::i4(1).into(), Constant::i4(2).into())
                .unwrap_err();
            assert!(matches!(err, CompileError::InvalidCondition { .. }));
        }
        assert_eq!(
            Condition::compare(Relation::False, Constant::i4(1).into(), Constant::i4(2).into())
                .unwrap_err()
                .to_string(),
            "Relation False takes a single operand"
        );
    }
}
