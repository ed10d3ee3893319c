//! This module contains Kestrel IR instruction definitions.

use std::io;

use smallvec::SmallVec;

use crate::{ir_writer::IrWrite, module::Program, types::Type, value::ValueRef};

/// An opaque reference to an instruction inside a function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct InstId(pub u32);
cranelift_entity::entity_impl!(InstId);

/// An instruction together with its result type. Instructions without a
/// result (e.g. `store`, `return`) carry [`Type::Unit`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inst {
    pub kind: InstKind,
    pub ty: Type,
}

impl Inst {
    pub fn new(kind: InstKind, ty: Type) -> Self {
        Self { kind, ty }
    }
}

/// An instruction data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstKind {
    /// Allocate a memory region on the stack frame for the given type.
    Alloca { ty: Type },

    /// Load a value from memory.
    Load { addr: ValueRef },

    /// Store a value to memory.
    Store { value: ValueRef, addr: ValueRef },

    /// Call through the `callee` operand, which is either a function or a
    /// function pointer value.
    Call {
        callee: ValueRef,
        args: SmallVec<[ValueRef; 8]>,
    },

    /// Compute an address from a base pointer and indices. `args[0]` is the
    /// base pointer.
    Gep { args: SmallVec<[ValueRef; 8]> },

    /// Reinterpret a pointer as another pointer type.
    Bitcast { value: ValueRef },

    /// Binary arithmetic and bit operations.
    Binary {
        code: BinaryOp,
        args: [ValueRef; 2],
    },

    /// Return.
    Return { arg: Option<ValueRef> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideEffect {
    None,
    Read,
    Write,
}

impl SideEffect {
    pub fn has_effect(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl InstKind {
    pub fn side_effect(&self) -> SideEffect {
        match self {
            Self::Load { .. } => SideEffect::Read,
            Self::Store { .. } | Self::Call { .. } | Self::Alloca { .. } => SideEffect::Write,
            _ => SideEffect::None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Return { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }

    /// Visits every value operand of the instruction. For calls this yields
    /// the callee first, then the data operands.
    pub fn for_each_operand(&self, mut f: impl FnMut(ValueRef)) {
        match self {
            Self::Alloca { .. } => {}
            Self::Load { addr } => f(*addr),
            Self::Store { value, addr } => {
                f(*value);
                f(*addr);
            }
            Self::Call { callee, args } => {
                f(*callee);
                for arg in args {
                    f(*arg);
                }
            }
            Self::Gep { args } => {
                for arg in args {
                    f(*arg);
                }
            }
            Self::Bitcast { value } => f(*value),
            Self::Binary { args, .. } => {
                f(args[0]);
                f(args[1]);
            }
            Self::Return { arg } => {
                if let Some(arg) = arg {
                    f(*arg);
                }
            }
        }
    }

    pub fn as_text(&self) -> &'static str {
        match self {
            Self::Alloca { .. } => "alloca",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::Call { .. } => "call",
            Self::Gep { .. } => "gep",
            Self::Bitcast { .. } => "bitcast",
            Self::Binary { code, .. } => match code {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
            },
            Self::Return { .. } => "ret",
        }
    }
}

impl IrWrite for Inst {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        write!(w, "{}", self.kind.as_text())?;
        if let InstKind::Alloca { ty } = &self.kind {
            write!(w, " ")?;
            ty.write(w, prog)?;
        }
        let mut res = Ok(());
        self.kind.for_each_operand(|op| {
            if res.is_ok() {
                res = write!(w, " ").and_then(|()| op.write(w, prog));
            }
        });
        res?;
        if let InstKind::Bitcast { .. } = &self.kind {
            write!(w, " to ")?;
            self.ty.write(w, prog)?;
        }
        Ok(())
    }
}
