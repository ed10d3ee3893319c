//! This module contains the program-wide value handle and constant values.
use std::io;

use crate::{
    global_variable::GlobalRef,
    inst::{Inst, InstId, InstKind},
    ir_writer::IrWrite,
    module::{FuncRef, Program},
    types::Type,
};

/// A stable, program-wide value handle. Two values are the same IR value iff
/// their `ValueRef`s are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueRef {
    /// A global variable of some module.
    Global(GlobalRef),

    /// A function used as a value (e.g. stored through a function pointer).
    Func(FuncRef),

    /// The `idx`-th argument of a function.
    Arg(FuncRef, u32),

    /// The result of an instruction.
    Inst(FuncRef, InstId),

    /// An interned constant.
    Const(ConstRef),
}

impl ValueRef {
    /// Returns `true` if the value is a global object, i.e. a global variable
    /// or a function.
    pub fn is_global_object(self) -> bool {
        matches!(self, Self::Global(_) | Self::Func(_))
    }

    pub fn is_function(self) -> bool {
        matches!(self, Self::Func(_))
    }

    /// The function the value lives in, or `None` for globals, functions and
    /// constants.
    pub fn enclosing_function(self) -> Option<FuncRef> {
        match self {
            Self::Arg(func, _) | Self::Inst(func, _) => Some(func),
            _ => None,
        }
    }
}

impl IrWrite for ValueRef {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        match self {
            Self::Global(gv) => write!(w, "%{}", prog.global_data(*gv).symbol),
            Self::Func(func) => write!(w, "%{}", prog.func(*func).sig.name()),
            Self::Arg(_, idx) => write!(w, "a{idx}"),
            Self::Inst(_, inst) => write!(w, "v{}", inst.0),
            Self::Const(c) => prog.const_data(*c).write(w, prog),
        }
    }
}

/// An opaque reference to [`ConstData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstRef(pub u32);
cranelift_entity::entity_impl!(ConstRef);

/// An interned constant value. The builder dedups constants, so value
/// identity holds for `ValueRef::Const` as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstData {
    /// An integer immediate.
    Int(i64, Type),

    /// The null pointer of the given pointer type.
    Null(Type),

    Undef(Type),

    /// A constant expression.
    Expr(ConstExpr),
}

impl ConstData {
    pub fn ty(&self) -> Type {
        match self {
            Self::Int(_, ty) | Self::Null(ty) | Self::Undef(ty) => *ty,
            Self::Expr(expr) => expr.ty(),
        }
    }

    /// Constants that never participate in alias relations.
    pub fn is_trivial(&self) -> bool {
        matches!(self, Self::Int(..) | Self::Null(_) | Self::Undef(_))
    }
}

impl IrWrite for ConstData {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        match self {
            Self::Int(val, ty) => {
                write!(w, "{val}.")?;
                ty.write(w, prog)
            }
            Self::Null(ty) => {
                write!(w, "null.")?;
                ty.write(w, prog)
            }
            Self::Undef(ty) => {
                write!(w, "undef.")?;
                ty.write(w, prog)
            }
            Self::Expr(expr) => expr.write(w, prog),
        }
    }
}

/// A constant expression. Unlike an instruction it lives outside any
/// function, e.g. in a global initializer or directly as an operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstExpr {
    /// A pointer cast applied to a constant operand.
    Bitcast { value: ValueRef, ty: Type },
}

impl ConstExpr {
    pub fn ty(&self) -> Type {
        match self {
            Self::Bitcast { ty, .. } => *ty,
        }
    }

    /// Materializes the expression as a free-standing instruction so callers
    /// can inspect it through the instruction interface. The materialized
    /// instruction belongs to no function and is dropped by the caller.
    pub fn to_inst(&self) -> Inst {
        match self {
            Self::Bitcast { value, ty } => Inst::new(InstKind::Bitcast { value: *value }, *ty),
        }
    }
}

impl IrWrite for ConstExpr {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        match self {
            Self::Bitcast { value, ty } => {
                write!(w, "bitcast (")?;
                value.write(w, prog)?;
                write!(w, " to ")?;
                ty.write(w, prog)?;
                write!(w, ")")
            }
        }
    }
}
