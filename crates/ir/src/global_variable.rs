use std::io;

use crate::{ir_writer::IrWrite, linkage::Linkage, module::Program, types::Type, value::ValueRef};

/// An opaque reference to [`GlobalVariableData`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct GlobalRef(pub u32);
cranelift_entity::entity_impl!(GlobalRef);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalVariableData {
    pub symbol: String,
    /// The type of the stored object. The global used as a value has type
    /// pointer-to-`ty`.
    pub ty: Type,
    pub linkage: Linkage,
    pub is_const: bool,
    pub data: Option<GvInitializer>,
}

impl GlobalVariableData {
    pub fn new(
        symbol: String,
        ty: Type,
        linkage: Linkage,
        is_const: bool,
        data: Option<GvInitializer>,
    ) -> Self {
        Self {
            symbol,
            ty,
            linkage,
            is_const,
            data,
        }
    }

    pub fn constant(symbol: String, ty: Type, linkage: Linkage, data: GvInitializer) -> Self {
        Self {
            symbol,
            ty,
            linkage,
            is_const: true,
            data: Some(data),
        }
    }
}

impl IrWrite for GlobalVariableData {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        write!(w, "global {} ", self.linkage)?;
        if self.is_const {
            write!(w, "const ")?;
        }
        self.ty.write(w, prog)?;
        write!(w, " %{}", self.symbol)?;
        if let Some(data) = &self.data {
            write!(w, " = ")?;
            data.write(w, prog)?;
        }
        Ok(())
    }
}

/// Initializer of a global variable. `Value` entries make the referenced
/// value a non-instruction user target, e.g. a function address in a
/// vtable-like constant table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GvInitializer {
    Immediate(i64),
    Value(ValueRef),
    Array(Vec<GvInitializer>),
    Struct(Vec<GvInitializer>),
}

impl GvInitializer {
    pub fn make_imm(data: i64) -> Self {
        Self::Immediate(data)
    }

    pub fn make_array(data: Vec<GvInitializer>) -> Self {
        Self::Array(data)
    }

    pub fn make_struct(data: Vec<GvInitializer>) -> Self {
        Self::Struct(data)
    }

    /// Visits every value referenced by the initializer tree.
    pub fn for_each_value(&self, f: &mut impl FnMut(ValueRef)) {
        match self {
            Self::Immediate(_) => {}
            Self::Value(value) => f(*value),
            Self::Array(data) | Self::Struct(data) => {
                for init in data {
                    init.for_each_value(f);
                }
            }
        }
    }
}

impl IrWrite for GvInitializer {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        match self {
            Self::Immediate(data) => write!(w, "{data}"),
            Self::Value(value) => value.write(w, prog),
            Self::Array(data) => {
                write!(w, "[")?;
                for (i, v) in data.iter().enumerate() {
                    if i > 0 {
                        write!(w, ", ")?;
                    }
                    v.write(w, prog)?;
                }
                write!(w, "]")
            }
            Self::Struct(data) => {
                write!(w, "{{")?;
                for (i, v) in data.iter().enumerate() {
                    if i > 0 {
                        write!(w, ", ")?;
                    }
                    v.write(w, prog)?;
                }
                write!(w, "}}")
            }
        }
    }
}
