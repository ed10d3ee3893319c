//! This module contains Kestrel IR type definitions.
use std::io;

use cranelift_entity::PrimaryMap;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{ir_writer::IrWrite, module::Program};

/// Interner for compound types. All compound types of a program live here,
/// so type equality is reference equality on [`CompoundTypeRef`].
#[derive(Debug, Default)]
pub struct TypeStore {
    compounds: PrimaryMap<CompoundTypeRef, CompoundType>,
    rev_types: FxHashMap<CompoundType, CompoundTypeRef>,
    struct_types: IndexMap<String, CompoundTypeRef>,
}

impl TypeStore {
    pub fn make_ptr(&mut self, ty: Type) -> Type {
        let ty = self.make_compound(CompoundType::Ptr(ty));
        Type::Compound(ty)
    }

    pub fn make_array(&mut self, elem: Type, len: usize) -> Type {
        let ty = self.make_compound(CompoundType::Array { elem, len });
        Type::Compound(ty)
    }

    pub fn make_struct(&mut self, name: &str, fields: &[Type], packed: bool) -> Type {
        let compound_data = CompoundType::Struct(StructData {
            name: name.to_string(),
            fields: fields.to_vec(),
            packed,
        });

        let cmpd_ref = self.make_compound(compound_data);
        Type::Compound(cmpd_ref)
    }

    pub fn make_func(&mut self, args: &[Type], ret_ty: Type) -> Type {
        let cmpd_ref = self.make_compound(CompoundType::Func {
            args: args.into(),
            ret_ty,
        });
        Type::Compound(cmpd_ref)
    }

    /// Looks up an already interned compound type without interning it.
    pub fn lookup_compound(&self, data: &CompoundType) -> Option<CompoundTypeRef> {
        self.rev_types.get(data).copied()
    }

    /// The pointer type to `ty`, if it has been interned.
    pub fn ptr_to(&self, ty: Type) -> Option<Type> {
        self.lookup_compound(&CompoundType::Ptr(ty)).map(Type::Compound)
    }

    /// The pointee type of `ptr`, or `None` if `ptr` is not a pointer type.
    pub fn deref(&self, ptr: Type) -> Option<Type> {
        match ptr {
            Type::Compound(ty) => match &self.compounds[ty] {
                CompoundType::Ptr(ty) => Some(*ty),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_ptr(&self, ty: Type) -> bool {
        match ty {
            Type::Compound(cmpd_ref) => self.compounds[cmpd_ref].is_ptr(),
            _ => false,
        }
    }

    pub fn is_func(&self, ty: Type) -> bool {
        match ty {
            Type::Compound(cmpd_ref) => self.compounds[cmpd_ref].is_func(),
            _ => false,
        }
    }

    /// Returns `true` if values of the type have a known store size.
    /// Function types are unsized; aggregates are sized iff their members are.
    pub fn is_sized(&self, ty: Type) -> bool {
        match ty {
            Type::Compound(cmpd_ref) => match &self.compounds[cmpd_ref] {
                CompoundType::Ptr(_) => true,
                CompoundType::Array { elem, .. } => self.is_sized(*elem),
                CompoundType::Struct(data) => data.fields.iter().all(|f| self.is_sized(*f)),
                CompoundType::Func { .. } => false,
            },
            _ => true,
        }
    }

    /// Lookup the struct type by name.
    pub fn lookup_struct(&self, name: &str) -> Option<CompoundTypeRef> {
        self.struct_types.get(name).copied()
    }

    pub fn make_compound(&mut self, data: CompoundType) -> CompoundTypeRef {
        match self.rev_types.get(&data) {
            Some(cmpd_ref) => *cmpd_ref,
            None => {
                let cmpd_ref = self.compounds.push(data.clone());
                if let CompoundType::Struct(s) = &data {
                    let name = &s.name;
                    assert!(
                        !self.struct_types.contains_key(name),
                        "struct {name} is already defined"
                    );
                    self.struct_types.insert(name.to_string(), cmpd_ref);
                }

                self.rev_types.insert(data, cmpd_ref);
                cmpd_ref
            }
        }
    }

    pub fn resolve_compound(&self, cmpd_ref: CompoundTypeRef) -> &CompoundType {
        &self.compounds[cmpd_ref]
    }
}

/// Kestrel IR types definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Type {
    I1,
    I8,
    I16,
    I32,
    I64,
    Compound(CompoundTypeRef),
    #[default]
    Unit,
}

impl Type {
    pub fn is_integral(self) -> bool {
        matches!(self, Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_compound(self) -> bool {
        matches!(self, Type::Compound(_))
    }

    pub fn is_unit(self) -> bool {
        matches!(self, Self::Unit)
    }
}

impl IrWrite for Type {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        match self {
            Type::I1 => write!(w, "i1"),
            Type::I8 => write!(w, "i8"),
            Type::I16 => write!(w, "i16"),
            Type::I32 => write!(w, "i32"),
            Type::I64 => write!(w, "i64"),
            Type::Compound(cmpd_ty) => cmpd_ty.write(w, prog),
            Type::Unit => write!(w, "unit"),
        }
    }
}

/// An opaque reference to [`CompoundType`].
#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct CompoundTypeRef(u32);
cranelift_entity::entity_impl!(CompoundTypeRef);

impl IrWrite for CompoundTypeRef {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()> {
        match prog.type_store().resolve_compound(*self) {
            CompoundType::Array { elem, len } => {
                write!(w, "[")?;
                elem.write(w, prog)?;
                write!(w, "; {len}]")
            }
            CompoundType::Ptr(ty) => {
                write!(w, "*")?;
                ty.write(w, prog)
            }
            CompoundType::Struct(StructData { name, packed, .. }) => {
                if *packed {
                    write!(w, "@<{name}>")
                } else {
                    write!(w, "@{name}")
                }
            }
            CompoundType::Func { args, ret_ty } => {
                write!(w, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(w, ", ")?;
                    }
                    arg.write(w, prog)?;
                }
                write!(w, ") -> ")?;
                ret_ty.write(w, prog)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompoundType {
    Array {
        elem: Type,
        len: usize,
    },
    Ptr(Type),
    Struct(StructData),
    Func {
        args: SmallVec<[Type; 8]>,
        ret_ty: Type,
    },
}

impl CompoundType {
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(..))
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Self::Func { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructData {
    pub name: String,
    pub fields: Vec<Type>,
    pub packed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_compound_types() {
        let mut store = TypeStore::default();

        let p1 = store.make_ptr(Type::I32);
        let p2 = store.make_ptr(Type::I32);
        assert_eq!(p1, p2);

        let a1 = store.make_array(Type::I8, 4);
        let a2 = store.make_array(Type::I8, 8);
        assert_ne!(a1, a2);

        assert_eq!(store.deref(p1), Some(Type::I32));
        assert_eq!(store.deref(Type::I32), None);
        assert_eq!(store.ptr_to(Type::I32), Some(p1));
        assert_eq!(store.ptr_to(Type::I64), None);
    }

    #[test]
    fn func_types_are_unsized() {
        let mut store = TypeStore::default();

        let fn_ty = store.make_func(&[Type::I32], Type::I32);
        assert!(!store.is_sized(fn_ty));
        assert!(store.is_sized(Type::I64));

        let fn_ptr = store.make_ptr(fn_ty);
        assert!(store.is_sized(fn_ptr));
        assert!(store.is_ptr(fn_ptr));
        assert!(store.is_func(fn_ty));
    }
}
