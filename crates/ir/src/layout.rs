//! Per-module data layout: byte order and type store sizes.

use crate::types::{CompoundType, Type, TypeStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    Be,
    Le,
}

/// The data layout of a module. Store sizes computed here feed the alias
/// oracle's memory location sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    pub endian: Endian,
    /// Pointer width in bytes.
    pub pointer_size: usize,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            endian: Endian::Le,
            pointer_size: 8,
        }
    }
}

impl DataLayout {
    /// The number of bytes a store of a `ty` value writes, or `None` if the
    /// type is unsized (e.g. a function type).
    pub fn store_size(&self, ty: Type, store: &TypeStore) -> Option<usize> {
        match ty {
            Type::I1 | Type::I8 => Some(1),
            Type::I16 => Some(2),
            Type::I32 => Some(4),
            Type::I64 => Some(8),
            Type::Unit => Some(0),
            Type::Compound(cmpd_ref) => match store.resolve_compound(cmpd_ref) {
                CompoundType::Ptr(_) => Some(self.pointer_size),
                CompoundType::Array { elem, len } => {
                    self.store_size(*elem, store).map(|s| s * len)
                }
                CompoundType::Struct(data) => {
                    let mut size = 0;
                    for field in &data.fields {
                        size += self.store_size(*field, store)?;
                    }
                    Some(size)
                }
                CompoundType::Func { .. } => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_sizes() {
        let mut store = TypeStore::default();
        let dl = DataLayout::default();

        assert_eq!(dl.store_size(Type::I32, &store), Some(4));

        let ptr = store.make_ptr(Type::I8);
        assert_eq!(dl.store_size(ptr, &store), Some(8));

        let arr = store.make_array(Type::I16, 3);
        assert_eq!(dl.store_size(arr, &store), Some(6));

        let st = store.make_struct("pair", &[Type::I32, Type::I64], false);
        assert_eq!(dl.store_size(st, &store), Some(12));

        let fn_ty = store.make_func(&[], Type::Unit);
        assert_eq!(dl.store_size(fn_ty, &store), None);
    }
}
