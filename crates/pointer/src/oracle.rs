//! The intraprocedural alias oracle.
//!
//! The oracle answers four-valued alias queries for pointer pairs within a
//! single function. It is acquired per function and released (dropped) once
//! the function's points-to analysis is done; the engine projects its
//! answers down to two values at the public boundary.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use kestrel_ir::{ConstExpr, FuncRef, InstKind, Program, Type, ValueRef};

/// Result of an alias query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasResult {
    /// Definitely different memory locations.
    NoAlias,
    /// May or may not be the same location.
    MayAlias,
    /// Overlapping but not identical locations.
    PartialAlias,
    /// Definitely the same location.
    MustAlias,
}

impl AliasResult {
    pub fn may_alias(self) -> bool {
        !matches!(self, Self::NoAlias)
    }

    pub fn must_alias(self) -> bool {
        matches!(self, Self::MustAlias)
    }
}

/// Memory location size used when the pointee type has no known store size.
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Selects the oracle flavor. Passed verbatim to the oracle constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerAnalysisKind {
    /// Provenance-based disambiguation only.
    #[default]
    Basic,
    /// Provenance-based plus pointee-type separation.
    TypeBased,
}

/// The per-function oracle provider. Holds the program and the configured
/// analysis kind; per-function state is built by [`Self::function_results`]
/// and released when the returned results are dropped.
#[derive(Debug)]
pub struct AliasAnalysis {
    prog: Arc<Program>,
    kind: PointerAnalysisKind,
}

impl AliasAnalysis {
    pub fn new(prog: Arc<Program>, kind: PointerAnalysisKind) -> Self {
        Self { prog, kind }
    }

    pub fn kind(&self) -> PointerAnalysisKind {
        self.kind
    }

    /// Builds the alias results for `func`. The caller keeps them for the
    /// duration of the function's analysis and drops them afterwards.
    pub fn function_results(&self, func: FuncRef) -> FunctionAliasResults {
        let mut provenance = FxHashMap::default();

        let prog = &self.prog;
        for inst_id in prog.func(func).insts() {
            let value = ValueRef::Inst(func, inst_id);
            if prog.is_pointer(value) {
                let root = resolve_provenance(prog, &provenance, value);
                provenance.insert(value, root);
            }
        }

        FunctionAliasResults {
            prog: self.prog.clone(),
            kind: self.kind,
            provenance,
        }
    }
}

/// Where a pointer's storage comes from: the value the pointer was derived
/// from by following cast and address-computation chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Provenance {
    root: ValueRef,
    /// `false` once the chain passed through an address computation, i.e.
    /// the pointer may designate an interior location of the root object.
    exact: bool,
}

fn resolve_provenance(
    prog: &Program,
    memo: &FxHashMap<ValueRef, Provenance>,
    value: ValueRef,
) -> Provenance {
    if let Some(prov) = memo.get(&value) {
        return *prov;
    }

    if let Some(inst) = prog.inst_of(value) {
        match &inst.kind {
            InstKind::Bitcast { value } => return resolve_provenance(prog, memo, *value),
            InstKind::Gep { args } => {
                let base = resolve_provenance(prog, memo, args[0]);
                return Provenance {
                    root: base.root,
                    exact: false,
                };
            }
            _ => {}
        }
    }
    if let Some(ConstExpr::Bitcast { value, .. }) = prog.as_const_expr(value) {
        return resolve_provenance(prog, memo, *value);
    }

    Provenance {
        root: value,
        exact: true,
    }
}

/// Function-local alias results. Owns everything it needs, so the engine can
/// keep mutating its own state while querying.
#[derive(Debug, Clone)]
pub struct FunctionAliasResults {
    prog: Arc<Program>,
    kind: PointerAnalysisKind,
    provenance: FxHashMap<ValueRef, Provenance>,
}

impl FunctionAliasResults {
    /// Answers whether the memory locations `(p1, size1)` and `(p2, size2)`
    /// may overlap. Sizes are in bytes; [`UNKNOWN_SIZE`] disables size-based
    /// refinement.
    pub fn alias(&self, p1: ValueRef, size1: u64, p2: ValueRef, size2: u64) -> AliasResult {
        if p1 == p2 {
            return AliasResult::MustAlias;
        }

        let a = self.provenance_of(p1);
        let b = self.provenance_of(p2);

        if a.root == b.root {
            return match (a.exact, b.exact) {
                (true, true) => {
                    if size1 != size2 && size1 != UNKNOWN_SIZE && size2 != UNKNOWN_SIZE {
                        AliasResult::PartialAlias
                    } else {
                        AliasResult::MustAlias
                    }
                }
                (true, false) | (false, true) => AliasResult::PartialAlias,
                (false, false) => AliasResult::MayAlias,
            };
        }

        // Distinct identified objects occupy distinct storage.
        if self.is_identified_object(a.root) && self.is_identified_object(b.root) {
            return AliasResult::NoAlias;
        }

        if self.kind == PointerAnalysisKind::TypeBased && self.separated_by_type(p1, p2) {
            return AliasResult::NoAlias;
        }

        AliasResult::MayAlias
    }

    fn provenance_of(&self, value: ValueRef) -> Provenance {
        resolve_provenance(&self.prog, &self.provenance, value)
    }

    fn is_identified_object(&self, root: ValueRef) -> bool {
        root.is_global_object() || self.prog.is_stack_alloc(root)
    }

    /// Byte-typed pointers convert freely; everything else is separated by
    /// its pointee type.
    fn separated_by_type(&self, p1: ValueRef, p2: ValueRef) -> bool {
        let store = self.prog.type_store();
        let e1 = store.deref(self.prog.value_ty(p1));
        let e2 = store.deref(self.prog.value_ty(p2));
        match (e1, e2) {
            (Some(e1), Some(e2)) => e1 != e2 && e1 != Type::I8 && e2 != Type::I8,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_ir::{DataLayout, Linkage, ProgramBuilder, Signature};

    fn results_for(
        kind: PointerAnalysisKind,
        build: impl FnOnce(&mut ProgramBuilder, FuncRef) -> Vec<ValueRef>,
    ) -> (FunctionAliasResults, Vec<ValueRef>) {
        let mut pb = ProgramBuilder::new();
        let module = pb.make_module("m0", DataLayout::default());
        let func = pb.declare_function(
            module,
            Signature::new("test_func", Linkage::Public, &[], Type::Unit),
        );
        let values = build(&mut pb, func);

        let prog = Arc::new(pb.build());
        let aa = AliasAnalysis::new(prog, kind);
        (aa.function_results(func), values)
    }

    #[test]
    fn distinct_allocas_do_not_alias() {
        let (aar, values) = results_for(PointerAnalysisKind::Basic, |pb, func| {
            let mut fb = pb.func_builder(func);
            let p = fb.alloca(Type::I32);
            let q = fb.alloca(Type::I32);
            vec![p, q]
        });

        assert_eq!(aar.alias(values[0], 4, values[1], 4), AliasResult::NoAlias);
        assert_eq!(aar.alias(values[0], 4, values[0], 4), AliasResult::MustAlias);
    }

    #[test]
    fn bitcast_chain_must_alias() {
        let (aar, values) = results_for(PointerAnalysisKind::Basic, |pb, func| {
            let i8_ptr = pb.ptr_type(Type::I8);
            let mut fb = pb.func_builder(func);
            let p = fb.alloca(Type::I32);
            let q = fb.bitcast(p, i8_ptr);
            vec![p, q]
        });

        assert_eq!(
            aar.alias(values[0], 4, values[1], 4),
            AliasResult::MustAlias
        );
    }

    #[test]
    fn gep_is_partial_over_its_base() {
        let (aar, values) = results_for(PointerAnalysisKind::Basic, |pb, func| {
            let i32_ptr = pb.ptr_type(Type::I32);
            let arr = pb.array_type(Type::I32, 8);
            let idx_holder = pb.make_int(1, Type::I64);
            let mut fb = pb.func_builder(func);
            let base = fb.alloca(arr);
            let elem = fb.gep(&[base, idx_holder], i32_ptr);
            vec![base, elem]
        });

        assert_eq!(
            aar.alias(values[0], 32, values[1], 4),
            AliasResult::PartialAlias
        );
    }

    #[test]
    fn unknown_roots_may_alias() {
        let (aar, values) = results_for(PointerAnalysisKind::Basic, |pb, func| {
            let i32_ptr = pb.ptr_type(Type::I32);
            let mut fb = pb.func_builder(func);
            let slot = fb.alloca(i32_ptr);
            let p = fb.load(slot, i32_ptr);
            let q = fb.alloca(Type::I32);
            vec![p, q]
        });

        assert_eq!(aar.alias(values[0], 4, values[1], 4), AliasResult::MayAlias);
    }

    #[test]
    fn type_based_separation() {
        let (aar, values) = results_for(PointerAnalysisKind::TypeBased, |pb, func| {
            let i32_ptr = pb.ptr_type(Type::I32);
            let i64_ptr = pb.ptr_type(Type::I64);
            let mut fb = pb.func_builder(func);
            let slot_a = fb.alloca(i32_ptr);
            let slot_b = fb.alloca(i64_ptr);
            let p = fb.load(slot_a, i32_ptr);
            let q = fb.load(slot_b, i64_ptr);
            vec![p, q]
        });

        assert_eq!(aar.alias(values[0], 4, values[1], 8), AliasResult::NoAlias);
    }
}
