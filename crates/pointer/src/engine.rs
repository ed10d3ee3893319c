//! The alias-set engine: a union-find over shared points-to sets, populated
//! on demand by per-function pairwise disambiguation.

use std::{any::Any, io, mem, sync::Arc};

use cranelift_entity::PrimaryMap;
use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

use kestrel_ir::{FuncRef, InstKind, ModuleId, Program, ValueRef};

use crate::{
    config::AnalysisConfig,
    info::{AliasInfo, ValueSet},
    oracle::{AliasAnalysis, AliasResult, UNKNOWN_SIZE},
};

/// An opaque reference to a points-to set in the engine's arena. Two values
/// alias iff they are bound to the same `SetId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SetId(u32);
cranelift_entity::entity_impl!(SetId);

/// Whole-program points-to engine over union-find alias sets.
///
/// Values are bound to shared sets; `merge` drains the smaller set into the
/// larger one and rebinds the drained members, so a set query stays O(1)
/// and every member of a class observes the same set.
#[derive(Debug)]
pub struct PointsToEngine {
    prog: Arc<Program>,
    aa: AliasAnalysis,
    config: AnalysisConfig,

    pub(crate) sets: PrimaryMap<SetId, ValueSet>,
    /// Emptied-by-merge set slots, reused before growing the arena.
    free: Vec<SetId>,
    pub(crate) bindings: FxHashMap<ValueRef, SetId>,

    pub(crate) analyzed: FxHashSet<FuncRef>,

    empty: ValueSet,
}

impl PointsToEngine {
    /// Creates an engine over `prog`. With eager evaluation this analyzes
    /// every global, function value, and non-declaration function body up
    /// front; with lazy evaluation all work is deferred to the queries.
    pub fn new(prog: Arc<Program>, config: AnalysisConfig) -> Self {
        let mut engine = Self::with_config(prog, config);
        if !engine.config.use_lazy_evaluation {
            engine.analyze_program();
        }
        engine
    }

    pub(crate) fn with_config(prog: Arc<Program>, config: AnalysisConfig) -> Self {
        let aa = AliasAnalysis::new(prog.clone(), config.analysis_kind);
        Self {
            prog,
            aa,
            config,
            sets: PrimaryMap::default(),
            free: Vec::new(),
            bindings: FxHashMap::default(),
            analyzed: FxHashSet::default(),
            empty: ValueSet::default(),
        }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.prog
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyzed_functions(&self) -> impl Iterator<Item = FuncRef> + '_ {
        self.analyzed.iter().copied()
    }

    /// The set handle `v` is bound to, if any. Handle equality is alias
    /// equality; a handle stays stable across queries until a merge
    /// rebinds the smaller side.
    pub fn set_of(&self, v: ValueRef) -> Option<SetId> {
        self.bindings.get(&v).copied()
    }

    pub fn same_set(&self, v1: ValueRef, v2: ValueRef) -> bool {
        match (self.set_of(v1), self.set_of(v2)) {
            (Some(s1), Some(s2)) => s1 == s2,
            _ => false,
        }
    }

    pub fn set_members(&self, set: SetId) -> &ValueSet {
        &self.sets[set]
    }

    fn analyze_program(&mut self) {
        let prog = self.prog.clone();
        for module in prog.modules() {
            for &gv in prog.module_globals(module) {
                self.compute_value(ValueRef::Global(gv));
            }
            for &func in prog.module_funcs(module) {
                self.compute_value(ValueRef::Func(func));
            }
            for &func in prog.module_funcs(module) {
                if !prog.func(func).is_declaration() {
                    self.compute_function(func);
                }
            }
        }
    }

    /// Binds `v` to a fresh singleton set, or re-asserts membership in its
    /// current set. Idempotent.
    pub(crate) fn add_singleton(&mut self, v: ValueRef) {
        match self.bindings.get(&v) {
            Some(&set) => {
                self.sets[set].insert(v);
            }
            None => {
                let set = self.alloc_set();
                self.sets[set].insert(v);
                self.bindings.insert(v, set);
            }
        }
    }

    /// Merges the classes of two registered values, draining the smaller
    /// set into the larger one.
    ///
    /// # Panics
    /// Both values must have been registered with
    /// [`add_singleton`](Self::add_singleton) first.
    pub(crate) fn merge_sets(&mut self, v1: ValueRef, v2: ValueRef) {
        let s1 = *self
            .bindings
            .get(&v1)
            .expect("merge requires a registered value");
        let s2 = *self
            .bindings
            .get(&v2)
            .expect("merge requires a registered value");
        if s1 == s2 {
            return;
        }

        let (small, large) = if self.sets[s1].len() <= self.sets[s2].len() {
            (s1, s2)
        } else {
            (s2, s1)
        };

        let drained = mem::take(&mut self.sets[small]);
        for &v in &drained {
            self.bindings.insert(v, large);
        }
        self.sets[large].extend(drained);
        self.free.push(small);
    }

    pub(crate) fn alloc_set(&mut self) -> SetId {
        match self.free.pop() {
            Some(set) => set,
            None => self.sets.push(ValueSet::default()),
        }
    }

    pub(crate) fn release_empty_set(&mut self, set: SetId) {
        debug_assert!(self.sets[set].is_empty());
        self.free.push(set);
    }

    pub(crate) fn bind(&mut self, v: ValueRef, set: SetId) {
        self.sets[set].insert(v);
        self.bindings.insert(v, set);
    }

    /// Ensures the points-to information relevant to `v` has been computed:
    /// the enclosing function for locals, every using function for global
    /// objects.
    pub fn compute_value(&mut self, v: ValueRef) {
        let prog = self.prog.clone();
        if !prog.is_interesting_pointer(v) {
            return;
        }
        self.add_singleton(v);

        if v.is_global_object() {
            // A global object can be a function or a global variable;
            // function values matter too since programs store and call
            // through function pointers. Its class must span every
            // function that touches it.
            for user in prog.users(v) {
                let ValueRef::Inst(func, _) = user else {
                    // Non-instruction users (e.g. constant tables) drive no
                    // function analysis.
                    continue;
                };
                self.compute_function(func);
                if !v.is_function() && prog.is_interesting_pointer(user) {
                    self.merge_sets(user, v);
                } else if let Some((stored, addr)) = prog.as_store(user) {
                    if prog.is_interesting_pointer(stored) {
                        // The store address needs no check: it is always an
                        // interesting pointer.
                        self.merge_sets(stored, addr);
                    }
                }
            }
        } else if let Some(func) = prog.retrieve_function(v) {
            self.compute_function(func);
        }
    }

    /// Runs the per-function analysis: enumerate interesting pointers, seed
    /// singletons, then merge classes over the pairwise oracle answers.
    pub fn compute_function(&mut self, func: FuncRef) {
        if self.analyzed.contains(&func) {
            return;
        }
        // Mark before doing any work; computing a global user's class below
        // can re-enter this function.
        self.analyzed.insert(func);

        let prog = self.prog.clone();
        log::debug!("analyzing function: {}", prog.func(func).sig.name());

        let aar = self.aa.function_results(func);
        let module = prog.func(func).module;

        let mut pointers: IndexSet<ValueRef> = IndexSet::new();

        for idx in 0..prog.func(func).num_args() {
            let arg = ValueRef::Arg(func, idx as u32);
            if prog.is_pointer(arg) {
                pointers.insert(arg);
            }
        }

        for inst_id in prog.func(func).insts() {
            let value = ValueRef::Inst(func, inst_id);
            if prog.is_pointer(value) {
                pointers.insert(value);
            }

            let inst = prog.func(func).inst(inst_id);
            if let InstKind::Store { value: stored, addr } = &inst.kind {
                self.seed_store_aliases(&prog, *stored, *addr);
            }

            if let InstKind::Call { callee, args } = &inst.kind {
                // Skip plain function values for direct calls; those are
                // handled by the value driver.
                if !callee.is_function() && prog.is_interesting_pointer(*callee) {
                    pointers.insert(*callee);
                }
                for &arg in args {
                    if prog.is_interesting_pointer(arg) {
                        pointers.insert(arg);
                    }
                }
            } else {
                inst.kind.for_each_operand(|op| {
                    if prog.is_interesting_pointer(op) {
                        pointers.insert(op);
                    }
                });
            }
        }

        for &gv in prog.module_globals(module) {
            pointers.insert(ValueRef::Global(gv));
        }

        // A singleton per pointer; the sets merge as aliases are found.
        for &p in &pointers {
            self.add_singleton(p);
        }

        if pointers.len() > self.config.large_pointer_warning_threshold {
            log::warn!(
                "large number of pointers ({}) in `{}`: disambiguation is O(n^2) here",
                pointers.len(),
                prog.func(func).sig.name()
            );
        }

        let sizes: Vec<u64> = pointers
            .iter()
            .map(|&p| self.location_size(&prog, module, p))
            .collect();

        // The full n^2/2 disambiguation over the worklist.
        for i in 1..pointers.len() {
            for j in 0..i {
                let p = pointers[i];
                let q = pointers[j];
                match aar.alias(p, sizes[i], q, sizes[j]) {
                    AliasResult::NoAlias => {}
                    AliasResult::MayAlias
                    | AliasResult::PartialAlias
                    | AliasResult::MustAlias => self.merge_sets(p, q),
                }
            }
        }

        // The oracle state for this function is no longer needed.
        drop(aar);
    }

    /// Store-driven merges that do not depend on the oracle: storing a
    /// function seeds the function-pointer slot, and storing a constant
    /// bitcast expression links the cast source through the slot.
    fn seed_store_aliases(&mut self, prog: &Program, stored: ValueRef, addr: ValueRef) {
        if !prog.is_pointer(stored) {
            return;
        }

        if stored.is_function() {
            self.add_singleton(stored);
            self.add_singleton(addr);
            self.merge_sets(stored, addr);
        }

        if let Some(expr) = prog.as_const_expr(stored) {
            // Materialize the expression to inspect it as an instruction;
            // the materialized form is dropped with this scope.
            let as_inst = expr.to_inst();
            if let InstKind::Bitcast { value: src } = as_inst.kind {
                if prog.is_interesting_pointer(src) {
                    self.add_singleton(src);
                    self.add_singleton(stored);
                    self.add_singleton(addr);
                    self.merge_sets(src, addr);
                    self.merge_sets(stored, addr);
                }
            }
        }
    }

    fn location_size(&self, prog: &Program, module: ModuleId, ptr: ValueRef) -> u64 {
        let pointee = prog.type_store().deref(prog.value_ty(ptr));
        pointee
            .and_then(|ty| prog.store_size(module, ty))
            .map(|size| size as u64)
            .unwrap_or(UNKNOWN_SIZE)
    }

    fn is_inter_reachable_alloc(&self, p: ValueRef) -> bool {
        if self.prog.is_stack_alloc(p) {
            return true;
        }
        if let Some(called) = self.prog.called_function(p) {
            return self
                .config
                .heap_allocating_functions
                .contains(self.prog.func(called).sig.name());
        }
        false
    }

    fn is_intra_reachable_alloc(
        &self,
        p: ValueRef,
        v_func: Option<FuncRef>,
        v_is_global: bool,
    ) -> bool {
        // Only allocation sites local to the queried value's function
        // qualify, unless the value is a global object. Values outside any
        // function (e.g. constants in vtable-like tables) only take the
        // global path.
        if !self.is_inter_reachable_alloc(p) {
            return false;
        }
        if v_is_global {
            return true;
        }
        match (v_func, self.prog.retrieve_function(p)) {
            (Some(v_func), Some(p_func)) => v_func == p_func,
            _ => false,
        }
    }
}

impl AliasInfo for PointsToEngine {
    fn alias(&mut self, v1: ValueRef, v2: ValueRef) -> AliasResult {
        // Values that are not interesting pointers cannot alias.
        if !self.prog.is_interesting_pointer(v1) || !self.prog.is_interesting_pointer(v2) {
            return AliasResult::NoAlias;
        }
        self.compute_value(v1);
        self.compute_value(v2);
        let set = self.bindings[&v1];
        if self.sets[set].contains(&v2) {
            AliasResult::MustAlias
        } else {
            AliasResult::NoAlias
        }
    }

    fn points_to_set(&mut self, v: ValueRef) -> &ValueSet {
        if !self.prog.is_interesting_pointer(v) {
            return &self.empty;
        }
        self.compute_value(v);
        match self.bindings.get(&v) {
            Some(&set) => &self.sets[set],
            None => &self.empty,
        }
    }

    fn reachable_allocation_sites(&mut self, v: ValueRef, intra_only: bool) -> ValueSet {
        if !self.prog.is_interesting_pointer(v) {
            return ValueSet::default();
        }
        self.compute_value(v);
        let members = &self.sets[self.bindings[&v]];

        let mut sites = ValueSet::default();
        if !intra_only {
            for &p in members {
                if self.is_inter_reachable_alloc(p) {
                    sites.insert(p);
                }
            }
        } else {
            let v_func = self.prog.retrieve_function(v);
            let v_is_global = v.is_global_object();
            for &p in members {
                if self.is_intra_reachable_alloc(p, v_func, v_is_global) {
                    sites.insert(p);
                }
            }
        }
        sites
    }

    fn is_in_reachable_allocation_sites(
        &mut self,
        v: ValueRef,
        candidate: ValueRef,
        intra_only: bool,
    ) -> bool {
        if !self.prog.is_interesting_pointer(v) {
            return false;
        }
        self.compute_value(v);

        let is_site = if intra_only {
            let v_func = self.prog.retrieve_function(v);
            self.is_intra_reachable_alloc(candidate, v_func, v.is_global_object())
        } else {
            self.is_inter_reachable_alloc(candidate)
        };

        is_site && self.sets[self.bindings[&v]].contains(&candidate)
    }

    fn introduce_alias(&mut self, v1: ValueRef, v2: ValueRef) {
        // Only introduce aliases between interesting pointers.
        if !self.prog.is_interesting_pointer(v1) || !self.prog.is_interesting_pointer(v2) {
            return;
        }
        // Make sure the initial classes of both values exist before linking
        // them.
        self.compute_value(v1);
        self.compute_value(v2);
        self.merge_sets(v1, v2);
    }

    fn merge_with(&mut self, other: &dyn AliasInfo) {
        let Some(other) = other.as_any().downcast_ref::<PointsToEngine>() else {
            panic!("a PointsToEngine can only be merged with another PointsToEngine");
        };
        assert!(
            Arc::ptr_eq(&self.prog, &other.prog),
            "merged engines must range over the same program"
        );

        self.analyzed.extend(other.analyzed.iter().copied());

        for (&key, &other_set) in &other.bindings {
            let members = &other.sets[other_set];

            // Find a member already known to this engine; the first match
            // suffices. Members bound to different local sets are collapsed
            // first so the class stays canonical.
            let mut known = members.iter().filter(|m| self.bindings.contains_key(m));
            match known.next().copied() {
                Some(first) => {
                    let rest: Vec<ValueRef> = known.copied().collect();
                    for m in rest {
                        self.merge_sets(first, m);
                    }
                    let target = self.bindings[&first];
                    for &m in members {
                        self.bind(m, target);
                    }
                }
                None => {
                    // No overlap with this engine: copy the class wholesale.
                    let fresh = self.alloc_set();
                    self.sets[fresh] = members.clone();
                    for &m in members {
                        self.bindings.insert(m, fresh);
                    }
                    debug_assert!(self.bindings.contains_key(&key));
                }
            }
        }
    }

    fn print(&self, w: &mut dyn io::Write) -> io::Result<()> {
        crate::report::print_sets(self, w)
    }

    fn as_json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kestrel_ir::{DataLayout, Linkage, ProgramBuilder, Signature, Type};

    fn lazy_engine(prog: Program) -> PointsToEngine {
        let config = AnalysisConfig {
            use_lazy_evaluation: true,
            ..AnalysisConfig::default()
        };
        PointsToEngine::new(Arc::new(prog), config)
    }

    #[test]
    fn add_singleton_is_idempotent() {
        let mut pb = ProgramBuilder::new();
        let module = pb.make_module("m0", DataLayout::default());
        let func = pb.declare_function(
            module,
            Signature::new("f", Linkage::Public, &[], Type::Unit),
        );
        let mut fb = pb.func_builder(func);
        let p = fb.alloca(Type::I32);

        let mut engine = lazy_engine(pb.build());
        engine.add_singleton(p);
        let set = engine.set_of(p).unwrap();
        engine.add_singleton(p);
        assert_eq!(engine.set_of(p), Some(set));
        assert_eq!(engine.set_members(set).len(), 1);
    }

    #[test]
    fn merge_drains_smaller_into_larger() {
        let mut pb = ProgramBuilder::new();
        let module = pb.make_module("m0", DataLayout::default());
        let func = pb.declare_function(
            module,
            Signature::new("f", Linkage::Public, &[], Type::Unit),
        );
        let mut fb = pb.func_builder(func);
        let a = fb.alloca(Type::I32);
        let b = fb.alloca(Type::I32);
        let c = fb.alloca(Type::I32);

        let mut engine = lazy_engine(pb.build());
        engine.add_singleton(a);
        engine.add_singleton(b);
        engine.add_singleton(c);

        engine.merge_sets(a, b);
        let big = engine.set_of(a).unwrap();
        assert_eq!(engine.set_of(b), Some(big));
        assert_eq!(engine.set_members(big).len(), 2);

        // `c`'s singleton is the smaller side and is drained into `big`.
        engine.merge_sets(c, a);
        assert_eq!(engine.set_of(c), Some(big));
        assert_eq!(engine.set_members(big).len(), 3);

        // Merging co-class members is a no-op.
        engine.merge_sets(a, c);
        assert_eq!(engine.set_members(big).len(), 3);
    }

    #[test]
    #[should_panic(expected = "merge requires a registered value")]
    fn merge_unregistered_panics() {
        let mut pb = ProgramBuilder::new();
        let module = pb.make_module("m0", DataLayout::default());
        let func = pb.declare_function(
            module,
            Signature::new("f", Linkage::Public, &[], Type::Unit),
        );
        let mut fb = pb.func_builder(func);
        let a = fb.alloca(Type::I32);
        let b = fb.alloca(Type::I32);

        let mut engine = lazy_engine(pb.build());
        engine.add_singleton(a);
        engine.merge_sets(a, b);
    }

    #[test]
    fn emptied_set_slots_are_reused() {
        let mut pb = ProgramBuilder::new();
        let module = pb.make_module("m0", DataLayout::default());
        let func = pb.declare_function(
            module,
            Signature::new("f", Linkage::Public, &[], Type::Unit),
        );
        let mut fb = pb.func_builder(func);
        let a = fb.alloca(Type::I32);
        let b = fb.alloca(Type::I32);
        let c = fb.alloca(Type::I32);

        let mut engine = lazy_engine(pb.build());
        engine.add_singleton(a);
        engine.add_singleton(b);
        engine.merge_sets(a, b);

        let arena_len = engine.sets.len();
        engine.add_singleton(c);
        assert_eq!(engine.sets.len(), arena_len);
    }
}
