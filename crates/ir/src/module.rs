//! Modules and the whole-program container the analyses consume.

use std::collections::BTreeSet;

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::{
    function::Function,
    global_variable::{GlobalRef, GlobalVariableData},
    inst::{Inst, InstKind},
    layout::DataLayout,
    types::{Type, TypeStore},
    value::{ConstData, ConstExpr, ConstRef, ValueRef},
};

/// An opaque reference to a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u32);
cranelift_entity::entity_impl!(ModuleId);

/// An opaque reference to a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(pub u32);
cranelift_entity::entity_impl!(FuncRef);

/// A translation unit: a name, a data layout, and the globals and functions
/// defined in it. Member data lives in the program-wide arenas.
#[derive(Debug, Default)]
pub struct Module {
    pub name: String,
    pub layout: DataLayout,
    pub(crate) globals: Vec<GlobalRef>,
    pub(crate) funcs: Vec<FuncRef>,
}

/// A whole program: modules in insertion order plus the program-wide arenas
/// for functions, globals, constants and types. Read-only once built; the
/// analyses borrow it for their whole lifetime.
#[derive(Debug, Default)]
pub struct Program {
    pub(crate) modules: PrimaryMap<ModuleId, Module>,
    pub(crate) funcs: PrimaryMap<FuncRef, Function>,
    pub(crate) globals: PrimaryMap<GlobalRef, GlobalVariableData>,
    pub(crate) consts: PrimaryMap<ConstRef, ConstData>,
    pub(crate) types: TypeStore,
    /// Users of global objects and constants, keyed by the used value.
    pub(crate) users: FxHashMap<ValueRef, BTreeSet<ValueRef>>,
}

impl Program {
    /// Modules in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleId> {
        self.modules.keys()
    }

    pub fn module(&self, module: ModuleId) -> &Module {
        &self.modules[module]
    }

    pub fn module_globals(&self, module: ModuleId) -> &[GlobalRef] {
        &self.modules[module].globals
    }

    pub fn module_funcs(&self, module: ModuleId) -> &[FuncRef] {
        &self.modules[module].funcs
    }

    pub fn func(&self, func: FuncRef) -> &Function {
        &self.funcs[func]
    }

    pub fn global_data(&self, gv: GlobalRef) -> &GlobalVariableData {
        &self.globals[gv]
    }

    pub fn const_data(&self, c: ConstRef) -> &ConstData {
        &self.consts[c]
    }

    pub fn type_store(&self) -> &TypeStore {
        &self.types
    }

    /// The type of a value. Global objects have pointer type: a global
    /// variable is a pointer to its stored type and a function is a pointer
    /// to its signature type. Both are interned at build time.
    pub fn value_ty(&self, value: ValueRef) -> Type {
        match value {
            ValueRef::Global(gv) => {
                let pointee = self.globals[gv].ty;
                self.types
                    .ptr_to(pointee)
                    .expect("global pointer type is interned at build time")
            }
            ValueRef::Func(func) => self.func_value_ty(func),
            ValueRef::Arg(func, idx) => self.funcs[func].arg_ty(idx),
            ValueRef::Inst(func, inst) => self.funcs[func].inst(inst).ty,
            ValueRef::Const(c) => self.consts[c].ty(),
        }
    }

    fn func_value_ty(&self, func: FuncRef) -> Type {
        let sig = &self.funcs[func].sig;
        let fn_ty = self
            .types
            .lookup_compound(&crate::types::CompoundType::Func {
                args: sig.args().into(),
                ret_ty: sig.ret_ty(),
            })
            .map(Type::Compound)
            .expect("function type is interned at build time");
        self.types
            .ptr_to(fn_ty)
            .expect("function pointer type is interned at build time")
    }

    pub fn is_pointer(&self, value: ValueRef) -> bool {
        self.types.is_ptr(self.value_ty(value))
    }

    /// Whether the analyses track the value: pointer-typed and not a trivial
    /// constant such as `null` or `undef`.
    pub fn is_interesting_pointer(&self, value: ValueRef) -> bool {
        if let ValueRef::Const(c) = value {
            if self.consts[c].is_trivial() {
                return false;
            }
        }
        self.is_pointer(value)
    }

    /// The function enclosing the value, if any. Globals, functions and
    /// constants live outside functions.
    pub fn retrieve_function(&self, value: ValueRef) -> Option<FuncRef> {
        value.enclosing_function()
    }

    /// Users of a global object or constant. Instruction users are
    /// `ValueRef::Inst`; globals whose initializer refers to the value show
    /// up as `ValueRef::Global` users.
    pub fn users(&self, value: ValueRef) -> impl Iterator<Item = ValueRef> + '_ {
        self.users.get(&value).into_iter().flatten().copied()
    }

    pub fn is_global_variable(&self, value: ValueRef) -> bool {
        matches!(value, ValueRef::Global(_))
    }

    pub fn is_function(&self, value: ValueRef) -> bool {
        matches!(value, ValueRef::Func(_))
    }

    pub fn inst_of(&self, value: ValueRef) -> Option<&Inst> {
        match value {
            ValueRef::Inst(func, inst) => Some(self.funcs[func].inst(inst)),
            _ => None,
        }
    }

    /// Whether the value is a stack allocation.
    pub fn is_stack_alloc(&self, value: ValueRef) -> bool {
        matches!(
            self.inst_of(value).map(|inst| &inst.kind),
            Some(InstKind::Alloca { .. })
        )
    }

    /// The `(stored value, stored-to pointer)` pair of a store instruction.
    pub fn as_store(&self, value: ValueRef) -> Option<(ValueRef, ValueRef)> {
        match self.inst_of(value).map(|inst| &inst.kind) {
            Some(InstKind::Store { value, addr }) => Some((*value, *addr)),
            _ => None,
        }
    }

    /// The `(callee, data operands)` of a call-like instruction.
    pub fn as_call(&self, value: ValueRef) -> Option<(ValueRef, &[ValueRef])> {
        match self.inst_of(value).map(|inst| &inst.kind) {
            Some(InstKind::Call { callee, args }) => Some((*callee, args)),
            _ => None,
        }
    }

    /// The function a call-like instruction directly calls, if the callee is
    /// a plain function value.
    pub fn called_function(&self, value: ValueRef) -> Option<FuncRef> {
        match self.as_call(value)? {
            (ValueRef::Func(func), _) => Some(func),
            _ => None,
        }
    }

    /// The constant expression behind a value, if it is one.
    pub fn as_const_expr(&self, value: ValueRef) -> Option<&ConstExpr> {
        match value {
            ValueRef::Const(c) => match &self.consts[c] {
                ConstData::Expr(expr) => Some(expr),
                _ => None,
            },
            _ => None,
        }
    }

    /// The store size of `ty` under `module`'s data layout, or `None` for
    /// unsized types.
    pub fn store_size(&self, module: ModuleId, ty: Type) -> Option<usize> {
        self.modules[module].layout.store_size(ty, &self.types)
    }
}
