//! Program and function builders. The builders are the only write surface of
//! the IR; a [`Program`] is immutable once `build` returns.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    function::{Function, Signature},
    global_variable::{GlobalRef, GlobalVariableData},
    inst::{BinaryOp, Inst, InstKind},
    layout::DataLayout,
    module::{FuncRef, Module, ModuleId, Program},
    types::Type,
    value::{ConstData, ConstExpr, ConstRef, ValueRef},
};

#[derive(Default)]
pub struct ProgramBuilder {
    prog: Program,
    const_dedup: FxHashMap<ConstData, ConstRef>,
    symbols: FxHashMap<String, GlobalRef>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_module(&mut self, name: &str, layout: DataLayout) -> ModuleId {
        self.prog.modules.push(Module {
            name: name.to_string(),
            layout,
            globals: Vec::new(),
            funcs: Vec::new(),
        })
    }

    pub fn make_global(&mut self, module: ModuleId, data: GlobalVariableData) -> ValueRef {
        if self.symbols.contains_key(&data.symbol) {
            panic!("duplicate global symbol `{}`", data.symbol);
        }

        // The global used as a value has pointer type; intern it now so the
        // built program can answer type queries without mutation.
        self.prog.types.make_ptr(data.ty);

        let init = data.data.clone();
        let symbol = data.symbol.clone();
        let gv = self.prog.globals.push(data);
        self.symbols.insert(symbol, gv);
        self.prog.modules[module].globals.push(gv);

        if let Some(init) = init {
            init.for_each_value(&mut |used| self.track_user(used, ValueRef::Global(gv)));
        }
        ValueRef::Global(gv)
    }

    pub fn declare_function(&mut self, module: ModuleId, sig: Signature) -> FuncRef {
        let fn_ty = self.prog.types.make_func(sig.args(), sig.ret_ty());
        self.prog.types.make_ptr(fn_ty);

        let func = self.prog.funcs.push(Function::new(module, sig));
        self.prog.modules[module].funcs.push(func);
        func
    }

    pub fn make_int(&mut self, value: i64, ty: Type) -> ValueRef {
        self.make_const(ConstData::Int(value, ty))
    }

    /// The null pointer of the given pointer type.
    pub fn make_null(&mut self, ty: Type) -> ValueRef {
        self.make_const(ConstData::Null(ty))
    }

    pub fn make_undef(&mut self, ty: Type) -> ValueRef {
        self.make_const(ConstData::Undef(ty))
    }

    /// A constant-expression bitcast of `value` to `ty`.
    pub fn make_bitcast_expr(&mut self, value: ValueRef, ty: Type) -> ValueRef {
        self.make_const(ConstData::Expr(ConstExpr::Bitcast { value, ty }))
    }

    fn make_const(&mut self, data: ConstData) -> ValueRef {
        if let Some(&c) = self.const_dedup.get(&data) {
            return ValueRef::Const(c);
        }

        let c = self.prog.consts.push(data.clone());
        self.const_dedup.insert(data.clone(), c);
        if let ConstData::Expr(ConstExpr::Bitcast { value, .. }) = data {
            self.track_user(value, ValueRef::Const(c));
        }
        ValueRef::Const(c)
    }

    pub fn ptr_type(&mut self, ty: Type) -> Type {
        self.prog.types.make_ptr(ty)
    }

    pub fn array_type(&mut self, elem: Type, len: usize) -> Type {
        self.prog.types.make_array(elem, len)
    }

    pub fn struct_type(&mut self, name: &str, fields: &[Type], packed: bool) -> Type {
        self.prog.types.make_struct(name, fields, packed)
    }

    pub fn func_type(&mut self, args: &[Type], ret_ty: Type) -> Type {
        self.prog.types.make_func(args, ret_ty)
    }

    pub fn func_builder(&mut self, func: FuncRef) -> FunctionBuilder<'_> {
        FunctionBuilder { builder: self, func }
    }

    pub fn build(self) -> Program {
        self.prog
    }

    fn track_user(&mut self, used: ValueRef, user: ValueRef) {
        match used {
            ValueRef::Global(_) | ValueRef::Func(_) | ValueRef::Const(_) => {
                self.prog.users.entry(used).or_default().insert(user);
            }
            _ => {}
        }
    }
}

pub struct FunctionBuilder<'a> {
    builder: &'a mut ProgramBuilder,
    func: FuncRef,
}

impl<'a> FunctionBuilder<'a> {
    pub fn arg(&self, idx: u32) -> ValueRef {
        debug_assert!((idx as usize) < self.builder.prog.funcs[self.func].num_args());
        ValueRef::Arg(self.func, idx)
    }

    pub fn alloca(&mut self, ty: Type) -> ValueRef {
        let ptr_ty = self.builder.ptr_type(ty);
        self.insert(InstKind::Alloca { ty }, ptr_ty)
    }

    pub fn load(&mut self, addr: ValueRef, ty: Type) -> ValueRef {
        self.insert(InstKind::Load { addr }, ty)
    }

    pub fn store(&mut self, value: ValueRef, addr: ValueRef) -> ValueRef {
        self.insert(InstKind::Store { value, addr }, Type::Unit)
    }

    pub fn call(&mut self, callee: ValueRef, args: &[ValueRef], ret_ty: Type) -> ValueRef {
        self.insert(
            InstKind::Call {
                callee,
                args: SmallVec::from_slice(args),
            },
            ret_ty,
        )
    }

    pub fn gep(&mut self, args: &[ValueRef], ret_ty: Type) -> ValueRef {
        self.insert(
            InstKind::Gep {
                args: SmallVec::from_slice(args),
            },
            ret_ty,
        )
    }

    pub fn bitcast(&mut self, value: ValueRef, ty: Type) -> ValueRef {
        self.insert(InstKind::Bitcast { value }, ty)
    }

    pub fn binary(&mut self, code: BinaryOp, lhs: ValueRef, rhs: ValueRef, ty: Type) -> ValueRef {
        self.insert(
            InstKind::Binary {
                code,
                args: [lhs, rhs],
            },
            ty,
        )
    }

    pub fn ret(&mut self, arg: Option<ValueRef>) -> ValueRef {
        self.insert(InstKind::Return { arg }, Type::Unit)
    }

    fn insert(&mut self, kind: InstKind, ty: Type) -> ValueRef {
        let inst_id = self.builder.prog.funcs[self.func].push_inst(Inst::new(kind, ty));
        let user = ValueRef::Inst(self.func, inst_id);
        let inst = self.builder.prog.funcs[self.func].inst(inst_id);

        let mut used = SmallVec::<[ValueRef; 8]>::new();
        inst.kind.for_each_operand(|op| used.push(op));
        for op in used {
            self.builder.track_user(op, user);
        }
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GvInitializer, Linkage};

    #[test]
    fn users_of_globals() {
        let mut pb = ProgramBuilder::new();
        let m = pb.make_module("m0", DataLayout::default());

        let g = pb.make_global(
            m,
            GlobalVariableData::new("g".into(), Type::I32, Linkage::Private, false, None),
        );
        let sig = Signature::new("f", Linkage::Public, &[], Type::Unit);
        let f = pb.declare_function(m, sig);

        let mut fb = pb.func_builder(f);
        let v = fb.load(g, Type::I32);
        fb.ret(None);

        let prog = pb.build();
        let users: Vec<_> = prog.users(g).collect();
        assert_eq!(users.len(), 1);
        assert!(matches!(users[0], ValueRef::Inst(func, _) if func == f));
        assert!(prog.users(v).next().is_none());
    }

    #[test]
    fn constants_are_interned() {
        let mut pb = ProgramBuilder::new();
        let ptr = pb.ptr_type(Type::I32);

        let n1 = pb.make_null(ptr);
        let n2 = pb.make_null(ptr);
        assert_eq!(n1, n2);

        let u = pb.make_undef(ptr);
        assert_ne!(n1, u);
    }

    #[test]
    fn global_initializer_users() {
        let mut pb = ProgramBuilder::new();
        let m = pb.make_module("m0", DataLayout::default());

        let sig = Signature::new("callback", Linkage::Public, &[], Type::Unit);
        let f = pb.declare_function(m, sig);
        let table = pb.make_global(
            m,
            GlobalVariableData::constant(
                "vtable".into(),
                Type::I64,
                Linkage::Private,
                GvInitializer::make_array(vec![GvInitializer::Value(ValueRef::Func(f))]),
            ),
        );

        let prog = pb.build();
        let users: Vec<_> = prog.users(ValueRef::Func(f)).collect();
        assert_eq!(users, vec![table]);
    }

    #[test]
    #[should_panic(expected = "duplicate global symbol")]
    fn duplicate_symbol_panics() {
        let mut pb = ProgramBuilder::new();
        let m = pb.make_module("m0", DataLayout::default());
        let data = GlobalVariableData::new("g".into(), Type::I32, Linkage::Private, false, None);
        pb.make_global(m, data.clone());
        pb.make_global(m, data);
    }
}
