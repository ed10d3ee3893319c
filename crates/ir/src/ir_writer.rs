//! Writer-based textual form of IR entities.

use std::io;

use crate::{
    module::Program,
    value::ValueRef,
};

/// Entities that can be written as text given the enclosing program.
pub trait IrWrite {
    fn write(&self, w: &mut dyn io::Write, prog: &Program) -> io::Result<()>;

    fn dump_string(&self, prog: &Program) -> String {
        let mut buf = Vec::new();
        self.write(&mut buf, prog).unwrap();
        String::from_utf8(buf).unwrap()
    }
}

impl Program {
    /// The full textual form of a value: definitions for instruction values,
    /// the symbol or constant text otherwise.
    pub fn write_value(&self, value: ValueRef, w: &mut dyn io::Write) -> io::Result<()> {
        match value {
            ValueRef::Inst(func, inst) => {
                let inst = self.func(func).inst(inst);
                if !inst.ty.is_unit() {
                    value.write(w, self)?;
                    write!(w, " = ")?;
                }
                inst.write(w, self)
            }
            _ => value.write(w, self),
        }
    }

    pub fn value_string(&self, value: ValueRef) -> String {
        let mut buf = Vec::new();
        self.write_value(value, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::ProgramBuilder, global_variable::GlobalVariableData, layout::DataLayout,
        linkage::Linkage, function::Signature, types::Type, value::ValueRef,
    };

    #[test]
    fn value_text_forms() {
        let mut pb = ProgramBuilder::new();
        let i8_ptr = pb.ptr_type(Type::I8);
        let module = pb.make_module("m0", DataLayout::default());
        let g = pb.make_global(
            module,
            GlobalVariableData::new("counter".into(), Type::I32, Linkage::Private, false, None),
        );
        let func = pb.declare_function(
            module,
            Signature::new("main", Linkage::Public, &[], Type::Unit),
        );
        let mut fb = pb.func_builder(func);
        let p = fb.alloca(Type::I32);
        let q = fb.bitcast(p, i8_ptr);
        let s = fb.store(q, p);

        let prog = pb.build();
        assert_eq!(prog.value_string(g), "%counter");
        assert_eq!(prog.value_string(ValueRef::Func(func)), "%main");
        assert_eq!(prog.value_string(p), "v0 = alloca i32");
        assert_eq!(prog.value_string(q), "v1 = bitcast v0 to *i8");
        assert_eq!(prog.value_string(s), "store v1 v0");
    }
}
