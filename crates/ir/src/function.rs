use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::{
    inst::{Inst, InstId},
    linkage::Linkage,
    module::ModuleId,
    types::Type,
};

#[derive(Debug, Clone)]
pub struct Function {
    /// Signature of the function.
    pub sig: Signature,

    /// The module the function belongs to.
    pub module: ModuleId,

    insts: PrimaryMap<InstId, Inst>,
}

impl Function {
    pub fn new(module: ModuleId, sig: Signature) -> Self {
        Self {
            sig,
            module,
            insts: PrimaryMap::default(),
        }
    }

    /// A declaration carries no body; it refers to a function defined in
    /// another module.
    pub fn is_declaration(&self) -> bool {
        self.sig.linkage().is_external()
    }

    pub fn num_args(&self) -> usize {
        self.sig.args().len()
    }

    pub fn arg_ty(&self, idx: u32) -> Type {
        self.sig.args()[idx as usize]
    }

    /// Instruction ids in iteration order.
    pub fn insts(&self) -> impl Iterator<Item = InstId> + '_ {
        self.insts.keys()
    }

    pub fn inst(&self, inst: InstId) -> &Inst {
        &self.insts[inst]
    }

    pub(crate) fn push_inst(&mut self, inst: Inst) -> InstId {
        self.insts.push(inst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Name of the function.
    name: String,

    /// Linkage of the function.
    linkage: Linkage,

    args: SmallVec<[Type; 8]>,
    ret_ty: Type,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, args: &[Type], ret_ty: Type) -> Self {
        Self {
            name: name.to_string(),
            linkage,
            args: args.into(),
            ret_ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn ret_ty(&self) -> Type {
        self.ret_ty
    }
}
