pub mod builder;
pub mod function;
pub mod global_variable;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod module;
pub mod types;
pub mod value;

pub use builder::{FunctionBuilder, ProgramBuilder};
pub use function::{Function, Signature};
pub use global_variable::{GlobalRef, GlobalVariableData, GvInitializer};
pub use inst::{BinaryOp, Inst, InstId, InstKind, SideEffect};
pub use ir_writer::IrWrite;
pub use layout::{DataLayout, Endian};
pub use linkage::Linkage;
pub use module::{FuncRef, Module, ModuleId, Program};
pub use types::Type;
pub use value::{ConstData, ConstExpr, ConstRef, ValueRef};
