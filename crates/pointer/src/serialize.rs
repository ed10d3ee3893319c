//! Persisting alias sets as text.
//!
//! The format has three segments: `[ValueIds]` (informational), one
//! `[AnalyzedFunctions]` id list, and `[PointsToSets]` with one set per
//! line. Ids are assigned by a canonical traversal of the program, so a
//! file only round-trips against the program it was saved from.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use rustc_hash::{FxHashMap, FxHashSet};

use kestrel_ir::{Program, ValueRef};

use crate::{
    config::AnalysisConfig,
    engine::{PointsToEngine, SetId},
};

/// Deserialization failures. A failed load leaves no engine behind.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("missing `{0}` segment marker")]
    MissingSegment(&'static str),

    #[error("malformed value id `{0}`")]
    MalformedId(String),

    #[error("value id {0} out of range of the program")]
    UnknownId(usize),

    #[error("value id {0} does not denote a function")]
    NotAFunction(usize),
}

/// Visits every serializable value of the program in the canonical order:
/// modules as inserted; per module the globals, then per function the
/// function value, its pointer-typed arguments, and its instructions in
/// iteration order. Saver and loader must traverse identically.
pub fn traverse_values(prog: &Program, mut f: impl FnMut(ValueRef)) {
    for module in prog.modules() {
        for &gv in prog.module_globals(module) {
            f(ValueRef::Global(gv));
        }
        for &func in prog.module_funcs(module) {
            f(ValueRef::Func(func));
            for idx in 0..prog.func(func).num_args() {
                let arg = ValueRef::Arg(func, idx as u32);
                if prog.is_pointer(arg) {
                    f(arg);
                }
            }
            for inst in prog.func(func).insts() {
                f(ValueRef::Inst(func, inst));
            }
        }
    }
}

impl PointsToEngine {
    pub fn save(&self, w: &mut impl Write) -> io::Result<()> {
        let prog = self.program().clone();
        let mut order = Vec::new();
        traverse_values(&prog, |v| order.push(v));

        let mut ids: FxHashMap<ValueRef, usize> = FxHashMap::default();
        writeln!(w, "[ValueIds]")?;
        for (id, &v) in order.iter().enumerate() {
            ids.insert(v, id);
            writeln!(w, "{id}: {}", prog.value_string(v))?;
        }

        writeln!(w, "[AnalyzedFunctions]")?;
        for func in self.analyzed_functions() {
            write!(w, "{} ", ids[&ValueRef::Func(func)])?;
        }
        writeln!(w)?;

        writeln!(w, "[PointsToSets]")?;
        let mut printed: FxHashSet<SetId> = FxHashSet::default();
        for &set in self.bindings.values() {
            // Sets are shared; print each one exactly once.
            if !printed.insert(set) {
                continue;
            }
            // Constant-expression members are outside the canonical
            // traversal and carry no id; they are dropped here.
            let member_ids: Vec<usize> = self.sets[set]
                .iter()
                .filter_map(|m| ids.get(m).copied())
                .collect();
            if member_ids.is_empty() {
                continue;
            }
            for id in member_ids {
                write!(w, "{id} ")?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        self.save(&mut w)
    }

    /// Reconstructs an engine from a previously saved file. The id table is
    /// recomputed from `prog` with the same canonical traversal the saver
    /// used; the `[ValueIds]` segment is skipped.
    pub fn load(
        prog: Arc<Program>,
        config: AnalysisConfig,
        r: impl BufRead,
    ) -> Result<Self, LoadError> {
        let mut order = Vec::new();
        traverse_values(&prog, |v| order.push(v));

        let mut engine = Self::with_config(prog, config);
        let mut lines = r.lines();

        loop {
            let line = lines
                .next()
                .ok_or(LoadError::MissingSegment("[AnalyzedFunctions]"))??;
            if line.trim() == "[AnalyzedFunctions]" {
                break;
            }
        }

        loop {
            let line = lines
                .next()
                .ok_or(LoadError::MissingSegment("[PointsToSets]"))??;
            if line.trim() == "[PointsToSets]" {
                break;
            }
            for tok in line.split_whitespace() {
                let id = parse_id(tok)?;
                let value = *order.get(id).ok_or(LoadError::UnknownId(id))?;
                let ValueRef::Func(func) = value else {
                    return Err(LoadError::NotAFunction(id));
                };
                engine.analyzed.insert(func);
            }
        }

        for line in lines {
            let line = line?;
            let set = engine.alloc_set();
            let mut bound = false;
            for tok in line.split_whitespace() {
                let id = parse_id(tok)?;
                let value = *order.get(id).ok_or(LoadError::UnknownId(id))?;
                engine.bind(value, set);
                bound = true;
            }
            if !bound {
                engine.release_empty_set(set);
            }
        }

        Ok(engine)
    }

    pub fn load_from_file(
        prog: Arc<Program>,
        config: AnalysisConfig,
        path: impl AsRef<Path>,
    ) -> Result<Self, LoadError> {
        Self::load(prog, config, BufReader::new(File::open(path)?))
    }
}

fn parse_id(tok: &str) -> Result<usize, LoadError> {
    tok.parse()
        .map_err(|_| LoadError::MalformedId(tok.to_string()))
}
