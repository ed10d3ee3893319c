//! Engine configuration.

use rustc_hash::FxHashSet;

use crate::oracle::PointerAnalysisKind;

/// Configuration of a [`PointsToEngine`](crate::PointsToEngine).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// If `false`, every non-declaration function is analyzed at engine
    /// construction. If `true`, a function is analyzed on the first query
    /// that reaches it.
    pub use_lazy_evaluation: bool,

    /// Selector handed verbatim to the oracle constructor.
    pub analysis_kind: PointerAnalysisKind,

    /// Call targets with these names are classified as heap allocation
    /// sites.
    pub heap_allocating_functions: FxHashSet<String>,

    /// Emit a warning when a function's interesting-pointer count exceeds
    /// this; pairwise disambiguation is quadratic in it.
    pub large_pointer_warning_threshold: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            use_lazy_evaluation: false,
            analysis_kind: PointerAnalysisKind::default(),
            heap_allocating_functions: default_heap_allocating_functions(),
            large_pointer_warning_threshold: 100,
        }
    }
}

/// The C allocator family plus the mangled C++ `operator new` variants.
pub fn default_heap_allocating_functions() -> FxHashSet<String> {
    ["malloc", "calloc", "realloc", "aligned_alloc", "_Znwm", "_Znam"]
        .into_iter()
        .map(str::to_string)
        .collect()
}
