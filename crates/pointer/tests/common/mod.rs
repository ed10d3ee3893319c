use std::sync::Arc;

use kestrel_ir::Program;
use kestrel_pointer::{AnalysisConfig, PointsToEngine};

pub fn lazy_config() -> AnalysisConfig {
    AnalysisConfig {
        use_lazy_evaluation: true,
        ..AnalysisConfig::default()
    }
}

pub fn eager_engine(prog: &Arc<Program>) -> PointsToEngine {
    PointsToEngine::new(prog.clone(), AnalysisConfig::default())
}

pub fn lazy_engine(prog: &Arc<Program>) -> PointsToEngine {
    PointsToEngine::new(prog.clone(), lazy_config())
}
