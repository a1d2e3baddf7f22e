pub mod engine;

pub use engine::{
    eligible_system_roots, system_clean_command, CleanEngine, CleanOutcome, SystemPhase,
    MIN_CLEAN_DURATION, SYSTEM_SEPARATOR,
};
