mod runner;

pub use runner::{CancelFlag, LoopOrchestrator};
