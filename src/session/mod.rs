pub mod orchestrator;
pub mod sections;
