//! plcctl - turn a spoken or typed order into TIA Portal GUI actions
//!
//! An LLM plans which screen elements to click or paste into, a second
//! prompt writes the SCL code to paste, and each step is replayed by
//! matching a template image on the selected display and injecting input
//! through uinput.
//!
//! # Example
//!
//! ```no_run
//! use plcctl::{Config, LlmClient, LlmCodeGenerator, LlmPlanner, Orchestrator, RunConfig, ScreenExecutor};
//! use std::path::Path;
//!
//! let config = Config::load();
//! let run = RunConfig::resolve(&config, Path::new("."), plcctl::display_from_env()?);
//! let llm = LlmClient::new(config.llm.to_llm_config()?)?;
//!
//! let planner = LlmPlanner::new(&llm, &run.steps_path);
//! let generator = LlmCodeGenerator::new(&llm);
//! let executor = ScreenExecutor::new(&run)?;
//!
//! let report = Orchestrator::new(planner, generator, executor, run).run()?;
//! println!("{} steps done", report.steps());
//! # Ok::<(), plcctl::Error>(())
//! ```

pub mod codegen;
pub mod config;
pub mod detection;
pub mod error;
pub mod executor;
pub mod instruction;
pub mod llm;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod screen;

pub use codegen::{CodeGenerator, LlmCodeGenerator};
pub use config::{display_from_env, Config, RunConfig};
pub use detection::{Detection, TemplateStore};
pub use error::{Error, Result};
pub use executor::{ActionExecutor, ScreenExecutor, Target};
pub use instruction::Instruction;
pub use llm::{Completion, CompletionRequest, LlmClient, LlmConfig};
pub use orchestrator::{Orchestrator, RetryPolicy, RunReport, RunState};
pub use plan::{Action, Step, StepList};
pub use planner::{LlmPlanner, StepPlanner};
pub use screen::{DisplayId, DisplayInfo};
