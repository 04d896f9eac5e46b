#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Engine side of the pipeline: corpus encoding, external engine runs,
//! stage bookkeeping and reassembly of engine output.

pub mod engine;
pub mod hierarchy;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod reader;
pub mod stage;
pub mod state;
pub mod writer;

pub use engine::{decompress, MalletEngine, TopicEngine};
pub use hierarchy::TopicHierarchy;
pub use paths::RunPaths;
pub use pipeline::{AnalysisInfo, AnalysisRun, Pipeline};
pub use process::{run_command, run_command_blocking, CommandReport, EngineCommand};
pub use reader::{AssignmentReader, ReassemblyTables, TokenIndexed, WithTokenIndex};
pub use stage::{is_complete, is_current, run_stage, run_stage_with_settings, settings_digest, Stage, StageOutcome};
pub use state::{parse_line, StateLayout, StateReader, StateRecord};
pub use writer::{CorpusWriter, PreparedCorpus, PARTITION_LABEL};
