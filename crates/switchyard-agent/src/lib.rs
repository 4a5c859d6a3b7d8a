pub mod checkpoint;
pub mod driver;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod run_log;
pub mod service;
pub mod state;
pub mod worker;

pub use checkpoint::{
    create_checkpointer, Checkpoint, Checkpointer, MemoryCheckpointer, SqliteCheckpointer,
};
pub use driver::TaskDriver;
pub use graph::{NodeId, TaskGraph};
pub use run_log::RunLogger;
pub use service::{StatusResponse, SubmitResponse, TaskService};
pub use state::{StateUpdate, TaskState};
pub use worker::{TaskJob, TaskQueue, WorkerPool};
