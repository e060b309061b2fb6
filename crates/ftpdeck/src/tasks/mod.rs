pub mod board;
pub mod submit;

pub use board::{TaskBoard, TaskCounts};
pub use submit::{submit_selection, BatchReport, TaskDraft, TaskSink, TaskType};
