// 传输模块入口
pub mod cancel;
pub mod executor;
pub mod list;
pub mod manage;
pub mod progress;
pub mod queue;
pub mod resolver;
pub mod walk;

pub use cancel::CancelController;
pub use executor::Executor;
pub use queue::{BatchReport, Outcome, QueueManager, TransferContext};
