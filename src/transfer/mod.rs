// 传输模块入口
pub mod progress;

pub use progress::ProgressTracker;
