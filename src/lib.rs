//! # batchsync
//!
//! 批量内容同步调度系统的应用层：配置装配、定义导入、预览、手工提交和调度循环。

pub mod app;
pub mod document;
pub mod shutdown;

pub use app::{preview, Application, ImportSummary, PreviewEntry};
pub use document::{load_request, Definitions};
pub use shutdown::ShutdownManager;
