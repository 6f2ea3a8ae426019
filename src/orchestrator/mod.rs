//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和任务调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 打开台账和任务队列
//! - 按子命令装配客户端和服务
//! - 常驻模式的定时循环
//!
//! ### `folder_processor` - 文件夹处理器
//! - 列出最近更新的文档（Vec<DocumentRef>）
//! - 逐个委托 IngestFlow 处理
//! - 有新文档时登记扫描任务
//!
//! ### `scheduler` - 推送调度器
//! - sweep：为待推送行登记任务，修复丢失的任务
//! - fire：发送消息并更新状态
//! - requeue：人工重新排队
//!
//! ### `dispatcher` - 任务分发器
//! - 取出到期任务，按处理器类型分发给 scheduler
//!
//! ## 层次关系
//!
//! ```text
//! app
//!  ├─ folder_processor (处理 Vec<DocumentRef>)
//!  │     ↓
//!  │  workflow::IngestFlow (处理单个文档)
//!  │     ↓
//!  │  services (能力层：识别 / 摘要 / 提取 / 推送日)
//!  │
//!  └─ dispatcher → scheduler (处理台账行)
//!        ↓
//!  infrastructure (基础设施：台账 / 任务队列 / HTTP)
//! ```

pub mod app;
pub mod dispatcher;
pub mod folder_processor;
pub mod scheduler;

// 重新导出主要类型
pub use app::App;
pub use dispatcher::{DispatchStats, Dispatcher};
pub use folder_processor::{FolderProcessor, FolderSettings, IngestStats};
pub use scheduler::{build_message, FireOutcome, Scheduler, SweepReport};
