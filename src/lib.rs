//! # Summary Broadcast
//!
//! 监控云盘文件夹中的 PDF 通知，自动识别文字、生成摘要、写入台账，
//! 并在推送日把摘要广播给订阅者。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 客户端、JSON 文件），只暴露能力
//! - `FileLedger` - 台账 + 错误台账
//! - `FileActionQueue` - 持久化的一次性延迟任务
//! - `clients/` - Drive / Vision / LINE 的 HTTP 客户端
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文档
//! - `RecognitionService` - 长时文字识别任务
//! - `Summarizer` / `LlmService` - 摘要生成
//! - `extractor` / `delivery_date` - 纯函数：字段提取、推送日计算
//! - `ErrorRecorder` - 写错误台账
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的完整处理流程
//! - `IngestFlow` - 去重 → 重命名 → 识别 → 摘要 → 提取 → 写台账
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/folder_processor` - 文件夹级别的批量导入
//! - `orchestrator/scheduler` - 台账行的推送状态机
//! - `orchestrator/dispatcher` - 到期任务分发
//! - `orchestrator/app` - 入口与常驻模式
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ActionId, DeliveryStatus, DocumentRef, Handler, LedgerRow};
pub use orchestrator::{App, Dispatcher, FolderProcessor, IngestStats, Scheduler};
pub use workflow::{IngestFlow, IngestOutcome};
