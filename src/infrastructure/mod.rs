//! 基础设施层
//!
//! 持有稀缺资源（HTTP 客户端、台账文件、任务队列文件），只暴露能力，不包含业务流程。

pub mod action_queue;
pub mod http;
pub mod json_file;
pub mod ledger_store;

pub use action_queue::FileActionQueue;
pub use http::ApiClient;
pub use ledger_store::FileLedger;
