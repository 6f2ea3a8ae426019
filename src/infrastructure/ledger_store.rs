//! 基于 JSON 文件的台账
//!
//! 结果行和错误记录保存在同一个文件中。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::infrastructure::json_file::JsonFile;
use crate::models::{ErrorRecord, LedgerRow, TriageStatus};
use crate::traits::{ErrorLedger, Ledger};

/// 当前台账结构版本
pub const LEDGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerState {
    schema_version: u32,
    #[serde(default)]
    rows: Vec<LedgerRow>,
    #[serde(default)]
    errors: Vec<ErrorRecord>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }
}

pub struct FileLedger {
    file: JsonFile<LedgerState>,
}

impl FileLedger {
    /// 打开台账文件并校验结构版本
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let file = JsonFile::<LedgerState>::open(path.as_ref()).await?;

        let (version, row_count, inconsistent) = file
            .read(|s| {
                let bad: Vec<String> = s
                    .rows
                    .iter()
                    .filter(|r| !r.is_consistent())
                    .map(|r| r.document_id.clone())
                    .collect();
                (s.schema_version, s.rows.len(), bad)
            })
            .await?;

        if version != LEDGER_SCHEMA_VERSION {
            return Err(LedgerError::SchemaMismatch {
                path: path.as_ref().display().to_string(),
                expected: LEDGER_SCHEMA_VERSION,
                found: version,
            });
        }

        for document_id in &inconsistent {
            warn!("⚠️ 台账行状态不一致: {}", document_id);
        }

        info!("📒 台账已加载: {} 行", row_count);
        Ok(Self { file })
    }

    pub fn in_memory() -> Self {
        Self {
            file: JsonFile::in_memory(),
        }
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn contains(&self, document_id: &str) -> Result<bool, LedgerError> {
        self.file
            .read(|s| s.rows.iter().any(|r| r.document_id == document_id))
            .await
    }

    async fn append(&self, row: LedgerRow) -> Result<(), LedgerError> {
        self.file
            .update(|s| {
                if s.rows.iter().any(|r| r.document_id == row.document_id) {
                    return Err(LedgerError::DuplicateDocument(row.document_id.clone()));
                }
                s.rows.push(row);
                Ok(())
            })
            .await
    }

    async fn rows(&self) -> Result<Vec<LedgerRow>, LedgerError> {
        self.file.read(|s| s.rows.clone()).await
    }

    async fn update(&self, row: &LedgerRow) -> Result<(), LedgerError> {
        self.file
            .update(|s| {
                let slot = s
                    .rows
                    .iter_mut()
                    .find(|r| r.document_id == row.document_id)
                    .ok_or_else(|| LedgerError::RowNotFound(row.document_id.clone()))?;
                *slot = row.clone();
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ErrorLedger for FileLedger {
    async fn record(&self, record: ErrorRecord) -> Result<(), LedgerError> {
        self.file
            .update(|s| {
                s.errors.push(record);
                Ok(())
            })
            .await
    }

    async fn errors(
        &self,
        subject: Option<&str>,
    ) -> Result<Vec<(usize, ErrorRecord)>, LedgerError> {
        self.file
            .read(|s| {
                s.errors
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| subject.map_or(true, |sub| e.subject == sub))
                    .map(|(i, e)| (i, e.clone()))
                    .collect()
            })
            .await
    }

    async fn set_status(&self, index: usize, status: TriageStatus) -> Result<(), LedgerError> {
        self.file
            .update(|s| {
                let record = s
                    .errors
                    .get_mut(index)
                    .ok_or(LedgerError::ErrorRecordNotFound(index))?;
                record.status = status;
                Ok(())
            })
            .await
    }
}
