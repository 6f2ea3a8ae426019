//! JSON 文件存储
//!
//! 整个状态保存在一个 JSON 文件中。磁盘上的文件是唯一的状态来源：
//! 每次读取都重新加载；每次修改都在 `{path}.lock` 的排他锁内
//! 重新读取 → 修改 → 写临时文件再 rename，多个进程同时打开同一个文件
//! 也不会互相覆盖。没有路径时只保存在内存中。

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::LedgerError;

enum Backing<T> {
    Disk(PathBuf),
    Memory(T),
}

pub struct JsonFile<T> {
    /// 进程内串行化；跨进程由文件锁保证
    backing: Mutex<Backing<T>>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default + Send,
{
    /// 打开文件并检查能否解析，不存在时视为默认值
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        load::<T>(&path).await?;

        Ok(Self {
            backing: Mutex::new(Backing::Disk(path)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Mutex::new(Backing::Memory(T::default())),
        }
    }

    /// 只读访问（文件模式下读取磁盘上的最新内容）
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, LedgerError> {
        let backing = self.backing.lock().await;
        match &*backing {
            Backing::Disk(path) => {
                let state = load::<T>(path).await?;
                Ok(f(&state))
            }
            Backing::Memory(state) => Ok(f(state)),
        }
    }

    /// 读取 → 修改 → 落盘；`f` 返回错误时不写入任何内容
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut T) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError>
    where
        T: Clone,
    {
        let mut backing = self.backing.lock().await;
        match &mut *backing {
            Backing::Disk(path) => {
                let lock = acquire_lock(path).await?;
                let mut state = load::<T>(path).await?;
                let result = f(&mut state)?;
                persist(path, &state).await?;
                drop(lock);
                Ok(result)
            }
            Backing::Memory(state) => {
                let mut next = state.clone();
                let result = f(&mut next)?;
                *state = next;
                Ok(result)
            }
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn load<T>(path: &Path) -> Result<T, LedgerError>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => serde_json::from_str(&content).map_err(|source| LedgerError::Parse {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(io_error(path, source)),
    }
}

async fn persist<T: Serialize>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| LedgerError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .await
        .map_err(|e| io_error(path, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))?;
    Ok(())
}

/// 获取 `{path}.lock` 的排他锁，返回的文件句柄关闭时释放
async fn acquire_lock(path: &Path) -> Result<std::fs::File, LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(path, e))?;
    }

    let lock_path = path.with_extension("json.lock");
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok::<_, std::io::Error>(file)
    })
    .await
    .map_err(|e| io_error(path, std::io::Error::other(e)))?
    .map_err(|e| io_error(path, e))
}
