use crate::error::ConfigError;
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 文档来源 ---
    /// 监控的云盘文件夹ID
    pub folder_id: String,
    /// 只处理最近 N 天内更新过的文件
    pub lookback_days: i64,
    /// 接受的文件类型
    pub accepted_mime_type: String,
    // --- Google API 配置 ---
    pub google_access_token: String,
    /// 识别任务使用的中转存储桶
    pub bucket_name: String,
    /// 轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 最大轮询次数
    pub poll_attempts: u32,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 推送配置 ---
    pub line_access_token: String,
    /// 推送日 = 重要日期前 N 周
    pub weeks_before: u32,
    /// 推送日对齐的星期（Mon..Sun）
    pub delivery_weekday: String,
    /// 默认推送时刻（HH:MM）
    pub default_delivery_time: String,
    // --- 持久化 ---
    pub ledger_path: PathBuf,
    pub action_queue_path: PathBuf,
    // --- 定时 ---
    pub ingest_interval_minutes: u64,
    pub sweep_interval_minutes: u64,
    pub dispatch_interval_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            lookback_days: 2,
            accepted_mime_type: "application/pdf".to_string(),
            google_access_token: String::new(),
            bucket_name: String::new(),
            poll_interval_secs: 5,
            poll_attempts: 6,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-1.5-flash".to_string(),
            line_access_token: String::new(),
            weeks_before: 2,
            delivery_weekday: "Sun".to_string(),
            default_delivery_time: "09:00".to_string(),
            ledger_path: PathBuf::from("ledger.json"),
            action_queue_path: PathBuf::from("actions.json"),
            ingest_interval_minutes: 60,
            sweep_interval_minutes: 60,
            dispatch_interval_secs: 60,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件 → 环境变量
    ///
    /// 显式传入的路径必须存在；未传入时如果当前目录有 `pipeline.toml` 就读取它。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                p.exists().then_some(p)
            }
        };

        let config = match file {
            Some(p) => Self::from_toml_file(&p)?,
            None => Self::default(),
        };

        Ok(config.apply_env())
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 用环境变量覆盖已有配置
    pub fn apply_env(self) -> Self {
        let base = self;
        Self {
            folder_id: env_string("FOLDER_ID").unwrap_or(base.folder_id),
            lookback_days: env_parse("LOOKBACK_DAYS").unwrap_or(base.lookback_days),
            accepted_mime_type: env_string("ACCEPTED_MIME_TYPE").unwrap_or(base.accepted_mime_type),
            google_access_token: env_string("GOOGLE_ACCESS_TOKEN").unwrap_or(base.google_access_token),
            bucket_name: env_string("BUCKET_NAME").unwrap_or(base.bucket_name),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS").unwrap_or(base.poll_interval_secs),
            poll_attempts: env_parse("POLL_ATTEMPTS").unwrap_or(base.poll_attempts),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(base.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(base.llm_model_name),
            line_access_token: env_string("LINE_ACCESS_TOKEN").unwrap_or(base.line_access_token),
            weeks_before: env_parse("WEEKS_BEFORE").unwrap_or(base.weeks_before),
            delivery_weekday: env_string("DELIVERY_WEEKDAY").unwrap_or(base.delivery_weekday),
            default_delivery_time: env_string("DEFAULT_DELIVERY_TIME").unwrap_or(base.default_delivery_time),
            ledger_path: env_string("LEDGER_PATH").map(PathBuf::from).unwrap_or(base.ledger_path),
            action_queue_path: env_string("ACTION_QUEUE_PATH").map(PathBuf::from).unwrap_or(base.action_queue_path),
            ingest_interval_minutes: env_parse("INGEST_INTERVAL_MINUTES").unwrap_or(base.ingest_interval_minutes),
            sweep_interval_minutes: env_parse("SWEEP_INTERVAL_MINUTES").unwrap_or(base.sweep_interval_minutes),
            dispatch_interval_secs: env_parse("DISPATCH_INTERVAL_SECS").unwrap_or(base.dispatch_interval_secs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
        }
    }

    // ========== 必填项 ==========

    pub fn folder_id(&self) -> Result<&str, ConfigError> {
        require(&self.folder_id, "folder_id")
    }

    pub fn bucket_name(&self) -> Result<&str, ConfigError> {
        require(&self.bucket_name, "bucket_name")
    }

    pub fn google_access_token(&self) -> Result<&str, ConfigError> {
        require(&self.google_access_token, "google_access_token")
    }

    pub fn llm_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.llm_api_key, "llm_api_key")
    }

    pub fn line_access_token(&self) -> Result<&str, ConfigError> {
        require(&self.line_access_token, "line_access_token")
    }

    // ========== 解析后的值 ==========

    pub fn delivery_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_time(&self.default_delivery_time).ok_or_else(|| ConfigError::Invalid {
            field: "default_delivery_time",
            value: self.default_delivery_time.clone(),
            expected_type: "HH:MM",
        })
    }

    pub fn delivery_weekday(&self) -> Result<Weekday, ConfigError> {
        self.delivery_weekday
            .parse::<Weekday>()
            .map_err(|_| ConfigError::Invalid {
                field: "delivery_weekday",
                value: self.delivery_weekday.clone(),
                expected_type: "Weekday",
            })
    }
}

/// 解析 `HH:MM` 或 `HH:MM:SS`
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(field))
    } else {
        Ok(value)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
