use std::fmt;
use rusqlite;

#[derive(Debug)]
pub enum TrackSyncError {
    SqliteError(rusqlite::Error),
    JsonError(String),
    KvStore(String),
    Serialization(String),
    IO(String),
    Database(String),
    Config(String),
    NotInitialized(String),
    Runtime(String),
    InvalidData(String),
    /// 同一时刻只允许一个同步运行
    SyncInProgress,
    /// 任务构造前缺少必需的依赖（服务器地址、凭证等）
    Precondition(String),
    /// 网络 / HTTP 失败
    Transport {
        url: String,
        cause: String,
    },
    /// 响应体无法解码为期望的结构
    Conversion {
        url: String,
        body: Option<String>,
        cause: String,
    },
}

impl fmt::Display for TrackSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSyncError::SqliteError(e) => write!(f, "SQLite error: {}", e),
            TrackSyncError::JsonError(e) => write!(f, "JSON error: {}", e),
            TrackSyncError::KvStore(e) => write!(f, "KV store error: {}", e),
            TrackSyncError::Serialization(e) => write!(f, "Serialization error: {}", e),
            TrackSyncError::IO(e) => write!(f, "IO error: {}", e),
            TrackSyncError::Database(e) => write!(f, "Database error: {}", e),
            TrackSyncError::Config(e) => write!(f, "Config error: {}", e),
            TrackSyncError::NotInitialized(e) => write!(f, "Not initialized: {}", e),
            TrackSyncError::Runtime(e) => write!(f, "Runtime error: {}", e),
            TrackSyncError::InvalidData(e) => write!(f, "Invalid data: {}", e),
            TrackSyncError::SyncInProgress => write!(f, "Sync already in progress"),
            TrackSyncError::Precondition(e) => write!(f, "Precondition failed: {}", e),
            TrackSyncError::Transport { url, cause } => {
                write!(f, "Transport error [{}]: {}", url, cause)
            }
            TrackSyncError::Conversion { url, cause, .. } => {
                write!(f, "Conversion error [{}]: {}", url, cause)
            }
        }
    }
}

impl std::error::Error for TrackSyncError {}

impl From<rusqlite::Error> for TrackSyncError {
    fn from(error: rusqlite::Error) -> Self {
        TrackSyncError::SqliteError(error)
    }
}

impl From<serde_json::Error> for TrackSyncError {
    fn from(error: serde_json::Error) -> Self {
        TrackSyncError::JsonError(error.to_string())
    }
}

impl From<std::io::Error> for TrackSyncError {
    fn from(error: std::io::Error) -> Self {
        TrackSyncError::IO(error.to_string())
    }
}

impl TrackSyncError {
    /// 判断是否是传输层错误（网络 / HTTP）
    pub fn is_transport_error(&self) -> bool {
        matches!(self, TrackSyncError::Transport { .. })
    }

    /// 判断是否是响应解码错误
    pub fn is_conversion_error(&self) -> bool {
        matches!(self, TrackSyncError::Conversion { .. })
    }

    /// 错误关联的请求 URL（如果有）
    pub fn request_url(&self) -> Option<&str> {
        match self {
            TrackSyncError::Transport { url, .. } => Some(url),
            TrackSyncError::Conversion { url, .. } => Some(url),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackSyncError>;
