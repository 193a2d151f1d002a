/// SDK 版本号（来自 Cargo.toml）
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 返回完整版本描述
pub fn version_string() -> String {
    format!("tracksync-sdk/{}", VERSION)
}
