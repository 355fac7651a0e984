// src/config.rs

//! 连接管道的配置快照。
//!
//! `ClientConfig` 与 `ServerConfig` 在生命周期管理器构造时创建一次，
//! 此后只读。不变式：连接一旦进入 Connecting 状态，配置不再被修改。

use crate::error::WsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use url::Url;

pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_PATH: &str = "/";
/// 升级前 HTTP 消息聚合的最大长度（字节）。
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 64 * 1024;

/// 空闲检测阈值。
///
/// 每一类阈值用 `Option<Duration>` 表示，`None` 表示该类检测被禁用。
/// 禁用是显式的独立状态，不复用"极大数值"之类的数值哨兵，
/// 避免阈值运算时的溢出与语义混淆。默认全部禁用。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IdleThresholds {
    /// 读空闲阈值：超过该时长没有任何入站活动则上报 ReadIdle（仅观测，不关闭）。
    pub read: Option<Duration>,
    /// 写空闲阈值：超过该时长没有任何出站活动则上报 WriteIdle（仅观测，不关闭）。
    pub write: Option<Duration>,
    /// 读写空闲阈值：读、写同时超过该时长则上报 AllIdle，随后立即关闭连接。
    pub all: Option<Duration>,
}

impl IdleThresholds {
    /// 是否有任意一类检测被启用。
    pub fn any_enabled(&self) -> bool {
        self.read.is_some() || self.write.is_some() || self.all.is_some()
    }

    /// 已启用阈值中的最小值。全部禁用时返回 `None`。
    pub fn smallest(&self) -> Option<Duration> {
        [self.read, self.write, self.all]
            .into_iter()
            .flatten()
            .min()
    }
}

/// WebSocket 客户端配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 目标主机。
    pub host: String,
    /// 目标端口。
    pub port: u16,
    /// HTTP 升级路径。
    pub path: String,
    /// 是否启用 TLS（启用时 URL scheme 为 wss）。
    pub ssl: bool,
    /// 单条消息的最大长度（字节），透传给底层编解码器。
    pub max_content_length: usize,
    /// 空闲检测阈值。
    pub idle: IdleThresholds,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_CLIENT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            ssl: false,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            idle: IdleThresholds::default(),
        }
    }
}

impl ClientConfig {
    /// 校验连接前置条件：主机非空，端口在有效范围内。
    pub fn validate(&self) -> Result<(), WsError> {
        if self.host.trim().is_empty() {
            return Err(WsError::InvalidConfig("主机地址不能为空".to_string()));
        }
        if self.port == 0 {
            return Err(WsError::InvalidConfig("端口号不能为 0".to_string()));
        }
        Ok(())
    }

    /// 根据配置构建连接 URL：`ws[s]://host:port/path`。
    pub fn url(&self) -> Result<Url, WsError> {
        self.validate()?;
        let scheme = if self.ssl { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let raw = format!("{}://{}:{}{}", scheme, self.host, self.port, path);
        Url::parse(&raw).map_err(|e| WsError::InvalidUrl(format!("'{}': {}", raw, e)))
    }
}

/// WebSocket 服务端配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址。
    pub host: String,
    /// 监听端口。端口 0 表示由系统分配随机端口（便于测试）。
    pub port: u16,
    /// 接受升级请求的 HTTP 路径，其他路径一律拒绝。
    pub path: String,
    /// 单条消息的最大长度（字节），透传给底层编解码器。
    pub max_content_length: usize,
    /// 空闲检测阈值，作用于每个已接受的连接。
    pub idle: IdleThresholds,
    /// 处理 Accept 的线程数量。tokio 没有 boss/worker 线程组的划分，
    /// 此字段仅保留配置面并在启动日志中输出。
    pub boss_threads: usize,
    /// 处理读写事件的线程数量。入口程序据此设置运行时的 worker 线程数。
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            idle: IdleThresholds::default(),
            boss_threads: 1,
            worker_threads: 1,
        }
    }
}

impl ServerConfig {
    /// 校验绑定前置条件。
    pub fn validate(&self) -> Result<(), WsError> {
        if self.host.trim().is_empty() {
            return Err(WsError::InvalidConfig("监听地址不能为空".to_string()));
        }
        Ok(())
    }

    /// 监听地址字符串 `host:port`。
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 根据 `max_content_length` 生成底层编解码器配置。
pub(crate) fn codec_config(max_content_length: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_content_length);
    config.max_frame_size = Some(max_content_length);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults_match_contract() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.path, "/");
        assert!(!config.ssl);
        assert_eq!(config.max_content_length, 65536);
        assert!(!config.idle.any_enabled());
    }

    #[test]
    fn test_server_defaults_match_contract() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.boss_threads, 1);
        assert_eq!(config.worker_threads, 1);
        assert!(!config.idle.any_enabled());
    }

    #[test]
    fn test_url_building_with_and_without_ssl() {
        let mut config = ClientConfig::default();
        assert_eq!(config.url().expect("URL 构建失败").as_str(), "ws://127.0.0.1:9000/");

        config.ssl = true;
        config.path = "chat".to_string(); // 缺失前导斜杠时自动补齐
        assert_eq!(
            config.url().expect("URL 构建失败").as_str(),
            "wss://127.0.0.1:9000/chat"
        );
    }

    #[test]
    fn test_invalid_host_and_port_rejected() {
        let mut config = ClientConfig::default();
        config.host = "  ".to_string();
        assert!(matches!(config.url(), Err(WsError::InvalidConfig(_))));

        let mut config = ClientConfig::default();
        config.port = 0;
        assert!(matches!(config.validate(), Err(WsError::InvalidConfig(_))));
    }

    #[test]
    fn test_smallest_enabled_threshold() {
        let thresholds = IdleThresholds {
            read: Some(Duration::from_secs(5)),
            write: None,
            all: Some(Duration::from_secs(2)),
        };
        assert_eq!(thresholds.smallest(), Some(Duration::from_secs(2)));
        assert_eq!(IdleThresholds::default().smallest(), None);
    }
}
