// src/error.rs

//! 定义本库的统一错误类型。

use thiserror::Error;

/// WebSocket 连接管道的统一错误类型。
///
/// 错误分类与连接生命周期阶段一一对应：传输层连接/绑定失败、
/// HTTP 升级握手失败、未连接时的发送尝试，以及活动连接上的协议错误。
/// 所有失败都会通过 `Result` 显式返回并记录结构化日志，绝不静默吞掉。
#[derive(Error, Debug)]
pub enum WsError {
    /// TCP 连接失败（拒绝、超时、不可达等）。对单次连接尝试是致命的，不自动重试。
    #[error("传输层连接失败: {0}")]
    TransportConnect(#[source] std::io::Error),

    /// 监听地址绑定失败（端口被占用、权限不足等）。对服务端启动是致命的。
    #[error("监听地址绑定失败: {0}")]
    Bind(#[source] std::io::Error),

    /// HTTP 升级握手被拒绝或响应格式错误。该连接随之关闭。
    #[error("WebSocket升级握手失败: {0}")]
    Handshake(String),

    /// 在连接进入 Active 状态之前尝试发送消息时同步返回。
    #[error("未连接")]
    NotConnected,

    /// 配置校验失败（主机为空、端口非法等）。
    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    /// 无效的 URL 格式。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 活动连接上的 WebSocket 协议错误。
    #[error("WebSocket协议错误: {0}")]
    Protocol(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),

    /// 出站队列已满导致发送失败。调用方可稍后重试。
    #[error("发送错误: 发送队列已满")]
    SendQueueFull,

    /// 尝试发送消息但连接的出站通道已关闭。
    #[error("发送错误: 连接通道已关闭")]
    SendErrorClosed,
}
