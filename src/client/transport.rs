// src/client/transport.rs

//! 客户端传输层与帧编解码适配。
//!
//! 协议逻辑（封帧、掩码、握手字节）全部委托给 `tokio-tungstenite`，
//! 本模块只做配置粘合：先建立 TCP 连接，再在其上完成 HTTP 升级握手，
//! 两步拆开以便生命周期管理器区分 Connecting 与 Handshaking 两个阶段。

use crate::config::{codec_config, ClientConfig};
use crate::error::WsError;
use log::{debug, info};
use tokio::net::TcpStream;
use tokio_tungstenite::{client_async_tls_with_config, MaybeTlsStream, WebSocketStream};

/// 客户端 WebSocket 流类型：可能经过 TLS 封装的 TCP 流。
pub type ClientWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 建立到 `host:port` 的 TCP 连接（Connecting 阶段）。
///
/// 失败（拒绝、超时、不可达）返回 [`WsError::TransportConnect`]，
/// 对本次连接尝试是致命的，不自动重试。
pub async fn tcp_connect(config: &ClientConfig) -> Result<TcpStream, WsError> {
    let stream = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(WsError::TransportConnect)?;
    // 低延迟小消息场景，关闭 Nagle
    stream.set_nodelay(true).map_err(WsError::TransportConnect)?;
    debug!("[WS客户端] TCP 连接已建立: {}:{}", config.host, config.port);
    Ok(stream)
}

/// 在既有 TCP 连接上完成 HTTP 升级握手（Handshaking 阶段）。
///
/// URL scheme 为 `wss` 时由编解码器先完成 TLS 协商（证书校验交给标准
/// TLS 库的默认策略），再进行升级。握手被拒绝或响应异常时返回
/// [`WsError::Handshake`]，连接随之作废。
pub async fn upgrade(config: &ClientConfig, stream: TcpStream) -> Result<ClientWsStream, WsError> {
    let url = config.url()?;
    let (ws_stream, response) = client_async_tls_with_config(
        url.as_str(),
        stream,
        Some(codec_config(config.max_content_length)),
        None,
    )
    .await
    .map_err(|e| WsError::Handshake(format!("对 {} 的升级握手失败: {}", url, e)))?;

    info!(
        "[WS客户端] 升级握手完成. url:{}, HTTP状态:{}",
        url,
        response.status()
    );
    Ok(ws_stream)
}
