// src/server/transport.rs

//! 服务端传输层与帧编解码适配。

use crate::config::{codec_config, ServerConfig};
use crate::error::WsError;
use log::debug;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};

/// 服务端 WebSocket 流类型。
pub type ServerWsStream = WebSocketStream<TcpStream>;

/// 绑定 TCP 监听器。
///
/// 端口被占用、权限不足等绑定失败对服务端启动是致命的，
/// 返回 [`WsError::Bind`]，不自动重试。
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, WsError> {
    config.validate()?;
    TcpListener::bind(config.bind_addr())
        .await
        .map_err(WsError::Bind)
}

/// 对一条已接受的 TCP 连接执行带路径校验的升级握手。
///
/// 只接受请求路径与配置路径一致的升级请求，其余路径回以 404 拒绝。
/// 握手失败只影响这一条连接，返回 [`WsError::Handshake`]。
pub async fn accept_connection(
    stream: TcpStream,
    config: &ServerConfig,
) -> Result<ServerWsStream, WsError> {
    let expected_path = config.path.clone();
    let path_check = move |request: &Request, response: Response| {
        if request.uri().path() == expected_path {
            Ok(response)
        } else {
            debug!(
                "[WS服务端] 拒绝未知升级路径: {} (期望: {})",
                request.uri().path(),
                expected_path
            );
            let mut rejection = ErrorResponse::new(Some("unknown upgrade path".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    accept_hdr_async_with_config(
        stream,
        path_check,
        Some(codec_config(config.max_content_length)),
    )
    .await
    .map_err(|e| WsError::Handshake(e.to_string()))
}
