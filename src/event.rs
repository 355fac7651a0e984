// src/event.rs

//! 连接生命周期事件定义。
//!
//! 每个连接的关闭都会产生一个结构化、可序列化的事件，标识连接与关闭原因。
//! 事件以 JSON 形式写入日志，空闲超时关闭与异常关闭通过 `reason` 字段区分。

use crate::connection::{ConnectionHandle, ConnectionRole};
use serde::Serialize;

/// 连接关闭原因。
///
/// `IdleTimeout` 是设计内的可观测关闭，并非错误；
/// 在关闭通知的负载中必须与异常关闭可区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// 读写空闲达到 AllIdle 阈值后的主动关闭。
    IdleTimeout,
    /// 对端关闭了连接（收到 Close 帧或流结束）。
    PeerClosed,
    /// WebSocket 协议或底层 I/O 错误导致的异常关闭。
    ProtocolError,
    /// 本端主动断开（disconnect 或进程停机）。
    LocalShutdown,
}

/// 连接关闭事件的结构化负载。
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionClosedEvent {
    /// 关闭的连接标识。
    pub connection_id: String,
    /// 连接角色（client / server）。
    pub role: ConnectionRole,
    /// 关闭原因。
    pub reason: CloseReason,
    /// 附加错误信息（仅异常关闭时存在）。
    pub detail: Option<String>,
}

impl ConnectionClosedEvent {
    pub(crate) fn new(
        conn: &ConnectionHandle,
        reason: CloseReason,
        detail: Option<String>,
    ) -> Self {
        ConnectionClosedEvent {
            connection_id: conn.id().to_string(),
            role: conn.role(),
            reason,
            detail,
        }
    }

    /// 序列化为 JSON 字符串，用于日志输出。序列化失败时退化为 Debug 格式。
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}
