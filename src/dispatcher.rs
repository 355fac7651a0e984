// src/dispatcher.rs

//! 消息分发器：在解码后的消息与生命周期/空闲事件到达时调用用户逻辑。

use crate::connection::ConnectionHandle;
use crate::event::CloseReason;
use crate::idle::IdleState;
use crate::message::TextMessage;
use log::{debug, info, warn};

/// 消息分发契约。
///
/// 一个分发器实例会被同一服务端的所有连接共享，因此实现必须无状态、
/// 可重入，不得在自身保存每连接状态——连接上下文始终通过参数显式传入。
/// 所有回调都是连接状态迁移的同步、有序副作用：对同一连接，回调按事件
/// 解码顺序依次执行；不同连接之间没有顺序保证。
pub trait MessageDispatcher: Send + Sync {
    /// 连接建立后触发，每连接恰好一次，先于任何 `on_message`。
    fn on_connection_opened(&self, conn: &ConnectionHandle) {
        info!("[分发器] 连接已建立: {}", conn.id());
    }

    /// 每解码一条入站文本帧触发一次，同连接内保持线路顺序。
    fn on_message(&self, conn: &ConnectionHandle, msg: TextMessage) {
        info!("[分发器] 收到消息. 连接:{}, 内容:{}", conn.id(), msg.text);
    }

    /// 转发空闲状态机的迁移。AllIdle 事件投递后连接会被立即关闭。
    fn on_idle_event(&self, conn: &ConnectionHandle, state: IdleState) {
        match state {
            IdleState::ReadIdle => debug!("[分发器] 连接读空闲: {}", conn.id()),
            IdleState::WriteIdle => debug!("[分发器] 连接写空闲: {}", conn.id()),
            IdleState::AllIdle => debug!("[分发器] 连接读写空闲，即将关闭: {}", conn.id()),
            IdleState::Active => {}
        }
    }

    /// 收到不支持的入站帧类型（非文本）时触发，连接保持打开。
    fn on_unsupported_frame(&self, conn: &ConnectionHandle, kind: &str) {
        warn!("[分发器] 不支持的消息类型: {}. 连接:{}", kind, conn.id());
    }

    /// 连接关闭后触发，每连接恰好一次，晚于最后一条 `on_message`。
    fn on_connection_closed(&self, conn: &ConnectionHandle, reason: CloseReason) {
        info!("[分发器] 连接已断开: {}, 原因: {:?}", conn.id(), reason);
    }
}

/// 客户端零配置默认分发器：仅记录日志，不做其他处理。
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

impl MessageDispatcher for LoggingDispatcher {}

/// 服务端零配置默认分发器：记录日志并回显 `"receive msg: " + 原文`。
#[derive(Debug, Default)]
pub struct EchoDispatcher;

impl MessageDispatcher for EchoDispatcher {
    fn on_message(&self, conn: &ConnectionHandle, msg: TextMessage) {
        info!("[分发器] 收到消息. 连接:{}, 内容:{}", conn.id(), msg.text);
        if let Err(e) = conn.send_text(format!("receive msg: {}", msg.text)) {
            warn!("[分发器] 回显消息失败. 连接:{}, 错误:{}", conn.id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionRole, ConnectionState, OUTBOUND_QUEUE_CAPACITY};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn test_echo_dispatcher_enqueues_prefixed_reply() {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let conn = Arc::new(ConnectionHandle::new(ConnectionRole::Server, tx));
        conn.set_state(ConnectionState::Active);

        let dispatcher = EchoDispatcher;
        dispatcher.on_message(&conn, TextMessage::new(conn.id(), "PING".to_string()));

        match rx.try_recv() {
            Ok(text) => assert_eq!(text, "receive msg: PING"),
            other => panic!("预期入队回显帧，实际: {:?}", other),
        }
    }

    #[test]
    fn test_logging_dispatcher_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let conn = Arc::new(ConnectionHandle::new(ConnectionRole::Client, tx));
        conn.set_state(ConnectionState::Active);

        let dispatcher = LoggingDispatcher;
        dispatcher.on_message(&conn, TextMessage::new(conn.id(), "PING".to_string()));
        assert!(rx.try_recv().is_err());
    }
}
