// src/connection.rs

//! 单条连接的句柄与活跃度记录。
//!
//! `ConnectionHandle` 由生命周期管理器创建并独占拥有，连接关闭后销毁。
//! 生命周期状态只由拥有该连接的管道任务写入；其他线程出于诊断目的的
//! 读取全部走无锁原子读。

use crate::error::WsError;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use uuid::Uuid;

/// 出站队列容量。队列满说明对端消费过慢，发送方会收到显式错误。
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 32;

/// 连接角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Client,
    Server,
}

/// 连接生命周期状态。
///
/// 状态迁移由事件驱动：传输连接成功后 Connecting→Handshaking，
/// 升级握手成功后 Handshaking→Active，任一阶段失败或连接结束后进入 Closed。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Handshaking,
    Active,
    Closed,
}

impl ConnectionState {
    fn from_u8(value: u8) -> ConnectionState {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Handshaking,
            2 => ConnectionState::Active,
            _ => ConnectionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Handshaking => 1,
            ConnectionState::Active => 2,
            ConnectionState::Closed => 3,
        }
    }
}

/// 连接的读写活跃度时间戳（UTC 毫秒），由原子量承载以支持跨线程无锁读。
///
/// 入站侧由管道的接收循环刷新，出站侧由发送任务在成功写出后刷新。
#[derive(Debug)]
pub struct ConnectionActivity {
    last_read_ms: AtomicI64,
    last_write_ms: AtomicI64,
}

impl ConnectionActivity {
    pub(crate) fn new() -> Self {
        let now = Utc::now().timestamp_millis();
        ConnectionActivity {
            last_read_ms: AtomicI64::new(now),
            last_write_ms: AtomicI64::new(now),
        }
    }

    /// 每次成功读取后刷新入站时间戳。
    pub(crate) fn record_read(&self) {
        self.stamp_read_at(Utc::now().timestamp_millis());
    }

    /// 每次成功写出后刷新出站时间戳。
    pub(crate) fn record_write(&self) {
        self.stamp_write_at(Utc::now().timestamp_millis());
    }

    pub(crate) fn stamp_read_at(&self, ms: i64) {
        self.last_read_ms.store(ms, Ordering::Relaxed);
    }

    pub(crate) fn stamp_write_at(&self, ms: i64) {
        self.last_write_ms.store(ms, Ordering::Relaxed);
    }

    /// 最近一次入站活动的 UTC 毫秒时间戳。
    pub fn last_read_ms(&self) -> i64 {
        self.last_read_ms.load(Ordering::Relaxed)
    }

    /// 最近一次出站活动的 UTC 毫秒时间戳。
    pub fn last_write_ms(&self) -> i64 {
        self.last_write_ms.load(Ordering::Relaxed)
    }
}

/// 代表一条传输层连接的句柄。
///
/// 携带连接的唯一标识、角色、生命周期状态、出站发送队列与活跃度记录。
/// 同一个句柄会以 `Arc` 形式传给消息分发器，分发器通过它回写消息
/// （能力接口 + 显式上下文传递，分发器自身不保存任何每连接状态）。
#[derive(Debug)]
pub struct ConnectionHandle {
    id: Uuid,
    role: ConnectionRole,
    state: AtomicU8,
    outbound: mpsc::Sender<String>,
    activity: ConnectionActivity,
    should_close: AtomicBool,
    close_notify: Notify,
}

impl ConnectionHandle {
    pub(crate) fn new(role: ConnectionRole, outbound: mpsc::Sender<String>) -> Self {
        ConnectionHandle {
            id: Uuid::new_v4(),
            role,
            state: AtomicU8::new(ConnectionState::Connecting.as_u8()),
            outbound,
            activity: ConnectionActivity::new(),
            should_close: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    /// 连接的唯一标识。
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 连接角色。
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// 当前生命周期状态（无锁原子读，可在任意线程调用）。
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// 状态是否为 Active。
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// 活跃度记录。
    pub fn activity(&self) -> &ConnectionActivity {
        &self.activity
    }

    /// 将一条文本消息排入出站队列，等待封帧与异步发送。
    ///
    /// 状态不为 Active 时同步返回 [`WsError::NotConnected`]，不产生任何帧。
    /// 本契约不包含投递确认。
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), WsError> {
        if !self.is_active() {
            return Err(WsError::NotConnected);
        }
        self.outbound
            .try_send(text.into())
            .map_err(|e| match e {
                TrySendError::Full(_) => WsError::SendQueueFull,
                TrySendError::Closed(_) => WsError::SendErrorClosed,
            })
    }

    /// 请求关闭连接。幂等；管道任务与发送任务都会观察到该信号。
    pub(crate) fn request_close(&self) {
        self.should_close.store(true, Ordering::SeqCst);
        self.close_notify.notify_one();
    }

    pub(crate) fn close_requested(&self) -> bool {
        self.should_close.load(Ordering::SeqCst)
    }

    /// 等待关闭请求。若请求先于等待发生则立即返回。
    pub(crate) async fn close_requested_notified(&self) {
        if self.close_requested() {
            return;
        }
        self.close_notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle() -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        (ConnectionHandle::new(ConnectionRole::Client, tx), rx)
    }

    #[test]
    fn test_send_before_active_fails_without_frame() {
        let (conn, mut rx) = test_handle();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(matches!(conn.send_text("早到的消息"), Err(WsError::NotConnected)));

        conn.set_state(ConnectionState::Handshaking);
        assert!(matches!(conn.send_text("还是太早"), Err(WsError::NotConnected)));

        // 未连接时的发送尝试不得产生任何已入队的帧
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_when_active_enqueues_text_frame() {
        let (conn, mut rx) = test_handle();
        conn.set_state(ConnectionState::Active);
        assert!(conn.is_active());
        conn.send_text("你好").expect("Active 状态下发送应成功");

        match rx.try_recv() {
            Ok(text) => assert_eq!(text, "你好"),
            other => panic!("预期入队一条文本帧，实际: {:?}", other),
        }
    }

    #[test]
    fn test_send_after_closed_fails() {
        let (conn, _rx) = test_handle();
        conn.set_state(ConnectionState::Active);
        conn.set_state(ConnectionState::Closed);
        assert!(matches!(conn.send_text("迟到的消息"), Err(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_request_is_observable_and_idempotent() {
        let (conn, _rx) = test_handle();
        assert!(!conn.close_requested());
        conn.request_close();
        conn.request_close();
        assert!(conn.close_requested());
        // 请求先于等待发生时应立即返回
        conn.close_requested_notified().await;
    }
}
