// src/client/service.rs

//! 客户端连接的生命周期管理器。

use crate::client::transport;
use crate::config::ClientConfig;
use crate::connection::{ConnectionHandle, ConnectionRole, ConnectionState, OUTBOUND_QUEUE_CAPACITY};
use crate::dispatcher::MessageDispatcher;
use crate::error::WsError;
use crate::pipeline;
use log::{error, info, warn};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

/// WebSocket 客户端服务。
///
/// 持有一份不可变的配置快照与共享的消息分发器，负责建立连接、组装
/// 每连接的处理管道并跟踪连接状态迁移：
/// Connecting → Handshaking → Active → Closed。
/// 同一实例同一时刻至多维护一条连接；重复 `connect` 是幂等空操作。
pub struct WsClientService {
    config: ClientConfig,
    dispatcher: Arc<dyn MessageDispatcher>,
    /// 串行化 connect 调用的并发护栏。
    connect_guard: TokioMutex<()>,
    /// 当前连接句柄。`is_connected` 等诊断读取不经过异步锁。
    current: RwLock<Option<Arc<ConnectionHandle>>>,
    /// 当前连接的管道任务句柄。
    pipeline_task: TokioMutex<Option<JoinHandle<()>>>,
}

impl WsClientService {
    /// 用配置快照与分发器创建客户端服务。配置此后只读。
    pub fn new(config: ClientConfig, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        info!(
            "[WS客户端] 服务已创建. host:{}, port:{}, path:{}, ssl:{}",
            config.host, config.port, config.path, config.ssl
        );
        WsClientService {
            config,
            dispatcher,
            connect_guard: TokioMutex::new(()),
            current: RwLock::new(None),
            pipeline_task: TokioMutex::new(None),
        }
    }

    /// 建立连接并完成升级握手。
    ///
    /// 已存在未关闭的连接（Connecting/Handshaking/Active）时为幂等空操作，
    /// 不会发起第二条传输连接。任一阶段失败都使状态进入 Closed 并返回
    /// 对应错误，由调用方决定是否重试；本方法不自动重试。
    pub async fn connect(&self) -> Result<(), WsError> {
        let _guard = self.connect_guard.lock().await;

        if let Some(conn) = self.current_handle() {
            if conn.state() != ConnectionState::Closed {
                info!(
                    "[WS客户端] 已存在连接 {} (状态: {:?})，忽略重复的 connect 调用",
                    conn.id(),
                    conn.state()
                );
                return Ok(());
            }
        }

        self.config.validate()?;
        let url = self.config.url()?;

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let conn = Arc::new(ConnectionHandle::new(ConnectionRole::Client, outbound_tx));
        info!("[WS客户端] 开始连接 {} (连接ID: {})", url, conn.id());

        let tcp_stream = match transport::tcp_connect(&self.config).await {
            Ok(stream) => stream,
            Err(e) => {
                conn.set_state(ConnectionState::Closed);
                error!("[WS客户端] 连接 {} 传输层建立失败: {}", conn.id(), e);
                return Err(e);
            }
        };

        conn.set_state(ConnectionState::Handshaking);
        let ws_stream = match transport::upgrade(&self.config, tcp_stream).await {
            Ok(stream) => stream,
            Err(e) => {
                conn.set_state(ConnectionState::Closed);
                error!("[WS客户端] 连接 {} 升级握手失败: {}", conn.id(), e);
                return Err(e);
            }
        };

        conn.set_state(ConnectionState::Active);
        info!(
            "[WS客户端] 连接已就绪. url:{}, 连接ID:{}, 空闲阈值: read:{:?}, write:{:?}, all:{:?}",
            url, conn.id(), self.config.idle.read, self.config.idle.write, self.config.idle.all
        );
        self.store_current(Some(Arc::clone(&conn)));

        let task = tokio::spawn(pipeline::drive_connection(
            conn,
            ws_stream,
            outbound_rx,
            Arc::clone(&self.dispatcher),
            self.config.idle,
        ));
        *self.pipeline_task.lock().await = Some(task);
        Ok(())
    }

    /// 将一条文本消息排入发送队列。
    ///
    /// 状态不为 Active 时同步返回 [`WsError::NotConnected`]；
    /// 成功入队不代表已送达（无投递确认契约）。
    pub fn send_message(&self, text: impl Into<String>) -> Result<(), WsError> {
        match self.current_handle() {
            Some(conn) => conn.send_text(text),
            None => Err(WsError::NotConnected),
        }
    }

    /// 当前是否已连接（状态 == Active 的无锁读取）。
    pub fn is_connected(&self) -> bool {
        self.current_handle().is_some_and(|conn| conn.is_active())
    }

    /// 当前连接句柄（若有）。
    pub fn connection(&self) -> Option<Arc<ConnectionHandle>> {
        self.current_handle()
    }

    /// 主动断开当前连接并等待其管道任务结束。未连接时为空操作。
    pub async fn disconnect(&self) {
        if let Some(conn) = self.current_handle() {
            info!("[WS客户端] 主动断开连接 {}", conn.id());
            conn.request_close();
        }
        if let Some(task) = self.pipeline_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("[WS客户端] 等待管道任务结束时出错: {:?}", e);
            }
        }
        self.store_current(None);
    }

    fn current_handle(&self) -> Option<Arc<ConnectionHandle>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_current(&self, value: Option<Arc<ConnectionHandle>>) {
        match self.current.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}
