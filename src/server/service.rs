// src/server/service.rs

//! 服务端连接的生命周期管理器。

use crate::config::ServerConfig;
use crate::connection::{ConnectionHandle, ConnectionRole, ConnectionState, OUTBOUND_QUEUE_CAPACITY};
use crate::dispatcher::MessageDispatcher;
use crate::error::WsError;
use crate::pipeline;
use crate::server::transport;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// WebSocket 服务端服务。
///
/// 持有一份不可变的配置快照与一个被所有连接共享的分发器实例。
/// 每接受一条传输连接就组装一条全新的处理管道（带路径校验的编解码
/// 适配 → 空闲检测 → 消息分发）；单条连接的握手失败只关闭该连接，
/// 绝不影响监听套接字与其他连接。
pub struct WsServerService {
    config: ServerConfig,
    dispatcher: Arc<dyn MessageDispatcher>,
}

/// 正在监听的服务端句柄。
///
/// `shutdown` 使接受循环停止接收新连接并释放监听资源后返回——
/// 这是优雅停机的排空步骤，不保证在途消息处理完成。
/// 直接丢弃句柄同样会停止接受新连接。
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl ServerHandle {
    /// 实际绑定的本地地址（端口 0 启动时由此取得分配的端口）。
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 停止接受新连接，等待接受循环退出并释放监听资源。
    pub async fn shutdown(self) {
        info!("[WS服务端] 收到停机请求，停止接受新连接...");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.accept_task.await {
            warn!("[WS服务端] 等待接受循环退出时出错: {:?}", e);
        }
    }
}

impl WsServerService {
    /// 用配置快照与共享分发器创建服务端服务。配置此后只读。
    pub fn new(config: ServerConfig, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        WsServerService { config, dispatcher }
    }

    /// 绑定监听地址并启动接受循环，返回监听句柄。
    ///
    /// 绑定失败（端口占用、权限不足）是致命错误，直接返回 Err，不重试。
    pub async fn start(&self) -> Result<ServerHandle, WsError> {
        let listener = transport::bind(&self.config).await?;
        let local_addr = listener.local_addr()?;

        info!(
            "[WS服务端] 服务已启动. host:{}, path:{}, port:{}, bossThread:{}, workerThread:{}, \
             readIdle:{:?}, writeIdle:{:?}, allIdle:{:?}",
            self.config.host,
            self.config.path,
            local_addr.port(),
            self.config.boss_threads,
            self.config.worker_threads,
            self.config.idle.read,
            self.config.idle.write,
            self.config.idle.all
        );

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let dispatcher = Arc::clone(&self.dispatcher);

        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer_addr)) => {
                            info!("[WS服务端] 接受了来自 {} 的 TCP 连接", peer_addr);
                            let config = config.clone();
                            let dispatcher = Arc::clone(&dispatcher);
                            tokio::spawn(handle_accepted(stream, peer_addr, config, dispatcher));
                        }
                        Err(e) => {
                            // 单次 accept 失败不致命，继续监听其他连接
                            error!("[WS服务端] 接受 TCP 连接失败: {}。服务继续运行。", e);
                        }
                    }
                }
            }
            // listener 在此随任务结束被释放
            info!("[WS服务端] 已停止接受新连接，监听资源已释放。");
        });

        Ok(ServerHandle {
            local_addr,
            shutdown_tx,
            accept_task,
        })
    }
}

/// 处理一条已接受的传输连接：升级握手后组装并驱动其处理管道。
async fn handle_accepted(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    dispatcher: Arc<dyn MessageDispatcher>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("[WS服务端] 为 {} 设置 TCP_NODELAY 失败: {}", peer_addr, e);
    }

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let conn = Arc::new(ConnectionHandle::new(ConnectionRole::Server, outbound_tx));
    conn.set_state(ConnectionState::Handshaking);

    match transport::accept_connection(stream, &config).await {
        Ok(ws_stream) => {
            conn.set_state(ConnectionState::Active);
            info!(
                "[WS服务端] 与 {} 的升级握手成功，连接ID: {}",
                peer_addr,
                conn.id()
            );
            pipeline::drive_connection(conn, ws_stream, outbound_rx, dispatcher, config.idle)
                .await;
        }
        Err(e) => {
            // 握手失败只关闭这一条连接
            conn.set_state(ConnectionState::Closed);
            error!("[WS服务端] 与 {} 的升级握手失败: {}", peer_addr, e);
        }
    }
}
