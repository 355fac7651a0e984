// src/pipeline.rs

//! 每连接的有序处理管道。
//!
//! 一条连接的全部处理（帧解码、空闲评估、消息分发）在单个任务内串行执行：
//! 接收循环用 `select!` 在入站帧流与空闲评估定时器之间复用，保证同一连接
//! 的事件只会被一个任务依次处理，无需每连接加锁。出站文本经有界队列交给
//! 独立的发送任务封帧写出，发送成功后刷新写活跃度。

use crate::connection::{ConnectionHandle, ConnectionState};
use crate::config::IdleThresholds;
use crate::dispatcher::MessageDispatcher;
use crate::error::WsError;
use crate::event::{CloseReason, ConnectionClosedEvent};
use crate::idle::{IdleState, IdleTracker};
use crate::message::TextMessage;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as TungsteniteError;
use tokio_tungstenite::WebSocketStream;

/// 驱动一条连接直至关闭。
///
/// 调用时连接已完成升级握手并处于 Active 状态。本函数负责：
/// 触发恰好一次的 `on_connection_opened` / `on_connection_closed`，
/// 按线路顺序分发文本消息，按周期评估空闲迁移（AllIdle 投递后立即关闭），
/// 并在结束前等待发送任务退出、以结构化事件记录关闭原因。
pub(crate) async fn drive_connection<S>(
    conn: Arc<ConnectionHandle>,
    ws_stream: WebSocketStream<S>,
    outbound_rx: mpsc::Receiver<String>,
    dispatcher: Arc<dyn MessageDispatcher>,
    thresholds: IdleThresholds,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let sender_task = spawn_sender_task(Arc::clone(&conn), ws_sender, outbound_rx);

    dispatcher.on_connection_opened(&conn);

    let mut tracker = IdleTracker::new(thresholds);
    let mut idle_interval = tracker.tick_interval().map(tokio::time::interval);

    let mut reason = CloseReason::PeerClosed;
    let mut detail: Option<String> = None;

    loop {
        tokio::select! {
            _ = conn.close_requested_notified() => {
                debug!("[连接管道] 连接 {} 收到本端关闭请求", conn.id());
                reason = CloseReason::LocalShutdown;
                break;
            }
            _ = idle_tick(&mut idle_interval) => {
                let mut all_idle = false;
                for state in tracker.poll(conn.activity()) {
                    dispatcher.on_idle_event(&conn, state);
                    if state == IdleState::AllIdle {
                        all_idle = true;
                    }
                }
                if all_idle {
                    // AllIdle 事件投递完成后立即关闭连接
                    reason = CloseReason::IdleTimeout;
                    break;
                }
            }
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    conn.activity().record_read();
                    dispatcher.on_message(&conn, TextMessage::new(conn.id(), text));
                }
                Some(Ok(Message::Binary(data))) => {
                    conn.activity().record_read();
                    debug!(
                        "[连接管道] 连接 {} 收到二进制帧 ({} 字节)，不投递给 on_message",
                        conn.id(),
                        data.len()
                    );
                    dispatcher.on_unsupported_frame(&conn, "binary");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Ping/Pong 由编解码器自动应答，此处只计入读活跃度
                    conn.activity().record_read();
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("[连接管道] 连接 {} 收到对端 Close 帧: {:?}", conn.id(), frame);
                    reason = CloseReason::PeerClosed;
                    break;
                }
                Some(Ok(Message::Frame(_))) => {
                    debug!("[连接管道] 连接 {} 收到底层原始帧，跳过", conn.id());
                }
                Some(Err(TungsteniteError::ConnectionClosed))
                | Some(Err(TungsteniteError::AlreadyClosed)) => {
                    reason = CloseReason::PeerClosed;
                    break;
                }
                Some(Err(e)) => {
                    reason = CloseReason::ProtocolError;
                    detail = Some(WsError::Protocol(e).to_string());
                    break;
                }
                None => {
                    debug!("[连接管道] 连接 {} 的接收流已结束", conn.id());
                    reason = CloseReason::PeerClosed;
                    break;
                }
            }
        }
    }

    conn.set_state(ConnectionState::Closed);
    // 通知发送任务收尾（发出 Close 帧后退出）
    conn.request_close();
    if let Err(e) = sender_task.await {
        warn!("[连接管道] 等待连接 {} 的发送任务结束时出错: {:?}", conn.id(), e);
    }

    let event = ConnectionClosedEvent::new(&conn, reason, detail);
    match reason {
        CloseReason::ProtocolError => warn!("[连接管道] 连接已关闭: {}", event.to_json()),
        _ => info!("[连接管道] 连接已关闭: {}", event.to_json()),
    }
    dispatcher.on_connection_closed(&conn, reason);
}

/// 空闲评估定时分支。所有阈值都被禁用时永不就绪。
async fn idle_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// 出站发送任务：串行消费出站队列，封装文本帧写出并刷新写活跃度。
///
/// 循环同时观察连接的关闭信号，保证关闭请求发出后百毫秒内退出，
/// 退出前尽力向对端发送 Close 帧。
fn spawn_sender_task<S>(
    conn: Arc<ConnectionHandle>,
    mut ws_sender: SplitSink<WebSocketStream<S>, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if conn.close_requested() {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
            tokio::select! {
                biased;
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    // 周期性回到循环头部检查关闭信号
                    continue;
                }
                maybe_text = outbound_rx.recv() => match maybe_text {
                    Some(text) => {
                        if let Err(e) = ws_sender.send(Message::Text(text)).await {
                            warn!(
                                "[发送任务] 连接 {} 写出消息失败，连接可能已断开: {}",
                                conn.id(),
                                e
                            );
                            break;
                        }
                        conn.activity().record_write();
                    }
                    None => {
                        debug!("[发送任务] 连接 {} 的出站通道已关闭", conn.id());
                        break;
                    }
                }
            }
        }
        debug!("[发送任务] 连接 {} 的发送循环已结束", conn.id());
    })
}
