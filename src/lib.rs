// src/lib.rs

//! `ws_pipeline_utils` - 基于 tokio-tungstenite 的 WebSocket 连接管道工具库。
//!
//! 提供成对的客户端/服务端生命周期管理器，把底层编解码器
//! （封帧、掩码、HTTP 升级握手）组装进统一的每连接处理管道：
//! 帧解码 → 空闲检测 → 消息分发。协议字节处理全部委托给
//! `tokio-tungstenite`，本库只负责配置粘合、连接生命周期与
//! 事件的有序分发。
//!
//! - [`client::service::WsClientService`]：单连接客户端，connect 幂等，
//!   `is_connected` 无锁可查。
//! - [`server::service::WsServerService`]：多连接服务端，`start` 返回
//!   监听句柄，支持优雅停机。
//! - [`dispatcher::MessageDispatcher`]：无状态共享的消息分发契约，
//!   附带客户端日志分发器与服务端回显分发器两个零配置默认实现。
//! - [`idle`]：按连接评估读/写/读写空闲迁移，AllIdle 触发关闭。

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod idle;
pub mod message;
pub mod server;

pub(crate) mod pipeline;
