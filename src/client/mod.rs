// src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! `transport` 子模块负责传输层与升级握手的编解码适配；
//! `service` 子模块提供客户端连接的生命周期管理器。

pub mod service;
pub mod transport;
