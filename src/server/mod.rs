// src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! `transport` 子模块负责监听绑定与带路径校验的升级握手；
//! `service` 子模块提供服务端的生命周期管理器与监听句柄。

pub mod service;
pub mod transport;
