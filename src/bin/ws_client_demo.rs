// src/bin/ws_client_demo.rs

//! 客户端示例：连接 ws://127.0.0.1:9000/，每秒发送一条 "PING"，
//! 连接关闭后退出。收到的回显消息由默认日志分发器打印。

use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use ws_pipeline_utils::client::service::WsClientService;
use ws_pipeline_utils::config::ClientConfig;
use ws_pipeline_utils::dispatcher::LoggingDispatcher;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let service = WsClientService::new(ClientConfig::default(), Arc::new(LoggingDispatcher));
    if let Err(e) = service.connect().await {
        error!("[示例客户端] 连接失败: {}", e);
        return;
    }

    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if !service.is_connected() {
            info!("[示例客户端] 连接已关闭，退出");
            break;
        }
        if let Err(e) = service.send_message("PING") {
            warn!("[示例客户端] 发送失败: {}", e);
        }
    }
}
