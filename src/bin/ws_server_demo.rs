// src/bin/ws_server_demo.rs

//! 回显服务端示例：监听 0.0.0.0:9000，回显每条文本消息，
//! 读空闲 1 秒告警、读写空闲 10 秒自动断开。

use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use ws_pipeline_utils::config::{IdleThresholds, ServerConfig};
use ws_pipeline_utils::dispatcher::EchoDispatcher;
use ws_pipeline_utils::server::service::WsServerService;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig {
        idle: IdleThresholds {
            read: Some(Duration::from_secs(1)),
            write: None,
            all: Some(Duration::from_secs(10)),
        },
        ..ServerConfig::default()
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("[示例服务端] 创建运行时失败: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let service = WsServerService::new(config, Arc::new(EchoDispatcher));
        let handle = match service.start().await {
            Ok(handle) => handle,
            Err(e) => {
                error!("[示例服务端] 启动失败: {}", e);
                std::process::exit(1);
            }
        };

        info!("[示例服务端] 按 Ctrl+C 停止服务");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("[示例服务端] 等待停止信号失败: {}", e);
        }
        handle.shutdown().await;
        info!("[示例服务端] 已退出");
    });
}
