// src/message.rs

//! 定义管道中流转的入站消息结构。

use uuid::Uuid;

/// 一条已解码的入站文本消息。
///
/// 由帧编解码适配器在成功解码文本帧后产生，携带来源连接的标识，
/// 交由消息分发器恰好消费一次。内容不可变。
#[derive(Debug, Clone)]
pub struct TextMessage {
    /// 来源连接的唯一标识。
    pub connection_id: Uuid,
    /// UTF-8 文本载荷。
    pub text: String,
}

impl TextMessage {
    pub(crate) fn new(connection_id: Uuid, text: String) -> Self {
        TextMessage {
            connection_id,
            text,
        }
    }
}
