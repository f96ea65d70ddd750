//! 事件系统配置
//!
//! 分为分发配置（`EventConfig`，历史记录开关与容量）与投递配置
//! （`DeliveryConfig`，重试、超时、限流/节流窗口与工作者数量）。
//!
use std::time::Duration;

/// 分发配置
#[derive(Clone, Copy, Debug)]
pub struct EventConfig {
    /// 是否记录分发历史
    pub history_enabled: bool,
    /// 历史记录容量（超过后按 FIFO 淘汰）
    pub history_capacity: usize,
    /// 投递配置（异步路径）
    pub delivery: DeliveryConfig,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            history_enabled: false,
            history_capacity: 100,
            delivery: DeliveryConfig::default(),
        }
    }
}

/// 异步投递配置
#[derive(Clone, Copy, Debug)]
pub struct DeliveryConfig {
    /// 单个任务的最大尝试次数
    pub max_tries: u32,
    /// 单次尝试的超时
    pub timeout: Duration,
    /// 失败后重新入队的固定延迟
    pub retry_after: Duration,
    /// 自任务创建起的重试总时长上限
    pub retry_ceiling: Duration,
    /// 限流窗口（按事件名）
    pub rate_limit_decay: Duration,
    /// 节流窗口（按事件名 + 业务实体）
    pub throttle_window: Duration,
    /// 工作者数量
    pub workers: usize,
    /// 队列为空时的轮询间隔
    pub poll_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            timeout: Duration::from_secs(120),
            retry_after: Duration::from_secs(60),
            retry_ceiling: Duration::from_secs(24 * 60 * 60),
            rate_limit_decay: Duration::from_secs(60),
            throttle_window: Duration::from_secs(1),
            workers: 4,
            poll_interval: Duration::from_millis(100),
        }
    }
}
