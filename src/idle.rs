// src/idle.rs

//! 空闲检测状态机。
//!
//! 每条连接独立维护"距上次读活动"与"距上次写活动"两个计时，分别在成功
//! 读取与成功写出时复位。检测按固定周期评估，周期不大于最小的已启用
//! 阈值，避免漏报迁移。三类阈值相互独立：ReadIdle 与 WriteIdle 仅观测，
//! 可以同时成立；AllIdle 要求读、写同时超过阈值，触发后连接随即关闭。

use crate::config::IdleThresholds;
use crate::connection::ConnectionActivity;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

/// 检测周期下限，避免阈值极小时空转。
const MIN_TICK: Duration = Duration::from_millis(10);

/// 连接的空闲状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdleState {
    /// 存在活动，未达到任何阈值。
    Active,
    /// 入站活动超过读空闲阈值（仅观测）。
    ReadIdle,
    /// 出站活动超过写空闲阈值（仅观测）。
    WriteIdle,
    /// 读写活动均超过 AllIdle 阈值，连接将在事件投递后立即关闭。
    AllIdle,
}

/// 空闲状态机。
///
/// `poll` 是纯状态迁移函数：比较当前时刻与活跃度时间戳，返回本轮新产生
/// 的空闲事件。每类事件带"已上报"门闩，活动恢复（计时回落到阈值以下）
/// 后门闩复位，空闲再次持续才会重新上报，避免同一空闲期内重复刷事件。
#[derive(Debug)]
pub struct IdleTracker {
    thresholds: IdleThresholds,
    read_reported: bool,
    write_reported: bool,
    all_reported: bool,
}

impl IdleTracker {
    pub fn new(thresholds: IdleThresholds) -> Self {
        IdleTracker {
            thresholds,
            read_reported: false,
            write_reported: false,
            all_reported: false,
        }
    }

    /// 评估周期：最小已启用阈值的一半（下限 10 毫秒）。
    /// 所有类别都被禁用时返回 `None`，管道不再安排定时评估。
    pub fn tick_interval(&self) -> Option<Duration> {
        self.thresholds.smallest().map(|smallest| {
            let half = smallest / 2;
            if half < MIN_TICK { MIN_TICK.min(smallest) } else { half }
        })
    }

    /// 以当前时刻评估一轮状态迁移。
    pub fn poll(&mut self, activity: &ConnectionActivity) -> Vec<IdleState> {
        self.poll_at(activity, Utc::now().timestamp_millis())
    }

    fn poll_at(&mut self, activity: &ConnectionActivity, now_ms: i64) -> Vec<IdleState> {
        let mut events = Vec::new();
        let read_elapsed = elapsed(now_ms, activity.last_read_ms());
        let write_elapsed = elapsed(now_ms, activity.last_write_ms());

        if let Some(threshold) = self.thresholds.read {
            if read_elapsed >= threshold {
                if !self.read_reported {
                    self.read_reported = true;
                    events.push(IdleState::ReadIdle);
                }
            } else {
                self.read_reported = false;
            }
        }

        if let Some(threshold) = self.thresholds.write {
            if write_elapsed >= threshold {
                if !self.write_reported {
                    self.write_reported = true;
                    events.push(IdleState::WriteIdle);
                }
            } else {
                self.write_reported = false;
            }
        }

        if let Some(threshold) = self.thresholds.all {
            if read_elapsed >= threshold && write_elapsed >= threshold {
                if !self.all_reported {
                    self.all_reported = true;
                    events.push(IdleState::AllIdle);
                }
            } else {
                self.all_reported = false;
            }
        }

        events
    }
}

fn elapsed(now_ms: i64, stamp_ms: i64) -> Duration {
    Duration::from_millis((now_ms - stamp_ms).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity_at(read_ms: i64, write_ms: i64) -> ConnectionActivity {
        let activity = ConnectionActivity::new();
        activity.stamp_read_at(read_ms);
        activity.stamp_write_at(write_ms);
        activity
    }

    fn thresholds(
        read: Option<u64>,
        write: Option<u64>,
        all: Option<u64>,
    ) -> IdleThresholds {
        IdleThresholds {
            read: read.map(Duration::from_millis),
            write: write.map(Duration::from_millis),
            all: all.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_read_idle_fires_once_and_rearms_after_activity() {
        let mut tracker = IdleTracker::new(thresholds(Some(100), None, None));
        let activity = activity_at(0, 0);

        assert_eq!(tracker.poll_at(&activity, 50), vec![]);
        assert_eq!(tracker.poll_at(&activity, 120), vec![IdleState::ReadIdle]);
        // 同一空闲期内不重复上报
        assert_eq!(tracker.poll_at(&activity, 200), vec![]);

        // 新的入站活动复位计时，门闩重新武装
        activity.stamp_read_at(300);
        assert_eq!(tracker.poll_at(&activity, 350), vec![]);
        assert_eq!(tracker.poll_at(&activity, 450), vec![IdleState::ReadIdle]);
    }

    #[test]
    fn test_read_and_write_idle_are_independent_without_all_idle() {
        let mut tracker = IdleTracker::new(thresholds(Some(100), Some(100), Some(1_000)));
        let activity = activity_at(0, 0);

        // 读写空闲同时成立，但未达到 AllIdle 阈值时不得产生 AllIdle
        let events = tracker.poll_at(&activity, 200);
        assert_eq!(events, vec![IdleState::ReadIdle, IdleState::WriteIdle]);
        assert!(!events.contains(&IdleState::AllIdle));
    }

    #[test]
    fn test_all_idle_requires_both_directions() {
        let mut tracker = IdleTracker::new(thresholds(None, None, Some(100)));
        let activity = activity_at(0, 0);

        // 写方向仍有活动时不触发 AllIdle
        activity.stamp_write_at(150);
        assert_eq!(tracker.poll_at(&activity, 200), vec![]);

        // 两个方向都超过阈值后触发
        assert_eq!(tracker.poll_at(&activity, 300), vec![IdleState::AllIdle]);
    }

    #[test]
    fn test_disabled_categories_never_fire() {
        let mut tracker = IdleTracker::new(IdleThresholds::default());
        let activity = activity_at(0, 0);
        // 默认全部禁用，无论空闲多久都不产生事件
        assert_eq!(tracker.poll_at(&activity, i64::MAX / 2), vec![]);
        assert_eq!(tracker.tick_interval(), None);
    }

    #[test]
    fn test_tick_interval_not_larger_than_smallest_threshold() {
        let tracker = IdleTracker::new(thresholds(Some(1_000), None, Some(300)));
        assert_eq!(tracker.tick_interval(), Some(Duration::from_millis(150)));

        // 阈值极小时取下限，但绝不超过阈值本身
        let tracker = IdleTracker::new(thresholds(Some(6), None, None));
        let tick = tracker.tick_interval().expect("应存在评估周期");
        assert!(tick <= Duration::from_millis(6));
    }
}
