//! 链路状态机模块
//!
//! 管理传感器节点的网络链路：WiFi 加入、MQTT 会话建立与重连、加入失败后的整机重启

use crate::link::ConnectionState;
use log::{info, warn};

/// 链路状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    // 初始状态
    Offline,

    // WiFi 加入中
    Joining,

    // 已加入网络，等待 MQTT 会话
    SessionConnecting,

    // 正常运行
    Online,

    // 加入失败，等待整机重启
    Restarting,
}

/// 链路事件枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    // 开始加入网络
    JoinRequested,

    // WiFi 事件
    NetworkJoined,
    JoinAttemptFailed,
    NetworkLost,

    // MQTT 会话事件
    SessionOpened,
    SessionFailed,
    SessionLost,
}

/// 状态转换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// 保持当前状态
    Stay,
    /// 转换到新状态
    Transition(LinkState),
    /// 转换到新状态并重置重试计数
    TransitionWithReset(LinkState),
}

/// 状态机需要执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// 显示 WiFi 加入进度
    ShowJoinProgress { attempt: u32, max_attempts: u32 },
    /// 检查 WiFi 状态
    PollNetwork,
    /// 显示 MQTT 重连进度
    ShowSessionRetry { attempt: u32 },
    /// 建立 MQTT 会话
    OpenSession,
    /// 整机重启
    RestartDevice,
    /// 记录错误
    LogError(LinkState),
}

/// 链路状态机
pub struct LinkSupervisor {
    current_state: LinkState,
    previous_state: Option<LinkState>,
    retry_count: u32,
    max_join_attempts: u32,
}

impl LinkSupervisor {
    /// 创建新的状态机实例
    pub fn new(max_join_attempts: u32) -> Self {
        Self {
            current_state: LinkState::Offline,
            previous_state: None,
            retry_count: 0,
            max_join_attempts,
        }
    }

    /// 获取当前状态
    pub fn get_current_state(&self) -> LinkState {
        self.current_state
    }

    /// 获取上一个状态
    pub fn get_previous_state(&self) -> Option<LinkState> {
        self.previous_state
    }

    /// 获取重试次数
    pub fn get_retry_count(&self) -> u32 {
        self.retry_count
    }

    /// 当前连接状态
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState {
            network_joined: matches!(
                self.current_state,
                LinkState::SessionConnecting | LinkState::Online
            ),
            session_connected: self.current_state == LinkState::Online,
        }
    }

    /// 处理链路事件
    pub fn handle_event(&mut self, event: LinkEvent) -> StateTransition {
        // 失败事件先计数，转换规则据此判断是否放弃
        if matches!(event, LinkEvent::JoinAttemptFailed | LinkEvent::SessionFailed) {
            self.retry_count += 1;
        }

        let transition = self.get_state_transition(self.current_state, event);

        match transition {
            StateTransition::Transition(new_state) => {
                self.transition_to_state(new_state);
            }
            StateTransition::TransitionWithReset(new_state) => {
                self.retry_count = 0;
                self.transition_to_state(new_state);
            }
            StateTransition::Stay => {}
        }

        transition
    }

    /// 状态机更新，返回需要执行的动作
    pub fn update(&self) -> alloc::vec::Vec<Action> {
        let mut actions = alloc::vec::Vec::new();

        match self.current_state {
            LinkState::Offline => {}

            LinkState::Joining => {
                actions.push(Action::ShowJoinProgress {
                    attempt: self.retry_count + 1,
                    max_attempts: self.max_join_attempts,
                });
                actions.push(Action::PollNetwork);
            }

            LinkState::SessionConnecting => {
                if self.retry_count > 0 {
                    actions.push(Action::ShowSessionRetry {
                        attempt: self.retry_count,
                    });
                }
                actions.push(Action::OpenSession);
            }

            // 运行中由主循环检查链路
            LinkState::Online => {}

            LinkState::Restarting => {
                actions.push(Action::LogError(self.current_state));
                actions.push(Action::RestartDevice);
            }
        }

        actions
    }

    /// 内部状态转换逻辑
    fn transition_to_state(&mut self, new_state: LinkState) {
        if new_state != self.current_state {
            match new_state {
                LinkState::Online => info!("[LINK] Online"),
                LinkState::Restarting => warn!("[LINK] Join attempts exhausted, restarting"),
                _ => info!("[LINK] {:?} -> {:?}", self.current_state, new_state),
            }

            self.previous_state = Some(self.current_state);
            self.current_state = new_state;
        }
    }

    /// 获取状态转换规则
    fn get_state_transition(&self, current_state: LinkState, event: LinkEvent) -> StateTransition {
        match (current_state, event) {
            // 重启是终态
            (LinkState::Restarting, _) => StateTransition::Stay,

            // 加入流程
            (LinkState::Offline, LinkEvent::JoinRequested) => {
                StateTransition::TransitionWithReset(LinkState::Joining)
            }
            (LinkState::Joining, LinkEvent::NetworkJoined) => {
                StateTransition::TransitionWithReset(LinkState::SessionConnecting)
            }
            (LinkState::Joining, LinkEvent::JoinAttemptFailed) => {
                if self.retry_count < self.max_join_attempts {
                    StateTransition::Stay // 继续重试
                } else {
                    StateTransition::Transition(LinkState::Restarting)
                }
            }

            // 会话流程，无限重试
            (LinkState::SessionConnecting, LinkEvent::SessionOpened) => {
                StateTransition::TransitionWithReset(LinkState::Online)
            }
            (LinkState::SessionConnecting, LinkEvent::SessionFailed) => StateTransition::Stay,
            (LinkState::Online, LinkEvent::SessionLost) => {
                StateTransition::TransitionWithReset(LinkState::SessionConnecting)
            }

            // WiFi 断开，回到加入步骤
            (LinkState::SessionConnecting | LinkState::Online, LinkEvent::NetworkLost) => {
                StateTransition::TransitionWithReset(LinkState::Joining)
            }

            // 默认情况：保持当前状态
            _ => StateTransition::Stay,
        }
    }

}

impl Default for LinkSupervisor {
    fn default() -> Self {
        Self::new(crate::config::JOIN_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online() -> LinkSupervisor {
        let mut supervisor = LinkSupervisor::new(3);
        supervisor.handle_event(LinkEvent::JoinRequested);
        supervisor.handle_event(LinkEvent::NetworkJoined);
        supervisor.handle_event(LinkEvent::SessionOpened);
        supervisor
    }

    #[test]
    fn happy_path_reaches_online() {
        let supervisor = online();
        assert_eq!(supervisor.get_current_state(), LinkState::Online);
        assert_eq!(
            supervisor.get_previous_state(),
            Some(LinkState::SessionConnecting)
        );
        assert_eq!(
            supervisor.connection_state(),
            ConnectionState {
                network_joined: true,
                session_connected: true
            }
        );
        assert!(supervisor.update().is_empty());
    }

    #[test]
    fn join_gives_up_after_max_attempts() {
        let mut supervisor = LinkSupervisor::new(3);
        supervisor.handle_event(LinkEvent::JoinRequested);
        assert_eq!(
            supervisor.update()[0],
            Action::ShowJoinProgress {
                attempt: 1,
                max_attempts: 3
            }
        );

        assert_eq!(
            supervisor.handle_event(LinkEvent::JoinAttemptFailed),
            StateTransition::Stay
        );
        assert_eq!(
            supervisor.handle_event(LinkEvent::JoinAttemptFailed),
            StateTransition::Stay
        );
        assert_eq!(supervisor.get_retry_count(), 2);
        assert_eq!(
            supervisor.handle_event(LinkEvent::JoinAttemptFailed),
            StateTransition::Transition(LinkState::Restarting)
        );
        assert!(supervisor.update().contains(&Action::RestartDevice));

        // terminal
        supervisor.handle_event(LinkEvent::NetworkJoined);
        assert_eq!(supervisor.get_current_state(), LinkState::Restarting);
    }

    #[test]
    fn session_retries_without_limit() {
        let mut supervisor = LinkSupervisor::new(3);
        supervisor.handle_event(LinkEvent::JoinRequested);
        supervisor.handle_event(LinkEvent::NetworkJoined);
        assert_eq!(supervisor.update(), vec![Action::OpenSession]);

        for _ in 0..50 {
            assert_eq!(
                supervisor.handle_event(LinkEvent::SessionFailed),
                StateTransition::Stay
            );
        }
        assert_eq!(supervisor.get_current_state(), LinkState::SessionConnecting);
        assert_eq!(
            supervisor.update(),
            vec![Action::ShowSessionRetry { attempt: 50 }, Action::OpenSession]
        );
        assert!(!supervisor.connection_state().session_connected);
        assert!(supervisor.connection_state().network_joined);
    }

    #[test]
    fn session_loss_reconnects_and_network_loss_rejoins() {
        let mut supervisor = online();
        supervisor.handle_event(LinkEvent::SessionLost);
        assert_eq!(supervisor.get_current_state(), LinkState::SessionConnecting);
        assert_eq!(supervisor.get_retry_count(), 0);

        supervisor.handle_event(LinkEvent::SessionFailed);
        supervisor.handle_event(LinkEvent::NetworkLost);
        assert_eq!(supervisor.get_current_state(), LinkState::Joining);
        assert_eq!(supervisor.get_retry_count(), 0);
        assert_eq!(supervisor.connection_state(), ConnectionState::default());
    }
}
