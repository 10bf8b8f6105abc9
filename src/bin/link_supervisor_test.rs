//! 链路状态机功能测试程序
//!
//! 在设备上验证链路状态机的状态转换、重试计数和动作生成

#![no_std]
#![no_main]

extern crate alloc;

use auralink_node::config;
use auralink_node::state_machine::{Action, LinkEvent, LinkState, LinkSupervisor};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_println::println;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("❌ {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let _peripherals = esp_hal::init(hal_config);

    // Initialize heap allocator
    esp_alloc::heap_allocator!(size: 32 * 1024);

    println!("=== 链路状态机功能测试 ===");

    let mut supervisor = LinkSupervisor::default();

    // 测试初始状态
    println!("\n1. 测试初始状态");
    assert_eq!(supervisor.get_current_state(), LinkState::Offline);
    assert!(!supervisor.connection_state().network_joined);
    println!("✅ 初始状态正确: {:?}", supervisor.get_current_state());

    // 测试WiFi加入流程
    println!("\n2. 测试WiFi加入流程");
    supervisor.handle_event(LinkEvent::JoinRequested);
    assert_eq!(supervisor.get_current_state(), LinkState::Joining);
    for _ in 0..config::JOIN_ATTEMPTS - 1 {
        supervisor.handle_event(LinkEvent::JoinAttemptFailed);
    }
    assert_eq!(supervisor.get_current_state(), LinkState::Joining);
    assert_eq!(supervisor.get_retry_count(), config::JOIN_ATTEMPTS - 1);
    println!(
        "✅ {} 次失败后仍在重试: 第 {} 次",
        config::JOIN_ATTEMPTS - 1,
        supervisor.get_retry_count() + 1
    );

    supervisor.handle_event(LinkEvent::NetworkJoined);
    assert_eq!(supervisor.get_current_state(), LinkState::SessionConnecting);
    assert_eq!(supervisor.get_retry_count(), 0);
    println!("✅ WiFi加入事件处理正确: {:?}", supervisor.get_current_state());

    // 测试MQTT会话流程
    println!("\n3. 测试MQTT会话流程");
    for _ in 0..100 {
        supervisor.handle_event(LinkEvent::SessionFailed);
    }
    assert_eq!(supervisor.get_current_state(), LinkState::SessionConnecting);
    println!("✅ 会话失败 100 次后继续重试");

    supervisor.handle_event(LinkEvent::SessionOpened);
    assert_eq!(supervisor.get_current_state(), LinkState::Online);
    assert!(supervisor.update().is_empty());
    assert!(supervisor.connection_state().session_connected);
    println!("✅ 会话建立: {:?}", supervisor.get_current_state());

    // 测试断线处理
    println!("\n4. 测试断线处理");
    supervisor.handle_event(LinkEvent::SessionLost);
    assert_eq!(supervisor.get_current_state(), LinkState::SessionConnecting);
    println!("✅ 会话断开后重连: {:?}", supervisor.get_current_state());

    supervisor.handle_event(LinkEvent::NetworkLost);
    assert_eq!(supervisor.get_current_state(), LinkState::Joining);
    println!("✅ WiFi断开后重新加入: {:?}", supervisor.get_current_state());

    // 测试重启
    println!("\n5. 测试加入失败后重启");
    for _ in 0..config::JOIN_ATTEMPTS {
        supervisor.handle_event(LinkEvent::JoinAttemptFailed);
    }
    assert_eq!(supervisor.get_current_state(), LinkState::Restarting);

    let actions = supervisor.update();
    println!("状态 {:?} 生成的动作:", supervisor.get_current_state());
    for action in &actions {
        match action {
            Action::RestartDevice => println!("  - 整机重启"),
            _ => println!("  - 其他动作: {:?}", action),
        }
    }
    assert!(actions.contains(&Action::RestartDevice));

    println!("\n=== 所有测试通过! ===");

    // 保持程序运行
    let delay = Delay::new();
    loop {
        delay.delay_millis(1000);
    }
}
