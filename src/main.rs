#![no_std]
#![no_main]

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};

// Standard library imports
extern crate alloc;

// WiFi imports
use esp_wifi::wifi;

// Embassy-net imports
use embassy_net::{Config, Stack, StackResources};
use embassy_time::{Duration, Timer};
use esp_hal_embassy::Executor;
use static_cell::StaticCell;

// Import our library modules
use auralink_node::board::{BoardInputs, BoardLeds};
use auralink_node::config;
use auralink_node::dht::Dht22;
use auralink_node::display::{Frame, Screen};
use auralink_node::lcd::Lcd;
use auralink_node::led_control::Indicators;
use auralink_node::link::{
    JoinSettings, LinkHealth, SessionRetry, SessionSettings, check_link, ensure_connected,
    session_attempt_failed,
};
use auralink_node::mqtt::{SessionBuffers, open_session};
use auralink_node::node::Node;
use auralink_node::state_machine::{LinkEvent, LinkSupervisor};
use auralink_node::wifi::WiFiManager;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

type NodeType = Node<
    Dht22<Flex<'static>, Delay>,
    BoardInputs,
    Lcd<I2c<'static, Blocking>, Delay>,
    BoardLeds,
>;

// Static cells for embassy components
static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static SESSION_BUFFERS_CELL: StaticCell<SessionBuffers> = StaticCell::new();

// Static executor for embassy tasks
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    esp_println::println!("[PANIC] {}", info);
    loop {}
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(
    mut runner: embassy_net::Runner<'static, esp_wifi::wifi::WifiDevice<'static>>,
) -> ! {
    runner.run().await
}

/// Link maintenance plus the sensor loop
#[embassy_executor::task]
async fn node_task(
    mut node: NodeType,
    mut wifi_manager: WiFiManager<'static>,
    stack: Stack<'static>,
    buffers: &'static mut SessionBuffers,
) -> ! {
    info!("[NODE] Starting sensor node task");

    node.show(&Frame::boot());
    node.idle(config::BOOT_SCREEN_HOLD).await;

    let mut supervisor = LinkSupervisor::default();
    let join_settings = JoinSettings::from_config();
    let session_settings = SessionSettings::from_config();

    'link: loop {
        match ensure_connected(&mut wifi_manager, &mut supervisor, node.screen_mut(), &join_settings)
            .await
        {
            Ok(connection) => node.set_connection(connection),
            Err(e) => {
                error!("[LINK] {:?}, restarting device", e);
                Timer::after(Duration::from_millis(100)).await;
                esp_hal::system::software_reset();
            }
        }

        loop {
            // The session borrows the buffers, so it is opened right here
            let mut session = loop {
                match open_session(stack, &mut *buffers).await {
                    Ok(session) => break session,
                    Err(e) => {
                        warn!("[MQTT] Session attempt failed: {:?}", e);
                        match session_attempt_failed(
                            &mut wifi_manager,
                            &mut supervisor,
                            node.screen_mut(),
                            &session_settings,
                        ) {
                            SessionRetry::After(delay) => node.idle(delay).await,
                            SessionRetry::Rejoin => {
                                node.set_connection(supervisor.connection_state());
                                continue 'link;
                            }
                        }
                    }
                }
            };

            supervisor.handle_event(LinkEvent::SessionOpened);
            node.set_connection(supervisor.connection_state());

            loop {
                let outcome = node.iterate(&mut session).await;
                node.idle(outcome.cadence()).await;

                match check_link(&mut wifi_manager, &session, &mut supervisor) {
                    LinkHealth::Healthy => {}
                    LinkHealth::Reopen => {
                        node.set_connection(supervisor.connection_state());
                        break;
                    }
                    LinkHealth::Rejoin => {
                        node.set_connection(supervisor.connection_state());
                        continue 'link;
                    }
                }
            }
        }
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);
    info!("[MAIN] AuraLink sensor node {}", auralink_node::VERSION);

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Initialize WiFi driver
    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let net_seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let wifi_init = esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK).unwrap();
    let wifi_init_ref = WIFI_INIT_CELL.init(wifi_init);

    let (wifi_controller, wifi_interfaces) = wifi::new(wifi_init_ref, peripherals.WIFI).unwrap();
    info!("[WIFI] WiFi controller and device created successfully");

    // Create embassy-net stack with DHCP configuration
    static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let stack_resources = STACK_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        wifi_interfaces.sta,
        Config::dhcpv4(Default::default()),
        stack_resources,
        net_seed,
    );
    let wifi_manager = WiFiManager::new(wifi_controller, stack);

    // Display
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .unwrap()
    .with_sda(peripherals.GPIO8)
    .with_scl(peripherals.GPIO9);
    let mut lcd = Lcd::new(i2c, Delay::new(), config::LCD_I2C_ADDRESS);
    if let Err(e) = lcd.init() {
        warn!("[LCD] Init failed: {:?}, continuing without display", e);
    }

    // DHT22 on an open-drain line with pull-up
    let dht_pin = Output::new(
        peripherals.GPIO4,
        Level::High,
        OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    let mut dht_pin = dht_pin.into_flex();
    dht_pin.set_input_enable(true);
    let dht = Dht22::new(dht_pin, Delay::new());

    // Analog and digital inputs
    let mut adc_config = AdcConfig::new();
    let light_analog = adc_config.enable_pin(peripherals.GPIO0, Attenuation::_11dB);
    let nox_analog = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let inputs = BoardInputs::new(
        adc,
        light_analog,
        nox_analog,
        Input::new(peripherals.GPIO2, InputConfig::default()),
        Input::new(peripherals.GPIO3, InputConfig::default().with_pull(Pull::Down)),
    );

    // Status LEDs; GPIO20 is UART0 RX, unused by the USB-serial-jtag console
    let leds = BoardLeds {
        temperature: Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()),
        light: Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
        air_quality: Output::new(peripherals.GPIO7, Level::Low, OutputConfig::default()),
        motion: Output::new(peripherals.GPIO10, Level::Low, OutputConfig::default()),
        urgency: Output::new(peripherals.GPIO20, Level::Low, OutputConfig::default()),
    };

    let node = Node::new(dht, inputs, Screen::new(lcd), leds, Indicators::default());
    let buffers = SESSION_BUFFERS_CELL.init(SessionBuffers::new());

    // Initialize embassy executor and run tasks
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        info!("[MAIN] Spawning network task...");
        if let Err(e) = spawner.spawn(net_task(runner)) {
            error!("[MAIN] Failed to spawn network task: {:?}", e);
        }

        info!("[MAIN] Spawning node task...");
        if let Err(e) = spawner.spawn(node_task(node, wifi_manager, stack, buffers)) {
            error!("[MAIN] Failed to spawn node task: {:?}", e);
        }
    });
}
