#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use airlog_core::TelemetryPoller;
use airlog_core::sensors::{Htu21d, S8};
use airlog_firmware::hardware::{create_i2c_bus, create_s8_uart};
use airlog_firmware::settings;
use airlog_firmware::thingsboard::ThingsBoardClient;
use airlog_firmware::timed_uart::TimedUart;
use airlog_firmware::wifi::WifiLink;
use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::{error, info};
use static_cell::StaticCell;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

const TCP_RX_BUFFER_LEN: usize = 1024;
const TCP_TX_BUFFER_LEN: usize = 1024;
const MQTT_BUFFER_LEN: usize = 512;

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized");

    let settings = settings::config();

    // Buses
    let i2c = create_i2c_bus(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9)
        .expect("Failed to configure I2C bus");
    let uart = create_s8_uart(peripherals.UART1, peripherals.GPIO18, peripherals.GPIO17)
        .expect("Failed to configure S8 UART");

    // Radio and network stack
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio_init =
        RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(runner).expect("Network task already running"));

    let link = WifiLink::new(wifi_controller, stack, &settings.internet)
        .expect("Failed to configure Wi-Fi");

    static TCP_RX: StaticCell<[u8; TCP_RX_BUFFER_LEN]> = StaticCell::new();
    static TCP_TX: StaticCell<[u8; TCP_TX_BUFFER_LEN]> = StaticCell::new();
    static MQTT_TX: StaticCell<[u8; MQTT_BUFFER_LEN]> = StaticCell::new();
    static MQTT_RX: StaticCell<[u8; MQTT_BUFFER_LEN]> = StaticCell::new();
    let client = ThingsBoardClient::new(
        stack,
        (
            TCP_RX.init([0; TCP_RX_BUFFER_LEN]),
            TCP_TX.init([0; TCP_TX_BUFFER_LEN]),
        ),
        (
            MQTT_TX.init([0; MQTT_BUFFER_LEN]),
            MQTT_RX.init([0; MQTT_BUFFER_LEN]),
        ),
        &settings.cloud,
    );

    info!(
        "Reporting to {}:{} every {} ms",
        settings.cloud.host, settings.cloud.port, settings.sampling.interval_ms
    );

    let mut poller = TelemetryPoller::new(
        Htu21d::new(i2c, Delay),
        S8::new(TimedUart::new(uart)),
        Delay,
        link,
        client,
        settings.sampling,
    );

    let Err(e) = poller.run().await;
    error!("Stopping: {}", e);

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
