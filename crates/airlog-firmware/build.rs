//! Bakes the network credentials and telemetry endpoint into the binary.
//!
//! Values come from the build environment, or from a `.env` file next to this
//! crate (see `.env.example`).

const REQUIRED: [&str; 3] = ["WIFI_SSID", "WIFI_PASSWORD", "TB_ACCESS_TOKEN"];
const OPTIONAL: [&str; 3] = ["TB_HOST", "TB_PORT", "AIRLOG_INTERVAL_MS"];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // A missing .env is fine when the variables are exported instead.
    let _ = dotenvy::dotenv();

    for key in REQUIRED.iter().chain(OPTIONAL.iter()) {
        println!("cargo:rerun-if-env-changed={key}");
        match std::env::var(key) {
            Ok(value) => println!("cargo:rustc-env={key}={value}"),
            Err(_) if REQUIRED.contains(key) => {
                panic!("{key} must be set in the environment or in .env")
            }
            Err(_) => {}
        }
    }
}
