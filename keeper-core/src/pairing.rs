//! Simulated pairing catalog.
//!
//! Device discovery is mocked: each platform has a fixed list of nearby
//! devices and the handshake is a fixed delay. Nothing here talks to a radio.

use std::time::Duration;

use keeper_types::Platform;

/// How long the simulated device scan takes.
pub const SCAN_DELAY: Duration = Duration::from_millis(2000);

/// How long the simulated pairing handshake takes.
pub const HANDSHAKE_DELAY: Duration = Duration::from_millis(1500);

const IOS_DEVICES: &[&str] = &[
    "iPhone 15 Pro",
    "iPhone 14 Plus",
    "iPhone SE (3rd Gen)",
    "iPhone 13 mini",
];

const ANDROID_DEVICES: &[&str] = &[
    "Samsung Galaxy S24",
    "Google Pixel 8 Pro",
    "OnePlus 11",
    "Nothing Phone (2)",
];

/// Devices a scan on `platform` will "find".
pub fn discoverable_devices(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Ios => IOS_DEVICES,
        Platform::Android => ANDROID_DEVICES,
        Platform::Unknown => &[],
    }
}

/// Guess the platform from a user agent string.
///
/// Only used as a hint for the pairing prompt.
pub fn detect_platform(user_agent: &str) -> Platform {
    if ["iPad", "iPhone", "iPod"]
        .iter()
        .any(|needle| user_agent.contains(needle))
    {
        return Platform::Ios;
    }
    if user_agent.to_ascii_lowercase().contains("android") {
        return Platform::Android;
    }
    Platform::Unknown
}

/// Status line describing the simulated sync protocol for a platform.
pub fn protocol_banner(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => {
            "Running iOS Protocols: Syncing via WatchConnectivity Framework. \
             Apple Watch location stream active."
        }
        Platform::Android => {
            "Running Android Protocols: Syncing via Google Play Services Data Layer. \
             Wear OS location stream active."
        }
        Platform::Unknown => "Waiting for device selection...",
    }
}
