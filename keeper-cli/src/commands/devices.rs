//! Simulated device scan.

use anyhow::Result;
use keeper_client::scan_devices;
use keeper_core::{detect_platform, protocol_banner};
use keeper_types::Platform;

/// Pick the platform from an explicit flag, else from a user agent hint.
pub fn resolve_platform(platform: Option<Platform>, user_agent: Option<&str>) -> Platform {
    platform
        .or_else(|| user_agent.map(detect_platform))
        .unwrap_or_default()
}

/// Run the devices command.
pub async fn run(platform: Platform) -> Result<()> {
    println!("Scanning for nearby {} devices...", platform);
    let devices = scan_devices(platform).await;

    if devices.is_empty() {
        println!("No devices found.");
        println!();
        println!("Pass --platform ios|android to choose a device family.");
        return Ok(());
    }

    for (i, name) in devices.iter().enumerate() {
        println!("  [{}] {}", i + 1, name);
    }
    println!();
    println!("{}", protocol_banner(platform));
    Ok(())
}
