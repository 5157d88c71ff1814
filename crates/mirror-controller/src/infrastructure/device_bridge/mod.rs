//! Device bridge adapters.
//!
//! - [`adb::AdbBridge`] drives devices through the `adb` executable.
//! - [`mock::MockDeviceBridge`] records commands in memory and simulates
//!   per-device screen sizes, rejections, hangs, and unreachable devices.
//!
//! Both implement [`DeviceBridge`](crate::application::execute_command::DeviceBridge).

pub mod adb;
pub mod mock;
