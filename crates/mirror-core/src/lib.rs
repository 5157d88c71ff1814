//! # mirror-core
//!
//! Shared library for the multi-device input mirroring controller containing
//! the screen geometry model, the coordinate mapper, the gesture classifier,
//! the device roles, and the input primitives sent to every device.
//!
//! It has zero dependencies on OS APIs, child processes, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! An operator controls one phone (the "master") through a mirroring window on
//! the PC.  Every tap, drag, key press and text entry performed on that window
//! is replayed on a set of other phones (the "slaves"), which may have
//! completely different screen resolutions.
//!
//! This crate (`mirror-core`) is the pure foundation.  It defines:
//!
//! - **`domain`** – Pure geometry and classification logic.  The most
//!   important piece is [`map_point`]: it converts a point in one rectangle
//!   (the mirroring window, or the master's screen) into a point on a device
//!   screen, detecting letterbox bars when the aspect ratios differ.
//!
//! - **`keymap`** – Translation from host keyboard keys to Android key codes.
//!
//! - **`primitive`** – The shell-style commands (`input tap X Y`, …) sent to a
//!   device, including text escaping for the device shell.

pub mod domain;
pub mod keymap;
pub mod primitive;

// Re-export the most-used types at the crate root so callers can write
// `mirror_core::ScreenGeometry` instead of `mirror_core::domain::geometry::ScreenGeometry`.
pub use domain::device::{DeviceEndpoint, DeviceRole, DeviceSet, DeviceSetError, Target};
pub use domain::geometry::{
    GeometryError, GeometryQuery, GeometrySource, GeometryStrategy, ScreenGeometry, STRATEGIES,
};
pub use domain::gesture::{Gesture, GestureClassifier};
pub use domain::mapping::{
    map_point, map_point_stretched, map_point_with, visible_rect, MappingMode, Point, Rect,
};
pub use keymap::{android::AndroidKeyCode, HostKey, KeyMapper, KeyMapping};
pub use primitive::{BridgeCommand, InputPrimitive, TimeoutClass, SCREENSHOT_DEVICE_PATH};
