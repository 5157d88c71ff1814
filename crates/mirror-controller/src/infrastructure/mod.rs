//! Infrastructure layer for the mirroring controller.
//!
//! Contains OS-facing adapters: the `adb` device bridge, the scrcpy display
//! process, mirroring-window lookup, input event sources, and configuration
//! file storage.  Every adapter module carries a `mock` sibling for tests.
//!
//! **Dependency rule**: this layer implements traits declared by
//! `application` and uses `mirror_core` types.  Use cases only name its
//! trait seams and plain event types.

pub mod device_bridge;
pub mod display;
pub mod input_capture;
pub mod storage;
pub mod surface;
