//! Domain entities for the input mirroring controller.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of a Clean Architecture codebase is the **domain**.
//! Domain code has no imports from OS APIs, process spawning, or UI
//! frameworks, so it can be compiled and tested anywhere.  Here the domain is
//! the geometry of device screens, the transform between rectangles, and the
//! rules that turn press/release samples into taps and drags.
//!
//! Code in outer layers (application, infrastructure) depends on the domain,
//! but the domain never depends on them.

/// Device identities and their fixed master/slave roles.
pub mod device;

/// Screen geometry and the parsers that recover it from device output.
pub mod geometry;

/// Tap/drag classification from press and release samples.
pub mod gesture;

/// Rectangle-to-screen coordinate transforms with letterbox detection.
pub mod mapping;
