//! Application layer use cases for the mirroring controller.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure geometry and classification rules in `mirror_core`) and the
//! infrastructure (child processes, window queries, files).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil an operator goal (e.g., "tap
//!   the same spot on every phone, whatever its resolution").
//! - **Depend on abstractions** such as [`execute_command::DeviceBridge`]
//!   rather than on `adb` directly, so tests can run without devices.
//!
//! # Sub-modules
//!
//! - **`resolve_geometry`** – Per-device screen size cache with a fallback
//!   chain of bridge queries.
//!
//! - **`execute_command`** – Runs one input primitive on one device under a
//!   deadline, or the same primitive on many devices concurrently.
//!
//! - **`dispatch_action`** – Fans a tap, drag, key or text action out to the
//!   master and every slave, remapping coordinates per slave.
//!
//! - **`mirror_input`** – The input loop: raw pointer and key events on the
//!   mirroring window become actions.  This runs on every click.
//!
//! - **`inspect_devices`** – Model, brand, Android version, serial and
//!   geometry per device.
//!
//! - **`session`** – Start-up, steady state and bounded shutdown of an
//!   interactive mirroring session.
//!
//! - **`stop_signal`** – The shared cancellation signal.

pub mod dispatch_action;
pub mod execute_command;
pub mod inspect_devices;
pub mod mirror_input;
pub mod resolve_geometry;
pub mod session;
pub mod stop_signal;
