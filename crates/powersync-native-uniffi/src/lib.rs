//! UniFFI bindings for powersync-native.
//!
//! This crate is the plugin boundary for mobile hosts: Kotlin (Android) and
//! Swift (iOS) call [`register_core`] before opening their first database and
//! forward the integer to their own caller, typically as
//! `{"responseCode": <code>}`.
//!
//! # Usage
//!
//! Generate bindings using `--library` mode:
//!
//! ```bash
//! # Build the cdylib
//! cargo build -p powersync-native-uniffi --release
//!
//! # Generate Kotlin bindings
//! powersync-native-uniffi-bindgen generate --library --language kotlin \
//!     --out-dir ./bindings/kotlin target/release/libpowersync_native_uniffi.so
//!
//! # Generate Swift bindings
//! powersync-native-uniffi-bindgen generate --library --language swift \
//!     --out-dir ./bindings/swift target/release/libpowersync_native_uniffi.dylib
//! ```

// UniFFI scaffolding expands to `extern "C"` shims; this crate is an FFI boundary.
#![allow(unsafe_code)]

// UniFFI scaffolding - generates the FFI glue code
uniffi::setup_scaffolding!();

#[cfg(feature = "bindings")]
mod bindings;

#[cfg(feature = "bindings")]
pub use bindings::*;
