/// Custom uniffi-bindgen binary for generating language bindings.
///
/// This binary uses the UniFFI bindgen API to generate Kotlin/Swift
/// bindings from the compiled powersync-native-uniffi cdylib.
///
/// Usage:
///   cargo run -p powersync-native-uniffi --bin powersync-native-uniffi-bindgen --features cli -- \
///     generate --library -l kotlin -o bindings/kotlin \
///     target/release/libpowersync_native_uniffi.so
fn main() {
    uniffi::uniffi_bindgen_main();
}
