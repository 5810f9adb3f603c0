use env_logger::Env;

/// Initialize global logger using `env_logger`.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If unset, `default_level` is used.
pub fn init_with_level(default_level: &str) {
    let env = Env::default().default_filter_or(default_level);
    // Ignore errors if the logger was already initialized
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .format_module_path(false)
        .try_init();
}

/// Initialize global logger with `info` as the default level.
pub fn init() {
    init_with_level("info");
}
