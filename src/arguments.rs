/// Centralized argument handling for coinwatch
///
/// Consolidates all command-line argument parsing and debug flag checking so
/// the rest of the code never touches `std::env::args` directly.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checking functions for all modules
/// - Value flags (--data-dir, --config, --port)
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// FLAG CHECKING FUNCTIONS
// =============================================================================

/// Help requested via -h / --help
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Quiet mode: only warnings and errors are printed
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// Debug logging for every module
pub fn is_debug_all_enabled() -> bool {
    has_arg("--debug-all")
}

/// Web server port override (--port <n>)
pub fn get_port_override() -> Option<u16> {
    get_arg_value("--port").and_then(|v| v.parse().ok())
}

/// Configuration file override (--config <path>)
pub fn get_config_override() -> Option<String> {
    get_arg_value("--config")
}

/// Print usage information
pub fn print_help() {
    println!("coinwatch - cryptocurrency price tracker backend");
    println!();
    println!("USAGE:");
    println!("  coinwatch [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("  -h, --help            Show this help");
    println!("  --quiet               Only print warnings and errors");
    println!("  --debug-all           Enable debug logging for every module");
    println!("  --debug-<module>      Enable debug logging for one module");
    println!("                        (api, store, tracker, monitor, web, config, system)");
    println!("  --data-dir <path>     Override the data directory");
    println!("  --config <path>       Override the configuration file path");
    println!("  --port <n>            Override the web server port");
}
