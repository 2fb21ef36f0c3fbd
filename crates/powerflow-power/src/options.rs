//! Driver option filtering and CLI flag formatting
//!
//! Power parameters stored alongside a machine carry bookkeeping fields the
//! power CLI does not understand and will reject. They are dropped here
//! before the remaining options are turned into `--flag=value` arguments.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::DriverOptions;

/// Options that are never passed to the power CLI
pub const IGNORED_POWER_OPTIONS: &[&str] = &["power_id", "system_id", "boot_mode", "power_off_mode"];

/// Driver types whose CLI does not take a MAC address argument
pub const IGNORED_MAC_DRIVER_TYPES: &[&str] = &["lxd", "virsh"];

const MAC_ADDRESS_OPTION: &str = "mac_address";

/// Check whether an option must be kept off the command line for a driver
pub fn should_ignore_option(driver: &str, key: &str) -> bool {
    if IGNORED_POWER_OPTIONS.contains(&key) {
        return true;
    }

    key == MAC_ADDRESS_OPTION && IGNORED_MAC_DRIVER_TYPES.contains(&driver)
}

/// Drop the options the power CLI must not see
pub fn filter_options<'a>(driver: &str, opts: &'a DriverOptions) -> HashMap<&'a str, &'a Value> {
    opts.iter()
        .filter(|(key, _)| !should_ignore_option(driver, key))
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

/// Flag name for an option key (`power_address` -> `power-address`)
pub fn flag_name(key: &str) -> String {
    key.replace('_', "-")
}

/// Textual value for an option, or `None` if the option should be omitted
///
/// Strings lose embedded newlines and surrounding whitespace. Empty strings
/// and nulls are treated as absent.
pub fn flag_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let cleaned = s.replace('\n', "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Format a single option as `--<flag-name>=<value>`
pub fn format_flag(key: &str, value: &Value) -> Option<String> {
    flag_value(value).map(|v| format!("--{}={}", flag_name(key), v))
}

/// Build the CLI flags for a driver from its raw options
///
/// Flag order follows map iteration order and is not stable between runs.
pub fn format_options(driver: &str, opts: &DriverOptions) -> Vec<String> {
    filter_options(driver, opts)
        .into_iter()
        .filter_map(|(key, value)| format_flag(key, value))
        .collect()
}
