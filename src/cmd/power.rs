use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use powerflow_power::{Operation, PowerErrorKind, PowerParam};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;

/// Target host and driver for a single power operation
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// System identifier of the target host
    #[arg(long)]
    pub system_id: String,

    /// BMC driver type (ipmi, redfish, virsh, lxd, ...)
    #[arg(long, visible_alias = "power-type")]
    pub driver: String,

    /// Driver option, repeatable (e.g. -o power_address=10.0.0.5)
    #[arg(short = 'o', long = "opt", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub opts: Vec<(String, Value)>,

    /// Task queue the request came from (logged only)
    #[arg(long)]
    pub queue: Option<String>,
}

impl TargetArgs {
    pub fn into_param(self, action: Operation) -> PowerParam {
        let param = PowerParam::new(self.system_id, action, self.driver)
            .with_driver_opts(self.opts.into_iter().collect());
        match self.queue {
            Some(queue) => param.with_queue(queue),
            None => param,
        }
    }
}

/// Run a request described by a JSON document
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the JSON request, or `-` for stdin
    #[arg(long, short = 'r', value_name = "FILE")]
    pub request: PathBuf,
}

impl RunArgs {
    pub fn load(&self) -> Result<PowerParam> {
        let contents = if self.request.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("Failed to read request from stdin")?;
            buf
        } else {
            std::fs::read_to_string(&self.request).wrap_err_with(|| {
                format!("Failed to read request file {}", self.request.display())
            })?
        };

        Ok(PowerParam::from_json(&contents)?)
    }
}

/// Parse `key=value`, keeping numbers and booleans typed when they round-trip exactly
pub fn parse_option(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty option name in '{}'", raw));
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) if v.to_string() == value => v,
        Ok(v @ Value::String(_)) => v,
        _ => Value::String(value.to_string()),
    };

    Ok((key.to_string(), value))
}

/// Process exit code for a failed power operation
pub fn exit_code(kind: PowerErrorKind) -> i32 {
    match kind {
        PowerErrorKind::Resolution => 2,
        PowerErrorKind::Execution => 3,
        PowerErrorKind::WrongPowerState => 4,
        PowerErrorKind::InvalidRequest => 1,
    }
}
