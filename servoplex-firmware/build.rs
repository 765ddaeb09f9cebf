//! Build script for servoplex-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates servos.toml at compile time
//! - Generates `servo_config.rs` (timing, pin list, pin hand-over macro)

use std::collections::BTreeSet;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use servoplex_core::{TimingConfig, MAX_CHANNELS};

/// GPIO pins available on the RP2040
const GPIO_COUNT: i64 = 30;

/// One `[[servo]]` entry
struct ServoEntry {
    name: String,
    pin: u8,
}

fn main() {
    setup_linker();
    let (timing, servos) = validate_config();
    generate_config(&timing, &servos);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate servos.toml configuration at compile time
fn validate_config() -> (TimingConfig, Vec<ServoEntry>) {
    println!("cargo:rerun-if-changed=servos.toml");

    let config_path = Path::new("servos.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: servos.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a servos.toml configuration file.         ║\n\
            ║  Please create one in the servoplex-firmware directory.          ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read servos.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in servos.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    let timing = parse_timing(&config, &mut errors);
    let servos = parse_servos(&config, &mut errors);

    if errors.is_empty() {
        if let Err(e) = timing.validate(MAX_CHANNELS) {
            errors.push(format!("[timing] rejected: {:?}", e));
        }
    }

    if !errors.is_empty() {
        report_errors(&errors);
    }

    println!(
        "cargo:warning=servos.toml validated successfully ({} servo(s))",
        servos.len()
    );
    (timing, servos)
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_errors(errors: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: Invalid servos.toml                                      ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Read the `[timing]` section; missing keys keep their defaults
fn parse_timing(config: &toml::Value, errors: &mut Vec<String>) -> TimingConfig {
    let mut timing = TimingConfig::DEFAULT;

    let table = match config.get("timing") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => {
            errors.push("[timing] must be a table".to_string());
            return timing;
        }
        None => return timing,
    };

    let fields: [(&str, &mut u16); 5] = [
        ("min_pulse_us", &mut timing.min_pulse_us),
        ("max_pulse_us", &mut timing.max_pulse_us),
        ("default_pulse_us", &mut timing.default_pulse_us),
        ("frame_period_us", &mut timing.frame_period_us),
        ("delay_adjust_us", &mut timing.delay_adjust_us),
    ];

    for (key, field) in fields {
        match table.get(key) {
            Some(toml::Value::Integer(v)) => match u16::try_from(*v) {
                Ok(v) => *field = v,
                Err(_) => errors.push(format!("[timing] {} must be 0-65535", key)),
            },
            Some(_) => errors.push(format!("[timing] {} must be an integer", key)),
            None => {}
        }
    }

    for key in table.keys() {
        if !matches!(
            key.as_str(),
            "min_pulse_us" | "max_pulse_us" | "default_pulse_us" | "frame_period_us" | "delay_adjust_us"
        ) {
            errors.push(format!("[timing] unknown key '{}'", key));
        }
    }

    timing
}

/// Read the `[[servo]]` entries in channel order
fn parse_servos(config: &toml::Value, errors: &mut Vec<String>) -> Vec<ServoEntry> {
    let entries = match config.get("servo") {
        Some(toml::Value::Array(a)) => a,
        Some(_) => {
            errors.push("[[servo]] must be an array of tables".to_string());
            return Vec::new();
        }
        None => return Vec::new(),
    };

    if entries.len() > MAX_CHANNELS {
        errors.push(format!(
            "{} servos configured, at most {} are supported",
            entries.len(),
            MAX_CHANNELS
        ));
    }

    let mut servos = Vec::new();
    let mut used_pins = BTreeSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let name = match entry.get("name") {
            Some(toml::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => {
                errors.push(format!("[[servo]] #{} name must be a non-empty string", i + 1));
                continue;
            }
            None => {
                errors.push(format!("[[servo]] #{} missing 'name'", i + 1));
                continue;
            }
        };

        let pin = match entry.get("pin") {
            Some(toml::Value::Integer(p)) if (0..GPIO_COUNT).contains(p) => *p as u8,
            Some(_) => {
                errors.push(format!("[[servo]] '{}' pin must be 0-{}", name, GPIO_COUNT - 1));
                continue;
            }
            None => {
                errors.push(format!("[[servo]] '{}' missing 'pin'", name));
                continue;
            }
        };

        if !used_pins.insert(pin) {
            errors.push(format!("[[servo]] '{}' reuses GPIO{}", name, pin));
            continue;
        }

        servos.push(ServoEntry { name, pin });
    }

    servos
}

/// Write `servo_config.rs` into OUT_DIR
fn generate_config(timing: &TimingConfig, servos: &[ServoEntry]) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut out = String::new();

    out.push_str("// Generated by build.rs from servos.toml\n\n");
    out.push_str(&format!(
        "pub const TIMING: servoplex_core::TimingConfig = servoplex_core::TimingConfig {{\n    \
         min_pulse_us: {},\n    \
         max_pulse_us: {},\n    \
         default_pulse_us: {},\n    \
         frame_period_us: {},\n    \
         delay_adjust_us: {},\n\
         }};\n\n",
        timing.min_pulse_us,
        timing.max_pulse_us,
        timing.default_pulse_us,
        timing.frame_period_us,
        timing.delay_adjust_us,
    ));

    let names = servos
        .iter()
        .map(|s| format!("{:?}", s.name))
        .collect::<Vec<_>>()
        .join(", ");
    let pins = servos
        .iter()
        .map(|s| s.pin.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "pub const SERVO_NAMES: [&str; {}] = [{}];\n",
        servos.len(),
        names
    ));
    out.push_str(&format!(
        "pub const SERVO_PINS: [u8; {}] = [{}];\n\n",
        servos.len(),
        pins
    ));

    // take_pin! needs literal pin numbers
    out.push_str("/// Hand every configured servo pin to a `GpioOutputs` bank\n");
    out.push_str("macro_rules! provide_servo_pins {\n    ($p:ident, $outputs:ident) => {{\n");
    for servo in servos {
        out.push_str(&format!(
            "        if let Err(e) = $outputs.provide({pin}, servoplex_hal_rp2040::take_pin!($p, {pin})) {{\n            \
             defmt::warn!(\"GPIO{pin} ({name}) not provided: {{:?}}\", e);\n        \
             }}\n",
            pin = servo.pin,
            name = servo.name,
        ));
    }
    out.push_str("    }};\n}\n");

    let mut f = File::create(out_dir.join("servo_config.rs")).unwrap();
    f.write_all(out.as_bytes()).unwrap();
}
