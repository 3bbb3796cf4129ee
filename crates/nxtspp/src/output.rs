use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nxtspp_command::codec::{mode, regulation, run_state};
use nxtspp_command::motor::motor_name;
use nxtspp_command::CommandFrame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    motor: &'static str,
    port: u8,
    power: i8,
    mode: Vec<&'static str>,
    regulation: &'static str,
    turn_ratio: i8,
    run_state: &'static str,
    tachometer_limit: u32,
    hex: String,
}

impl FrameOutput {
    fn new(frame: &CommandFrame) -> Self {
        Self {
            motor: motor_name(frame.motor()),
            port: frame.motor(),
            power: frame.power(),
            mode: mode_names(frame.mode()),
            regulation: regulation_name(frame.regulation_mode()),
            turn_ratio: frame.turn_ratio(),
            run_state: run_state_name(frame.run_state()),
            tachometer_limit: frame.tachometer_limit(),
            hex: hex(frame.as_bytes()),
        }
    }
}

#[derive(Serialize)]
struct BytesOutput {
    size: usize,
    hex: String,
    timestamp: String,
}

pub fn print_frames(frames: &[CommandFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<FrameOutput> = frames.iter().map(FrameOutput::new).collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "MOTOR", "POWER", "MODE", "REGULATION", "TURN", "RUN", "TACHO", "BYTES",
                ]);
            for frame in frames {
                let out = FrameOutput::new(frame);
                table.add_row(vec![
                    out.motor.to_string(),
                    out.power.to_string(),
                    out.mode.join("|"),
                    out.regulation.to_string(),
                    out.turn_ratio.to_string(),
                    out.run_state.to_string(),
                    out.tachometer_limit.to_string(),
                    out.hex,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                let out = FrameOutput::new(frame);
                println!(
                    "motor={} power={} mode={} regulation={} turn={} run={} tacho={} bytes={}",
                    out.motor,
                    out.power,
                    out.mode.join("|"),
                    out.regulation,
                    out.turn_ratio,
                    out.run_state,
                    out.tachometer_limit,
                    out.hex
                );
            }
        }
        OutputFormat::Raw => {
            let bytes: Vec<u8> = frames
                .iter()
                .flat_map(|frame| frame.as_bytes().iter().copied())
                .collect();
            print_raw(&bytes);
        }
    }
}

pub fn print_bytes(data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&BytesOutput {
            size: data.len(),
            hex: hex(data),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SIZE", "BYTES"])
                .add_row(vec![data.len().to_string(), hex(data)]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("size={} bytes={}", data.len(), hex(data)),
        OutputFormat::Raw => print_raw(data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn mode_names(bits: u8) -> Vec<&'static str> {
    let mut names = Vec::new();
    if bits & mode::MOTORON != 0 {
        names.push("MOTORON");
    }
    if bits & mode::BRAKE != 0 {
        names.push("BRAKE");
    }
    if bits & mode::REGULATED != 0 {
        names.push("REGULATED");
    }
    names
}

fn regulation_name(value: u8) -> &'static str {
    match value {
        regulation::IDLE => "IDLE",
        regulation::MOTOR_SPEED => "MOTOR_SPEED",
        regulation::MOTOR_SYNC => "MOTOR_SYNC",
        // Speed regulation and sync together.
        _ => "MOTOR_SPEED|MOTOR_SYNC",
    }
}

fn run_state_name(value: u8) -> &'static str {
    match value {
        run_state::IDLE => "IDLE",
        run_state::RAMPUP => "RAMPUP",
        run_state::RUNNING => "RUNNING",
        run_state::RAMPDOWN => "RAMPDOWN",
        _ => "UNKNOWN",
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
