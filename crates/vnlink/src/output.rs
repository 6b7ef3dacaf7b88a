use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use vnlink_session::{Measurement, StatsSnapshot};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct MeasurementOutput<'a> {
    index: usize,
    protocol: &'a str,
    fields: Value,
}

/// Present fields of a decoded frame as `(group, field, value)`.
fn field_rows(measurement: &Measurement) -> Vec<(String, String, String)> {
    let Ok(Value::Object(groups)) = serde_json::to_value(&measurement.data) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for (group, fields) in groups {
        let Value::Object(fields) = fields else {
            continue;
        };
        for (field, value) in fields {
            rows.push((group.clone(), field, value.to_string()));
        }
    }
    rows
}

fn present_fields(measurement: &Measurement) -> Value {
    match serde_json::to_value(&measurement.data) {
        Ok(Value::Object(mut groups)) => {
            groups.retain(|_, fields| !matches!(fields, Value::Object(f) if f.is_empty()));
            Value::Object(groups)
        }
        Ok(other) => other,
        Err(_) => Value::Null,
    }
}

fn protocol_name(measurement: &Measurement) -> &'static str {
    match measurement.protocol {
        vnlink_session::Protocol::Ascii => "ascii",
        vnlink_session::Protocol::Binary => "binary",
    }
}

pub fn print_measurement(index: usize, measurement: &Measurement, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MeasurementOutput {
                index,
                protocol: protocol_name(measurement),
                fields: present_fields(measurement),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "PROTOCOL", "GROUP", "FIELD", "VALUE"]);
            for (group, field, value) in field_rows(measurement) {
                table.add_row(vec![
                    index.to_string(),
                    protocol_name(measurement).to_string(),
                    group,
                    field,
                    value,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = field_rows(measurement)
                .into_iter()
                .map(|(group, field, value)| format!("{group}.{field}={value}"))
                .collect();
            println!(
                "#{index} {} {}",
                protocol_name(measurement),
                fields.join(" ")
            );
        }
    }
}

pub fn print_stats(stats: &StatsSnapshot, decoded: usize, format: OutputFormat) {
    #[derive(Serialize)]
    struct StatsOutput<'a> {
        decoded: usize,
        #[serde(flatten)]
        stats: &'a StatsSnapshot,
    }

    match format {
        OutputFormat::Json => {
            let out = StatsOutput { decoded, stats };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PROTOCOL", "VALID", "INVALID"])
                .add_row(vec![
                    "ascii".to_string(),
                    stats.ascii_valid.to_string(),
                    stats.ascii_invalid.to_string(),
                ])
                .add_row(vec![
                    "fa".to_string(),
                    stats.fa_valid.to_string(),
                    stats.fa_invalid.to_string(),
                ])
                .add_row(vec![
                    "fb".to_string(),
                    stats.fb_valid.to_string(),
                    stats.fb_invalid.to_string(),
                ]);
            println!("{table}");
            println!(
                "received={} skipped={} decoded={decoded}",
                stats.received_bytes, stats.skipped_bytes
            );
        }
        OutputFormat::Pretty => {
            println!(
                "received={} skipped={} decoded={decoded} ascii={}/{} fa={}/{} fb={}/{}",
                stats.received_bytes,
                stats.skipped_bytes,
                stats.ascii_valid,
                stats.ascii_invalid,
                stats.fa_valid,
                stats.fa_invalid,
                stats.fb_valid,
                stats.fb_invalid
            );
        }
    }
}

pub fn print_command(body: &str, frame: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "body": body, "frame": frame });
            println!("{out}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["BODY", "FRAME"])
                .add_row(vec![body.to_string(), frame.escape_default().to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            print!("{frame}");
        }
    }
}
