use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use imulink_frame::codec::round_half_up;
use imulink_frame::{
    DecodeStats, Decoded, InitNotice, Measurement, QuaternionField, Vector3, YawPitchRoll,
};
use serde::Serialize;

const DECODED_SCHEMA_ID: &str = "imulink/cli/v1/decoded";
const STATS_SCHEMA_ID: &str = "imulink/cli/v1/decode-stats";

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
struct DecodedOutput<'a> {
    schema_id: &'a str,
    source: &'a str,
    sequence: u64,
    timestamp: String,
    frame: &'a Decoded,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    schema_id: &'a str,
    source: &'a str,
    discarded: u64,
    #[serde(flatten)]
    stats: &'a DecodeStats,
}

pub fn print_decoded(decoded: &Decoded, source: &str, sequence: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DecodedOutput {
                schema_id: DECODED_SCHEMA_ID,
                source,
                sequence,
                timestamp: now_unix_millis(),
                frame: decoded,
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
                .set_header(vec!["#", "STATUS", "FIELD", "VALUE"]);
            for (field, value) in fields(decoded) {
                table.add_row(vec![
                    sequence.to_string(),
                    status_label(decoded),
                    field.to_string(),
                    value,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let rendered: Vec<String> = fields(decoded)
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            println!("#{sequence} {}", rendered.join(" "));
        }
    }
}

/// Final counters for one decoded stream. JSON output goes to stdout so a
/// capture can be checked by script; the other formats only log them.
pub fn print_stats(stats: &DecodeStats, source: &str, format: OutputFormat) {
    if let OutputFormat::Json = format {
        let out = StatsOutput {
            schema_id: STATS_SCHEMA_ID,
            source,
            discarded: stats.discarded(),
            stats,
        };
        println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

fn status_label(decoded: &Decoded) -> String {
    match decoded {
        Decoded::Measurement(m) => m.status.to_string(),
        Decoded::Init(notice) => format!("init {}", notice.stage.status()),
    }
}

/// Labelled, display-rounded values of a decoded frame, in wire order.
fn fields(decoded: &Decoded) -> Vec<(&'static str, String)> {
    match decoded {
        Decoded::Measurement(m) => measurement_fields(m),
        Decoded::Init(notice) => vec![("init", init_text(notice))],
    }
}

fn measurement_fields(m: &Measurement) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    if let Some(field) = &m.quaternion {
        let q = field.value();
        let label = match field {
            QuaternionField::Float(_) => "quaternion",
            QuaternionField::FixedPoint(_) => "quaternion(fixed)",
            QuaternionField::Conflicting { .. } => "quaternion(conflict)",
        };
        out.push((
            label,
            format!(
                "[w:{} x:{} y:{} z:{}]",
                round3(q.w),
                round3(q.x),
                round3(q.y),
                round3(q.z)
            ),
        ));
    }
    if let Some(v) = &m.euler {
        out.push(("euler", vector(v)));
    }
    if let Some(YawPitchRoll { yaw, pitch, roll }) = &m.yaw_pitch_roll {
        out.push((
            "ypr",
            format!(
                "[yaw:{} pitch:{} roll:{}]",
                round3(*yaw),
                round3(*pitch),
                round3(*roll)
            ),
        ));
    }
    if let Some(v) = &m.real_accel {
        out.push(("real", vector(v)));
    }
    if let Some(v) = &m.world_accel {
        out.push(("world", vector(v)));
    }
    out
}

fn init_text(notice: &InitNotice) -> String {
    format!("\"{notice}\"")
}

fn vector(v: &Vector3) -> String {
    format!("[x:{} y:{} z:{}]", round3(v.x), round3(v.y), round3(v.z))
}

fn round3(value: f32) -> String {
    format!("{:.3}", round_half_up(value, 3))
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}

#[cfg(test)]
mod tests {
    use imulink_frame::{InitStage, Quaternion, StatusMask};

    use super::*;

    fn measurement() -> Measurement {
        Measurement {
            status: StatusMask::new(0x03),
            quaternion: Some(QuaternionField::Float(Quaternion {
                w: 0.99951,
                x: 0.0,
                y: -0.0125,
                z: 0.0305,
            })),
            euler: Some(Vector3 {
                x: 1.2345,
                y: 0.0004,
                z: 3.0,
            }),
            ..Measurement::default()
        }
    }

    #[test]
    fn fields_are_rounded_half_up() {
        let fields = measurement_fields(&measurement());
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "quaternion");
        assert_eq!(fields[0].1, "[w:1.000 x:0.000 y:-0.013 z:0.031]");
        assert_eq!(fields[1], ("euler", "[x:1.235 y:0.000 z:3.000]".to_string()));
    }

    #[test]
    fn negative_values_round_toward_their_magnitude() {
        let m = Measurement {
            status: StatusMask::new(0x02),
            euler: Some(Vector3 {
                x: -0.0123,
                y: -0.0001,
                z: -1.2001,
            }),
            ..Measurement::default()
        };
        assert_eq!(
            measurement_fields(&m),
            vec![("euler", "[x:-0.012 y:-0.000 z:-1.200]".to_string())]
        );
    }

    #[test]
    fn init_notice_fields() {
        let decoded = Decoded::Init(InitNotice::new(InitStage::DmpInit, 7));
        assert_eq!(fields(&decoded), vec![("init", "\"DMP init: 7\"".to_string())]);
        assert_eq!(status_label(&decoded), "init 2");
    }

    #[test]
    fn json_record_nests_frame() {
        let decoded = Decoded::Measurement(measurement());
        let out = DecodedOutput {
            schema_id: DECODED_SCHEMA_ID,
            source: "test",
            sequence: 4,
            timestamp: "0.000".to_string(),
            frame: &decoded,
        };
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["sequence"], 4);
        assert_eq!(value["frame"]["kind"], "measurement");
        assert_eq!(value["frame"]["quaternion"]["encoding"], "float");
        assert!(value["frame"].get("real_accel").is_none());
    }

    #[test]
    fn stats_record_flattens_counters() {
        let stats = DecodeStats {
            frames: 3,
            measurements: 2,
            checksum_mismatches: 1,
            ..DecodeStats::default()
        };
        let out = StatsOutput {
            schema_id: STATS_SCHEMA_ID,
            source: "test",
            discarded: stats.discarded(),
            stats: &stats,
        };
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["frames"], 3);
        assert_eq!(value["discarded"], 1);
    }
}
