use std::f32::consts::{PI, TAU};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use imulink_frame::{
    encode_line, FieldGroup, InitNotice, InitStage, Measurement, Quaternion, QuaternionField,
    StatusMask, Vector3, YawPitchRoll,
};
use tracing::{debug, info};

use crate::cmd::SimulateArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

/// Rotation per sample, in radians.
const STEP: f32 = 0.05;

/// The notices a healthy board sends before its first sample.
const START_SEQUENCE: [(InitStage, u8); 4] = [
    (InitStage::MpuInit, 0),
    (InitStage::MpuConnection, 1),
    (InitStage::DmpInit, 0),
    (InitStage::DmpInterruptStatus, 0),
];

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let sink: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|err| io_error(&format!("create {} failed", path.display()), err))?;
            Box::new(file)
        }
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    let status = StatusMask::new(args.status);
    let interval = Duration::from_millis(args.interval_ms);
    let mut line = BytesMut::new();

    if args.init {
        for (stage, code) in START_SEQUENCE {
            let mut payload = BytesMut::with_capacity(2);
            InitNotice::new(stage, code).encode_payload(&mut payload);
            emit(&mut out, &mut line, &payload, interval)?;
        }
    }

    for index in 0..args.count {
        let mut payload = BytesMut::new();
        sample(index, status).encode_payload(&mut payload);
        debug!(index, len = payload.len(), "simulated frame");
        emit(&mut out, &mut line, &payload, interval)?;
    }

    out.flush().map_err(|err| io_error("flush failed", err))?;
    info!(count = args.count, %status, "simulation complete");
    Ok(SUCCESS)
}

fn emit(
    out: &mut impl Write,
    line: &mut BytesMut,
    payload: &[u8],
    interval: Duration,
) -> CliResult<()> {
    line.clear();
    encode_line(payload, line).map_err(|err| frame_error("encode failed", err))?;
    out.write_all(&line[..])
        .map_err(|err| io_error("write failed", err))?;
    if !interval.is_zero() {
        out.flush().map_err(|err| io_error("flush failed", err))?;
        thread::sleep(interval);
    }
    Ok(())
}

/// A board spinning slowly about its z axis. Only the groups in `status`
/// are populated.
pub fn sample(index: u64, status: StatusMask) -> Measurement {
    let angle = (index as f32 * STEP) % TAU;
    let heading = quantize(if angle > PI { angle - TAU } else { angle });
    let q = Quaternion {
        w: quantize((angle / 2.0).cos()),
        x: 0.0,
        y: 0.0,
        z: quantize((angle / 2.0).sin()),
    };

    let quaternion = match (
        status.contains(FieldGroup::Quaternion),
        status.contains(FieldGroup::Buffer),
    ) {
        (true, true) => Some(QuaternionField::Conflicting {
            float: q,
            fixed_point: q,
        }),
        (true, false) => Some(QuaternionField::Float(q)),
        (false, true) => Some(QuaternionField::FixedPoint(q)),
        (false, false) => None,
    };

    let mut m = Measurement {
        status,
        quaternion,
        ..Measurement::default()
    };
    for group in status.groups() {
        match group {
            FieldGroup::Euler => {
                m.euler = Some(Vector3 {
                    x: heading,
                    y: 0.0,
                    z: 0.0,
                })
            }
            FieldGroup::YawPitchRoll => {
                m.yaw_pitch_roll = Some(YawPitchRoll {
                    yaw: heading,
                    pitch: 0.0,
                    roll: 0.0,
                })
            }
            FieldGroup::RealAccel => {
                m.real_accel = Some(Vector3 {
                    x: quantize(0.5 * angle.sin()),
                    y: quantize(0.5 * angle.cos()),
                    z: 0.0,
                })
            }
            FieldGroup::WorldAccel => {
                m.world_accel = Some(Vector3 {
                    x: 0.0,
                    y: 0.0,
                    z: 1.0,
                })
            }
            FieldGroup::Quaternion | FieldGroup::Buffer => {}
        }
    }
    m
}

/// Snap to a 1/1024 grid, which the 2.14 fixed-point encoding represents
/// exactly.
fn quantize(value: f32) -> f32 {
    (value * 1024.0).round() / 1024.0
}
