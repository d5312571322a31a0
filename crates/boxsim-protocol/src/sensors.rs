//! Sensor payload codec.
//!
//! ```text
//! channel_count:int
//! per channel: name:string  tag:int
//!   tag 0 (samples):    rows:int  width:int  rows*width doubles
//!   tag 1 (collisions): count:int, per record name_a:string name_b:string
//!                       point_x point_y impulse_x impulse_y
//! ```

use boxsim_core::types::{Channel, Collision, SensorReadings};
use nalgebra::Vector2;

use crate::error::ProtocolError;
use crate::message::{PayloadReader, PayloadWriter};

const TAG_SAMPLES: i32 = 0;
const TAG_COLLISIONS: i32 = 1;

/// Decode a Sensor-kind body.
pub fn decode_readings(body: &[u8]) -> Result<SensorReadings, ProtocolError> {
    let mut r = PayloadReader::new(body);
    let mut readings = SensorReadings::new();

    let channels = r.read_count()?;
    for _ in 0..channels {
        let name = r.read_string()?;
        let channel = match r.read_int()? {
            TAG_SAMPLES => read_samples(&mut r, &name)?,
            TAG_COLLISIONS => read_collisions(&mut r)?,
            tag => {
                return Err(ProtocolError::malformed(format!(
                    "channel {name} has unknown tag {tag}"
                )));
            }
        };
        if readings.get(&name).is_some() {
            return Err(ProtocolError::malformed(format!("duplicate channel {name}")));
        }
        readings.insert(name, channel);
    }
    r.finish()?;
    Ok(readings)
}

fn read_samples(r: &mut PayloadReader<'_>, name: &str) -> Result<Channel, ProtocolError> {
    let rows = r.read_count()?;
    let width = r.read_count()?;
    let n = rows.checked_mul(width).filter(|n| *n <= r.remaining() / 8).ok_or_else(|| {
        ProtocolError::malformed(format!(
            "channel {name}: {rows}x{width} samples overrun the payload"
        ))
    })?;
    let data = r.read_doubles(n)?;
    Ok(Channel::Samples { width, data })
}

fn read_collisions(r: &mut PayloadReader<'_>) -> Result<Channel, ProtocolError> {
    let count = r.read_count()?;
    let mut list = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let a = r.read_string()?;
        let b = r.read_string()?;
        let point = Vector2::new(r.read_double()?, r.read_double()?);
        let impulse = Vector2::new(r.read_double()?, r.read_double()?);
        list.push(Collision { a, b, point, impulse });
    }
    Ok(Channel::Collisions(list))
}

/// Encode readings as a Sensor-kind body.
pub fn encode_readings(readings: &SensorReadings) -> Result<Vec<u8>, ProtocolError> {
    let mut w = PayloadWriter::new();
    w.put_count(readings.len())?;
    for (name, channel) in readings.iter() {
        w.put_string(name);
        match channel {
            Channel::Samples { width, data } => {
                let rows = if *width == 0 { 0 } else { data.len() / width };
                w.put_int(TAG_SAMPLES);
                w.put_count(rows)?;
                w.put_count(*width)?;
                w.put_doubles(&data[..rows * width]);
            }
            Channel::Collisions(list) => {
                w.put_int(TAG_COLLISIONS);
                w.put_count(list.len())?;
                for c in list {
                    w.put_string(&c.a).put_string(&c.b);
                    w.put_doubles(&[c.point.x, c.point.y, c.impulse.x, c.impulse.y]);
                }
            }
        }
    }
    Ok(w.into_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use boxsim_core::types::COLLISIONS_CHANNEL;

    fn sample_readings() -> SensorReadings {
        SensorReadings::new()
            .with(
                "ball1_pos",
                Channel::samples(2, &[&[550.0, 350.0], &[552.5, 349.0]]),
            )
            .with(
                COLLISIONS_CHANNEL,
                Channel::Collisions(vec![Collision {
                    a: "tip".into(),
                    b: "ball1".into(),
                    point: Vector2::new(540.0, 351.0),
                    impulse: Vector2::new(0.5, -0.25),
                }]),
            )
    }

    #[test]
    fn decodes_what_the_simulator_sends() {
        let readings = sample_readings();
        let body = encode_readings(&readings).unwrap();
        let decoded = decode_readings(&body).unwrap();
        assert_eq!(decoded, readings);
        assert_eq!(decoded.points("ball1_pos").unwrap().len(), 2);
        assert_eq!(decoded.collisions().unwrap()[0].b, "ball1");
    }

    #[test]
    fn empty_payload_has_no_channels() {
        let decoded = decode_readings(&0i32.to_be_bytes()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn duplicate_channels_are_malformed() {
        let mut w = PayloadWriter::new();
        w.put_int(2);
        for _ in 0..2 {
            w.put_string("ball1_pos").put_int(TAG_SAMPLES).put_int(0).put_int(2);
        }
        assert!(matches!(
            decode_readings(&w.into_bytes()),
            Err(ProtocolError::Malformed(m)) if m.contains("duplicate")
        ));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let mut w = PayloadWriter::new();
        w.put_int(1).put_string("x").put_int(9);
        assert!(decode_readings(&w.into_bytes()).is_err());
    }

    #[test]
    fn oversized_sample_block_is_malformed() {
        let mut w = PayloadWriter::new();
        w.put_int(1)
            .put_string("ball1_pos")
            .put_int(TAG_SAMPLES)
            .put_int(i32::MAX)
            .put_int(2)
            .put_double(1.0);
        assert!(matches!(
            decode_readings(&w.into_bytes()),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let mut body = encode_readings(&sample_readings()).unwrap();
        body.push(0);
        assert!(decode_readings(&body).is_err());
    }
}
