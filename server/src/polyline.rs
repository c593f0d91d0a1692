use crate::models::Coordinate;

/// Precision used by Google and by OSRM's `polyline` geometries
pub const DEFAULT_PRECISION: u32 = 5;

const CHUNK_BITS: u32 = 5;
const CHUNK_MASK: u64 = 0x1f;
const CONTINUATION: u64 = 0x20;
const ASCII_OFFSET: u8 = 63;
const MAX_SHIFT: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolylineError {
    #[error("malformed path encoding at byte {position}: {reason}")]
    Malformed {
        position: usize,
        reason: &'static str,
    },
}

pub fn encode(path: &[Coordinate]) -> String {
    encode_with_precision(path, DEFAULT_PRECISION)
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

/// Decoded values match the input within one unit of `10^-precision`
pub fn encode_with_precision(path: &[Coordinate], precision: u32) -> String {
    let factor = scale(precision);
    let mut out = String::with_capacity(path.len() * 8);
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

    for point in path {
        let lat = scaled(point.lat, factor);
        let lng = scaled(point.lng, factor);
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

pub fn decode_with_precision(
    encoded: &str,
    precision: u32,
) -> Result<Vec<Coordinate>, PolylineError> {
    let factor = scale(precision);
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let (mut lat, mut lng) = (0i64, 0i64);
    let mut path = Vec::new();

    while index < bytes.len() {
        lat += decode_value(bytes, &mut index)?;
        if index >= bytes.len() {
            return Err(PolylineError::Malformed {
                position: index,
                reason: "latitude without a longitude",
            });
        }
        lng += decode_value(bytes, &mut index)?;
        path.push(Coordinate::new(lat as f64 / factor, lng as f64 / factor));
    }

    Ok(path)
}

fn scale(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

// Clamped to the 32-bit range the decoder accepts
fn scaled(value: f64, factor: f64) -> i64 {
    (value * factor)
        .round()
        .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i64
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = ((delta << 1) ^ (delta >> 63)) as u64;
    while value >= CONTINUATION {
        out.push(char::from((CONTINUATION | (value & CHUNK_MASK)) as u8 + ASCII_OFFSET));
        value >>= CHUNK_BITS;
    }
    out.push(char::from(value as u8 + ASCII_OFFSET));
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Malformed {
                position: *index,
                reason: "truncated chunk sequence",
            });
        };
        if !(ASCII_OFFSET..=b'~').contains(&byte) {
            return Err(PolylineError::Malformed {
                position: *index,
                reason: "character outside the encoding alphabet",
            });
        }
        if shift > MAX_SHIFT {
            return Err(PolylineError::Malformed {
                position: *index,
                reason: "value exceeds 32 bits",
            });
        }

        let chunk = u64::from(byte - ASCII_OFFSET);
        *index += 1;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += CHUNK_BITS;

        if chunk < CONTINUATION {
            break;
        }
    }

    Ok(((result >> 1) as i64) ^ -((result & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-5 + 1e-9;

    fn google_example() -> Vec<Coordinate> {
        vec![
            Coordinate::new(38.5, -120.2),
            Coordinate::new(40.7, -120.95),
            Coordinate::new(43.252, -126.453),
        ]
    }

    fn assert_close(left: &[Coordinate], right: &[Coordinate]) {
        assert_eq!(left.len(), right.len());
        for (a, b) in left.iter().zip(right) {
            assert!((a.lat - b.lat).abs() <= TOLERANCE, "{a:?} vs {b:?}");
            assert!((a.lng - b.lng).abs() <= TOLERANCE, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_encode_reference_vector() {
        assert_eq!(encode(&google_example()), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn test_decode_reference_vector() {
        let decoded = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_close(&decoded, &google_example());
    }

    #[test]
    fn test_empty_path() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_within_precision() {
        // Mixed signs, zero crossings and sub-precision noise
        let mut path = Vec::new();
        for i in 0..200 {
            let t = i as f64;
            path.push(Coordinate::new(
                (t * 0.731).sin() * 89.0 + 0.000_004,
                (t * 1.317).cos() * 179.0 - 0.000_006,
            ));
        }
        path.push(Coordinate::new(0.0, 0.0));
        path.push(Coordinate::new(-90.0, 180.0));
        path.push(Coordinate::new(90.0, -180.0));

        assert_close(&decode(&encode(&path)).unwrap(), &path);
    }

    #[test]
    fn test_repeated_points_encode_as_zero_deltas() {
        let point = Coordinate::new(49.1951, 16.6068);
        let encoded = encode(&[point, point, point]);
        assert!(encoded.ends_with("????"));
        assert_close(&decode(&encoded).unwrap(), &[point, point, point]);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let encoded = encode(&[Coordinate::new(1e300, 0.0), Coordinate::new(-1e300, 0.0)]);
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].lat, f64::from(i32::MAX) / 1e5);
        assert_eq!(decoded[1].lat, f64::from(i32::MIN) / 1e5);
        assert_eq!(decoded[1].lng, 0.0);
    }

    #[test]
    fn test_precision_six() {
        let path = vec![Coordinate::new(49.195061, 16.606836), Coordinate::new(49.2, 16.7)];
        let decoded = decode_with_precision(&encode_with_precision(&path, 6), 6).unwrap();
        for (a, b) in decoded.iter().zip(&path) {
            assert!((a.lat - b.lat).abs() <= 1e-6 + 1e-12);
            assert!((a.lng - b.lng).abs() <= 1e-6 + 1e-12);
        }
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        // Drop the final chunk so the last longitude never terminates
        let encoded = "_p~iF~ps|U_ulLnnqC_mqNvxq";
        let err = decode(encoded).unwrap_err();
        assert_eq!(
            err,
            PolylineError::Malformed {
                position: encoded.len(),
                reason: "truncated chunk sequence",
            }
        );
    }

    #[test]
    fn test_missing_longitude_is_rejected() {
        let err = decode("_p~iF").unwrap_err();
        assert!(matches!(
            err,
            PolylineError::Malformed { reason: "latitude without a longitude", .. }
        ));
    }

    #[test]
    fn test_invalid_character_is_rejected() {
        let err = decode("_p~iF ps|U").unwrap_err();
        assert_eq!(
            err,
            PolylineError::Malformed {
                position: 5,
                reason: "character outside the encoding alphabet",
            }
        );
        assert!(decode("é").is_err());
    }

    #[test]
    fn test_overlong_value_is_rejected() {
        // Eight continuation chunks cannot fit a 32-bit value
        let err = decode("~~~~~~~~?").unwrap_err();
        assert!(matches!(err, PolylineError::Malformed { reason: "value exceeds 32 bits", .. }));
    }
}
