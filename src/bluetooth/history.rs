/// Decoding of the packed CO2 history buffer read once per process
use log::warn;
use time::{Duration, OffsetDateTime};

use crate::error::DecodeError;
use crate::models::Sample;

/// Sampling interval when the device runs its sensor in low-power mode
const LOW_POWER_INTERVAL_SECS: i64 = 30;
/// Sampling interval in normal mode
const NORMAL_INTERVAL_SECS: i64 = 5;

/// Byte order of the 16-bit history values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }
}

/// CO2 samples reconstructed from the device history
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub interval: Duration,
    /// Number of slots in the buffer, including empty ones
    pub slots: usize,
    pub samples: Vec<Sample>,
}

/// Decode a history buffer into timestamped CO2 samples ending at `now`
///
/// Layout:
/// - Byte 0: low-power flag (non-zero selects the 30 s interval, otherwise 5 s)
/// - Bytes 1..: one 16-bit CO2 value per slot, oldest first
///
/// Slot `i` of `n` is stamped `now - (n - i) * interval`. Slots holding 0 have no
/// reading yet and are skipped without shifting the timeline.
pub fn decode_history(
    data: &[u8],
    now: OffsetDateTime,
    order: ByteOrder,
) -> Result<History, DecodeError> {
    let (&flag, values) = data.split_first().ok_or(DecodeError::EmptyHistory)?;

    let interval = Duration::seconds(if flag != 0 {
        LOW_POWER_INTERVAL_SECS
    } else {
        NORMAL_INTERVAL_SECS
    });

    if values.len() % 2 != 0 {
        warn!(
            "History buffer has a trailing byte ({} value bytes), ignoring it",
            values.len()
        );
    }

    let slots = values.len() / 2;
    let samples = values
        .chunks_exact(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let value = order.read_u16([pair[0], pair[1]]);
            if value == 0 {
                return None;
            }
            let steps_back = (slots - i) as i32;
            Some(Sample {
                timestamp: now - interval * steps_back,
                value: f64::from(value),
            })
        })
        .collect();

    Ok(History {
        interval,
        slots,
        samples,
    })
}
