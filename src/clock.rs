//! A single seam for "what time is it", so recovery and tests can pin a
//! specific instant instead of racing the real clock.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is before the Unix epoch").as_secs() as i64
}
