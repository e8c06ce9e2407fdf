//! Onboard clock handling.
//!
//! VMU and HRDP timestamps are two-part coarse/fine words counting from the
//! GPS epoch, 1980-01-06T00:00:00 UTC: whole seconds in the coarse word and
//! a binary sub-second fraction in the fine word. Data-header acquisition
//! times are signed nanosecond offsets from the same epoch.
use hifitime::{Duration, Epoch};

/// The mission epoch all onboard times count from.
#[must_use]
pub fn gps_epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(1980, 1, 6)
}

/// Join a coarse/fine pair with an 8-bit fine word (1/256 s resolution).
#[must_use]
pub fn from_coarse_fine8(coarse: u32, fine: u8) -> Epoch {
    gps_epoch() + Duration::from_seconds(f64::from(coarse) + f64::from(fine) / 256.0)
}

/// Join a coarse/fine pair with a 16-bit fine word (1/65536 s resolution).
#[must_use]
pub fn from_coarse_fine16(coarse: u32, fine: u16) -> Epoch {
    gps_epoch() + Duration::from_seconds(f64::from(coarse) + f64::from(fine) / 65536.0)
}

/// Epoch for a signed nanosecond offset from the GPS epoch.
#[must_use]
pub fn from_gps_nanoseconds(nanos: i64) -> Epoch {
    gps_epoch() + Duration::from_truncated_nanoseconds(nanos)
}
