use xcplink_config::{ConfigError, Configuration};

pub const BAUDRATE: &str = "BAUDRATE";
pub const BTL_CYCLES: &str = "BTL_CYCLES";
pub const SAMPLE_RATE: &str = "SAMPLE_RATE";
pub const SAMPLE_POINT: &str = "SAMPLE_POINT";
pub const SJW: &str = "SJW";
pub const TSEG1: &str = "TSEG1";
pub const TSEG2: &str = "TSEG2";

/// Bus bit timing handed to drivers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitTiming {
    /// Bits per second.
    pub baudrate: f64,
    /// Time quanta per bit.
    pub btl_cycles: u32,
    /// Samples per bit.
    pub sample_rate: u32,
    /// Sample point in percent of the bit time.
    pub sample_point: f64,
    /// Synchronization jump width.
    pub sjw: u32,
    pub tseg1: u32,
    pub tseg2: u32,
}

impl Default for BitTiming {
    fn default() -> Self {
        Self {
            baudrate: 250_000.0,
            btl_cycles: 16,
            sample_rate: 1,
            sample_point: 87.5,
            sjw: 2,
            tseg1: 5,
            tseg2: 2,
        }
    }
}

impl BitTiming {
    /// Read the bit timing options.
    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        Ok(Self {
            baudrate: config.get_float(BAUDRATE)?,
            btl_cycles: unsigned(config, BTL_CYCLES)?,
            sample_rate: unsigned(config, SAMPLE_RATE)?,
            sample_point: config.get_float(SAMPLE_POINT)?,
            sjw: unsigned(config, SJW)?,
            tseg1: unsigned(config, TSEG1)?,
            tseg2: unsigned(config, TSEG2)?,
        })
    }

    /// TSEG1/TSEG2 derived from `btl_cycles` and `sample_point`.
    pub fn derived_tsegs(&self) -> (u32, u32) {
        sample_point_to_tsegs(self.btl_cycles, self.sample_point)
    }
}

/// Split `tqs` time quanta at `sample_point` percent into (TSEG1, TSEG2).
pub fn sample_point_to_tsegs(tqs: u32, sample_point: f64) -> (u32, u32) {
    let tseg1 = (f64::from(tqs) * sample_point / 100.0).clamp(0.0, f64::from(tqs)) as u32;
    (tseg1, tqs - tseg1)
}

fn unsigned(config: &Configuration, name: &str) -> Result<u32, ConfigError> {
    let value = config.get_int(name)?;
    u32::try_from(value).map_err(|_| ConfigError::ValidationFailed {
        message: format!("{name} must be a non-negative 32-bit integer, got {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsegs_from_sample_point() {
        assert_eq!(sample_point_to_tsegs(16, 87.5), (14, 2));
        assert_eq!(sample_point_to_tsegs(10, 75.0), (7, 3));
        assert_eq!(sample_point_to_tsegs(8, 100.0), (8, 0));
        assert_eq!(sample_point_to_tsegs(8, 150.0), (8, 0));
    }

    #[test]
    fn default_timing_derives_tsegs() {
        let timing = BitTiming::default();
        assert_eq!(timing.derived_tsegs(), (14, 2));
    }
}
