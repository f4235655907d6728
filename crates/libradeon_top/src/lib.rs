use std::path::PathBuf;

pub mod stat;

mod device_path;
pub use device_path::{DevicePath, PciAddress};

mod engine;
pub use engine::{DeviceInfo, Engine};

mod error;
pub use error::{RegisterReadError, StartError};

mod family;
pub use family::Family;

mod mmio;
pub use mmio::MappedRegisters;

pub mod privilege;

pub const DEFAULT_TICKS_PER_SECOND: u32 = 120;
pub const DEFAULT_WINDOW_SECS: u32 = 1;

/// Which GPU to monitor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DeviceSelector {
    /// The first Radeon display adapter on the PCI bus.
    #[default]
    Auto,
    /// The unique adapter on this PCI bus number.
    Bus(u8),
    /// The adapter at this exact PCI bus address.
    Pci(PciAddress),
    /// An explicit sysfs device directory.
    Path(PathBuf),
}

/// Engine configuration, immutable once `Engine::start` accepts it.
#[derive(Clone, Debug)]
pub struct Config {
    /// Register samples per second.
    pub ticks_per_second: u32,
    /// Seconds of samples aggregated into one published snapshot.
    pub window_secs: u32,
    pub selector: DeviceSelector,
    /// Map the registers through `/dev/mem` even when the sysfs
    /// resource file is available.
    pub force_mem: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            window_secs: DEFAULT_WINDOW_SECS,
            selector: DeviceSelector::Auto,
            force_mem: false,
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(), StartError> {
        if self.ticks_per_second < 1 {
            return Err(StartError::invalid_config("tick rate must be at least 1 sample/s"));
        }
        if self.window_secs < 1 {
            return Err(StartError::invalid_config("aggregation window must be at least 1 second"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let config = Config { ticks_per_second: 0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(StartError::InvalidConfig { .. }),
        ));
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = Config { window_secs: 0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(StartError::InvalidConfig { .. }),
        ));
    }
}
