use std::fs;
use std::path::{Path, PathBuf};

use super::parse_sysfs;

/// Auxiliary readings from the device's sysfs node. All optional;
/// older kernels and generations expose only some of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sensors {
    pub sclk_mhz: Option<u64>,
    pub mclk_mhz: Option<u64>,
    pub vram_used: Option<u64>,
    pub vram_total: Option<u64>,
}

impl Sensors {
    /// Refresh every reading. Called once per window close, on the
    /// sampling thread.
    pub fn read(sysfs: &Path) -> Self {
        let hwmon = find_hwmon(sysfs);
        let freq_mhz = |name: &str| {
            hwmon
                .as_ref()
                .and_then(|hwmon| parse_sysfs::<u64, _>(hwmon.join(name)))
                .map(|hz| hz / 1_000_000)
        };

        Self {
            sclk_mhz: freq_mhz("freq1_input"),
            mclk_mhz: freq_mhz("freq2_input"),
            vram_used: parse_sysfs(sysfs.join("mem_info_vram_used")),
            vram_total: parse_sysfs(sysfs.join("mem_info_vram_total")),
        }
    }
}

fn find_hwmon(sysfs: &Path) -> Option<PathBuf> {
    fs::read_dir(sysfs.join("hwmon"))
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSysfs(PathBuf);

    impl FakeSysfs {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir()
                .join(format!("radeon_top_{name}_{}", std::process::id()));
            fs::create_dir_all(dir.join("hwmon/hwmon0")).unwrap();

            Self(dir)
        }
    }

    impl Drop for FakeSysfs {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn reads_clocks_and_vram() {
        let sysfs = FakeSysfs::new("sensors");
        fs::write(sysfs.0.join("hwmon/hwmon0/freq1_input"), "850000000\n").unwrap();
        fs::write(sysfs.0.join("hwmon/hwmon0/freq2_input"), "1200000000\n").unwrap();
        fs::write(sysfs.0.join("mem_info_vram_used"), "536870912\n").unwrap();
        fs::write(sysfs.0.join("mem_info_vram_total"), "2147483648\n").unwrap();

        let sensors = Sensors::read(&sysfs.0);

        assert_eq!(sensors.sclk_mhz, Some(850));
        assert_eq!(sensors.mclk_mhz, Some(1200));
        assert_eq!(sensors.vram_used, Some(536870912));
        assert_eq!(sensors.vram_total, Some(2147483648));
    }

    #[test]
    fn missing_files_read_as_none() {
        let sysfs = FakeSysfs::new("sensors_empty");

        assert_eq!(Sensors::read(&sysfs.0), Sensors::default());
    }
}
