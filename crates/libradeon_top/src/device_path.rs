use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use crate::error::StartError;
use crate::mmio::MappedRegisters;
use crate::DeviceSelector;

const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

const PCI_VENDOR_ID_ATI: u32 = 0x1002;
const PCI_BASE_CLASS_DISPLAY: u32 = 0x03;

// sysfs `resource` table flags, from include/linux/ioport.h
const IORESOURCE_MEM: u64 = 0x0000_0200;

// Register BARs on R600 and newer are 256 KiB or 512 KiB; the
// framebuffer BAR is tens of MiB at minimum, so a size window is enough
// to tell them apart.
const REG_BAR_MIN_SIZE: u64 = 256 * 1024;
const REG_BAR_MAX_SIZE: u64 = 4 * 1024 * 1024;

/// PCI bus address, `[domain:]bus:dev.func`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u8,
    pub dev: u8,
    pub func: u8,
}

impl FromStr for PciAddress {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, rest) = match s.matches(':').count() {
            2 => {
                let (domain, rest) = s.split_once(':').unwrap_or(("", s));
                (u32::from_str_radix(domain, 16)?, rest)
            },
            _ => (0, s),
        };
        let (bus, rest) = rest.split_once(':').unwrap_or(("", rest));
        let (dev, func) = rest.split_once('.').unwrap_or((rest, "0"));

        Ok(Self {
            domain,
            bus: u8::from_str_radix(bus, 16)?,
            dev: u8::from_str_radix(dev, 16)?,
            func: u8::from_str_radix(func, 16)?,
        })
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.dev, self.func,
        )
    }
}

/// A located GPU: its sysfs node, bus address and raw device id.
#[derive(Clone, Debug)]
pub struct DevicePath {
    pub sysfs: PathBuf,
    pub pci: Option<PciAddress>,
    pub device_id: u32,
}

impl DevicePath {
    pub fn from_sysfs<P: Into<PathBuf>>(sysfs: P) -> Result<Self, StartError> {
        let sysfs = sysfs.into();
        let device_id = read_sysfs_hex(&sysfs.join("device"))
            .ok_or_else(|| StartError::DeviceNotFound {
                selector: sysfs.display().to_string(),
            })?;
        let pci = sysfs
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<PciAddress>().ok());

        Ok(Self { sysfs, pci, device_id })
    }

    /// All Radeon display adapters on the PCI bus.
    pub fn enumerate() -> Vec<Self> {
        let Ok(entries) = fs::read_dir(SYSFS_PCI_DEVICES) else { return Vec::new() };

        let mut devices: Vec<Self> = entries
            .flatten()
            .filter(|entry| {
                let path = entry.path();
                let vendor = read_sysfs_hex(&path.join("vendor"));
                let class = read_sysfs_hex(&path.join("class"));

                vendor == Some(PCI_VENDOR_ID_ATI)
                    && class.is_some_and(|c| c >> 16 == PCI_BASE_CLASS_DISPLAY)
            })
            .filter_map(|entry| Self::from_sysfs(entry.path()).ok())
            .collect();

        devices.sort_by_key(|device| device.pci);

        devices
    }

    /// Resolve the configured selector to a single device.
    pub fn find(selector: &DeviceSelector) -> Result<Self, StartError> {
        let not_found = || StartError::DeviceNotFound {
            selector: selector_to_string(selector),
        };

        match selector {
            DeviceSelector::Auto => Self::enumerate().into_iter().next().ok_or_else(not_found),
            DeviceSelector::Bus(bus) => {
                let mut matches: Vec<Self> = Self::enumerate()
                    .into_iter()
                    .filter(|device| device.pci.is_some_and(|pci| pci.bus == *bus))
                    .collect();

                // a bus filter must identify the card unambiguously
                if matches.len() == 1 { Ok(matches.remove(0)) } else { Err(not_found()) }
            },
            DeviceSelector::Pci(address) => Self::enumerate()
                .into_iter()
                .find(|device| device.pci == Some(*address))
                .ok_or_else(not_found),
            DeviceSelector::Path(path) => Self::from_sysfs(path),
        }
    }

    /// Map the register aperture.
    ///
    /// The device-exposed `resourceN` mapping is preferred; reading the BAR
    /// base out of the config-space table and going through `/dev/mem` is
    /// the fallback for `force_mem` (proprietary driver setups) or kernels
    /// without resource files.
    pub fn map_registers(&self, force_mem: bool) -> Result<MappedRegisters, StartError> {
        let bar = self.register_bar()?;

        if !force_mem {
            let resource = self.sysfs.join(format!("resource{}", bar.index));
            if resource.exists() {
                debug!("mapping {} ({} KiB)", resource.display(), bar.size / 1024);
                let file = File::open(&resource)
                    .map_err(|err| StartError::from_open(&resource, err))?;

                return MappedRegisters::map(&file, 0, bar.size as usize);
            }
        }

        debug!("mapping /dev/mem at {:#x} ({} KiB)", bar.base, bar.size / 1024);
        let file = File::open("/dev/mem")
            .map_err(|err| StartError::from_open("/dev/mem", err))?;

        MappedRegisters::map(&file, bar.base, bar.size as usize)
    }

    fn register_bar(&self) -> Result<BarRegion, StartError> {
        let resource = self.sysfs.join("resource");
        let table = fs::read_to_string(&resource)
            .map_err(|err| StartError::from_open(&resource, err))?;

        select_register_bar(&table).ok_or_else(|| StartError::MapFailed {
            message: format!("{}: no candidate register BAR", self.sysfs.display()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BarRegion {
    index: usize,
    base: u64,
    size: u64,
}

/// Pick the register BAR out of a sysfs `resource` table.
///
/// Each line is `start end flags` for one BAR. The register aperture is
/// the smallest memory BAR whose size falls in the expected window.
fn select_register_bar(table: &str) -> Option<BarRegion> {
    table
        .lines()
        .take(6) // standard BARs only, not the expansion ROM
        .enumerate()
        .filter_map(|(index, line)| {
            let mut fields = line.split_whitespace().map(|field| {
                u64::from_str_radix(field.trim_start_matches("0x"), 16).ok()
            });
            let [base, end, flags] = [fields.next()??, fields.next()??, fields.next()??];

            if flags & IORESOURCE_MEM == 0 || end < base {
                return None;
            }

            let size = end - base + 1;
            (REG_BAR_MIN_SIZE..=REG_BAR_MAX_SIZE)
                .contains(&size)
                .then_some(BarRegion { index, base, size })
        })
        .min_by_key(|bar| bar.size)
}

fn selector_to_string(selector: &DeviceSelector) -> String {
    match selector {
        DeviceSelector::Auto => "auto".to_string(),
        DeviceSelector::Bus(bus) => format!("bus {bus:02x}"),
        DeviceSelector::Pci(address) => address.to_string(),
        DeviceSelector::Path(path) => path.display().to_string(),
    }
}

fn read_sysfs_hex(path: &Path) -> Option<u32> {
    let s = fs::read_to_string(path).ok()?;

    u32::from_str_radix(s.trim_end().trim_start_matches("0x"), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pci_address_from_str() {
        let address: PciAddress = "0000:03:00.0".parse().unwrap();
        assert_eq!(address, PciAddress { domain: 0, bus: 3, dev: 0, func: 0 });

        let short: PciAddress = "0a:10.1".parse().unwrap();
        assert_eq!(short, PciAddress { domain: 0, bus: 0x0A, dev: 0x10, func: 1 });

        assert!("nonsense".parse::<PciAddress>().is_err());
    }

    #[test]
    fn pci_address_round_trip() {
        let address = PciAddress { domain: 0, bus: 0xC1, dev: 0, func: 0 };
        assert_eq!(address.to_string(), "0000:c1:00.0");
        assert_eq!(address.to_string().parse::<PciAddress>().unwrap(), address);
    }

    // Tahiti: BAR0 framebuffer (256 MiB), BAR2 doorbell-sized hole,
    // BAR4 I/O ports, BAR5 registers (256 KiB).
    const TAHITI_RESOURCE: &str = "\
0x00000000c0000000 0x00000000cfffffff 0x000000000014220c
0x0000000000000000 0x0000000000000000 0x0000000000000000
0x00000000d0000000 0x00000000d07fffff 0x000000000014220c
0x0000000000000000 0x0000000000000000 0x0000000000000000
0x000000000000b000 0x000000000000b0ff 0x0000000000040101
0x00000000fbe00000 0x00000000fbe3ffff 0x0000000000040200
0x00000000fbe40000 0x00000000fbe5ffff 0x0000000000046200";

    #[test]
    fn register_bar_is_smallest_mmio_candidate() {
        let bar = select_register_bar(TAHITI_RESOURCE).unwrap();
        assert_eq!(
            bar,
            BarRegion { index: 5, base: 0xFBE0_0000, size: 0x4_0000 },
        );
    }

    #[test]
    fn io_and_oversized_bars_are_ignored() {
        // framebuffer only
        let table = "0x00000000c0000000 0x00000000cfffffff 0x000000000014220c";
        assert_eq!(select_register_bar(table), None);

        // I/O port BAR of a plausible size
        let table = "0x000000000000b000 0x000000000004b0ff 0x0000000000040101";
        assert_eq!(select_register_bar(table), None);
    }

    #[test]
    fn empty_table_has_no_register_bar() {
        assert_eq!(select_register_bar(""), None);
    }
}
