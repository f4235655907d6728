use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info};
use nix::unistd::getuid;

use crate::device_path::{DevicePath, PciAddress};
use crate::error::StartError;
use crate::family::Family;
use crate::privilege::{self, ElevatedScope};
use crate::stat::{self, Sampler, Snapshot, SnapshotSlot};
use crate::Config;

/// Identity of the monitored device, fixed at startup.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub sysfs: PathBuf,
    pub pci: Option<PciAddress>,
    pub device_id: u32,
    pub family: Family,
}

/// A running sampling engine.
///
/// Owns the sampling thread. `stop` (or dropping the engine) raises the
/// cooperative shutdown flag and waits for the final partial snapshot
/// and the release of the register mapping. Terminal; monitoring again
/// takes a fresh `start`.
pub struct Engine {
    slot: Arc<SnapshotSlot>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    info: DeviceInfo,
}

impl Engine {
    /// Validate the configuration, bracket the privileged device setup
    /// and launch the sampling thread.
    ///
    /// Elevated rights are held only across device location and register
    /// mapping, and are permanently dropped before the thread spawns —
    /// on every path out of this function, including the error ones.
    pub fn start(config: Config) -> Result<Self, StartError> {
        config.validate()?;

        let scope = ElevatedScope::acquire();
        let device = DevicePath::find(&config.selector)?;
        let mapped = device.map_registers(config.force_mem)?;
        scope.drop_for_good();

        // A sampling loop with reacquirable root would be a bug in the
        // bracket above, not a runtime condition to recover from.
        assert!(
            getuid().is_root() || !privilege::can_reacquire_root(),
            "elevated rights survived the privilege bracket",
        );

        let family = Family::from_device_id(device.device_id);
        if family == Family::Unknown {
            info!(
                "unknown device id {:#06x}, monitoring with the generic block set",
                device.device_id,
            );
        }
        debug!("{}: {family}, {} KiB aperture", device.sysfs.display(), mapped.len() / 1024);

        let info = DeviceInfo {
            sysfs: device.sysfs.clone(),
            pci: device.pci,
            device_id: device.device_id,
            family,
        };

        let slot = Arc::new(SnapshotSlot::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let sampler = Sampler::new(
            mapped,
            stat::decode_table(family),
            config.ticks_per_second,
            config.window_secs,
            Some(device.sysfs),
            Arc::clone(&slot),
            Arc::clone(&shutdown),
        );
        let thread = std::thread::spawn(move || sampler.run());

        Ok(Self { slot, shutdown, thread: Some(thread), info })
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Non-blocking read of the most recent complete window. `None`
    /// before the first window closes. Repeated calls without a new
    /// window return the same snapshot.
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.slot.latest()
    }

    /// Sequence number of the latest published window, 0 before the
    /// first one. Consumers compare this across polls to detect
    /// staleness cheaply.
    pub fn sequence(&self) -> u64 {
        self.slot.sequence()
    }

    /// Graceful shutdown. Returns once the loop has drained and the
    /// register mapping is released.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!("sampling thread stopped");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_config_is_rejected_before_any_device_work() {
        let config = Config { ticks_per_second: 0, ..Default::default() };

        assert!(matches!(
            Engine::start(config),
            Err(StartError::InvalidConfig { .. }),
        ));
    }
}
