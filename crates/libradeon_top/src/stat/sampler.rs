use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, warn};

use crate::error::RegisterReadError;
use crate::mmio::MappedRegisters;
use super::{PerfCounter, Sensors, Snapshot, SnapshotSlot, StatusRegister};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Source of raw status-register values.
///
/// The production implementation is the mapped aperture; tests substitute
/// scripted sources.
pub trait RegisterSource {
    fn read_register(&self, offset: u64) -> Result<u32, RegisterReadError>;
}

impl RegisterSource for MappedRegisters {
    fn read_register(&self, offset: u64) -> Result<u32, RegisterReadError> {
        self.read(offset)
    }
}

/// The sampling loop.
///
/// Owns the register source for its whole life. Runs on a dedicated
/// thread until the shutdown flag is raised, then drains: one final
/// snapshot from the partial window, and the source (the register
/// mapping) is released when the sampler is dropped. Terminal; a
/// stopped sampler cannot be restarted.
pub(crate) struct Sampler<S> {
    source: S,
    registers: &'static [StatusRegister],
    counter: PerfCounter,
    ticks_per_second: u32,
    window_ticks: u32,
    ticks_taken: u32,
    failed_ticks: u32,
    sysfs: Option<PathBuf>,
    slot: Arc<SnapshotSlot>,
    shutdown: Arc<AtomicBool>,
}

impl<S: RegisterSource> Sampler<S> {
    pub(crate) fn new(
        source: S,
        registers: &'static [StatusRegister],
        ticks_per_second: u32,
        window_secs: u32,
        sysfs: Option<PathBuf>,
        slot: Arc<SnapshotSlot>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            registers,
            counter: PerfCounter::new(registers),
            ticks_per_second,
            window_ticks: window_secs.saturating_mul(ticks_per_second).max(1),
            ticks_taken: 0,
            failed_ticks: 0,
            sysfs,
            slot,
            shutdown,
        }
    }

    /// One read-and-accumulate cycle over every status register.
    ///
    /// A failed read contributes nothing to that register's blocks; a
    /// tick on which every register failed counts toward the stalled
    /// detection.
    fn tick(&mut self) {
        let mut any_ok = false;

        for (index, reg) in self.registers.iter().enumerate() {
            match self.source.read_register(reg.offset) {
                Ok(value) => {
                    any_ok = true;
                    self.counter.acc(index, value);
                },
                Err(err) => debug!("{} read failed: {err}", reg.name),
            }
        }

        if !any_ok {
            self.failed_ticks += 1;
        }
        self.ticks_taken += 1;
    }

    /// Convert the accumulated counts into a snapshot, publish it and
    /// reset the counters. A window with no ticks publishes nothing.
    fn close_window(&mut self) {
        let ticks = self.ticks_taken;
        if ticks == 0 {
            return;
        }

        let stalled = self.failed_ticks == ticks;
        if stalled {
            warn!("no readable tick in the last window ({ticks} attempts), device stalled");
        }

        self.slot.publish(Snapshot {
            sequence: 0, // stamped by the slot
            timestamp: SystemTime::now(),
            ticks,
            blocks: self.counter.usage(ticks),
            stalled,
            sensors: self.sysfs.as_deref().map(Sensors::read),
        });

        self.counter.clear();
        self.ticks_taken = 0;
        self.failed_ticks = 0;
    }

    /// Run until shutdown, then drain.
    ///
    /// Tick deadlines are computed from the start epoch, `epoch + n *
    /// period`, so a tick that runs late does not push every following
    /// tick later as well. The shutdown flag is checked only at tick
    /// boundaries; an in-flight register read always completes.
    pub(crate) fn run(mut self) {
        let period_nanos = NANOS_PER_SEC / u64::from(self.ticks_per_second);
        let epoch = Instant::now();
        let mut elapsed_ticks: u64 = 0;

        while !self.shutdown.load(Ordering::Acquire) {
            self.tick();
            elapsed_ticks += 1;

            if self.ticks_taken >= self.window_ticks {
                self.close_window();
            }

            let deadline = epoch + Duration::from_nanos(period_nanos.saturating_mul(elapsed_ticks));
            if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }

        // the partial window still gets published, with the ticks
        // actually taken as the denominator
        self.close_window();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    const TEST_BLOCKS: &[(&str, u32)] = &[("SHADER", 0x1), ("MEM", 0x2)];
    const TEST_REGISTERS: &[StatusRegister] = &[
        StatusRegister { name: "TEST_STATUS", offset: 0x0, blocks: TEST_BLOCKS },
    ];

    struct ScriptedSource {
        values: Vec<Result<u32, RegisterReadError>>,
        next: Cell<usize>,
        dropped: Option<Arc<AtomicBool>>,
    }

    impl ScriptedSource {
        fn cycle(values: &[Result<u32, RegisterReadError>]) -> Self {
            Self {
                values: values.to_vec(),
                next: Cell::new(0),
                dropped: None,
            }
        }
    }

    impl RegisterSource for ScriptedSource {
        fn read_register(&self, _offset: u64) -> Result<u32, RegisterReadError> {
            let index = self.next.get();
            self.next.set(index + 1);

            self.values[index % self.values.len()]
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            if let Some(dropped) = &self.dropped {
                dropped.store(true, Ordering::SeqCst);
            }
        }
    }

    fn sampler(
        source: ScriptedSource,
        ticks_per_second: u32,
        window_secs: u32,
    ) -> (Sampler<ScriptedSource>, Arc<SnapshotSlot>, Arc<AtomicBool>) {
        let slot = Arc::new(SnapshotSlot::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let sampler = Sampler::new(
            source,
            TEST_REGISTERS,
            ticks_per_second,
            window_secs,
            None,
            Arc::clone(&slot),
            Arc::clone(&shutdown),
        );

        (sampler, slot, shutdown)
    }

    fn percent_of(snapshot: &Snapshot, name: &str) -> u8 {
        snapshot
            .blocks
            .iter()
            .find(|block| block.name == name)
            .unwrap()
            .percent
    }

    #[test]
    fn alternating_pattern_over_one_window() {
        // 120 ticks/s, 1 s window, register alternating 0x1 / 0x3
        let (mut sampler, slot, _) = sampler(
            ScriptedSource::cycle(&[Ok(0x1), Ok(0x3)]),
            120,
            1,
        );

        for _ in 0..120 {
            sampler.tick();
        }
        sampler.close_window();

        let snapshot = slot.latest().unwrap();
        assert_eq!(snapshot.ticks, 120);
        assert!(!snapshot.stalled);
        assert_eq!(percent_of(&snapshot, "SHADER"), 100);
        assert_eq!(percent_of(&snapshot, "MEM"), 50);
    }

    #[test]
    fn all_ticks_failed_marks_the_window_stalled() {
        let (mut sampler, slot, _) = sampler(
            ScriptedSource::cycle(&[Err(RegisterReadError::Unavailable)]),
            120,
            1,
        );

        for _ in 0..120 {
            sampler.tick();
        }
        sampler.close_window();

        let snapshot = slot.latest().unwrap();
        assert!(snapshot.stalled);
        assert_eq!(snapshot.ticks, 120);
        assert!(snapshot.blocks.iter().all(|block| block.percent == 0));
    }

    #[test]
    fn some_failed_ticks_are_zero_contribution_not_stalled() {
        // every other read fails, the rest show SHADER busy
        let (mut sampler, slot, _) = sampler(
            ScriptedSource::cycle(&[Ok(0x1), Err(RegisterReadError::Unavailable)]),
            120,
            1,
        );

        for _ in 0..120 {
            sampler.tick();
        }
        sampler.close_window();

        let snapshot = slot.latest().unwrap();
        assert!(!snapshot.stalled);
        assert_eq!(percent_of(&snapshot, "SHADER"), 50);
    }

    #[test]
    fn partial_window_uses_actual_tick_count() {
        // shutdown after 60 of 120 ticks, MEM busy on every other tick
        let (mut sampler, slot, _) = sampler(
            ScriptedSource::cycle(&[Ok(0x3), Ok(0x1)]),
            120,
            1,
        );

        for _ in 0..60 {
            sampler.tick();
        }
        sampler.close_window();

        let snapshot = slot.latest().unwrap();
        assert_eq!(snapshot.ticks, 60);
        assert_eq!(percent_of(&snapshot, "SHADER"), 100);
        assert_eq!(percent_of(&snapshot, "MEM"), 50);
    }

    #[test]
    fn counters_reset_between_windows() {
        let (mut sampler, slot, _) = sampler(
            ScriptedSource::cycle(&[Ok(0x3)]),
            120,
            1,
        );

        for _ in 0..120 {
            sampler.tick();
        }
        sampler.close_window();
        assert_eq!(percent_of(&slot.latest().unwrap(), "SHADER"), 100);

        // now a fully idle window; no carryover from the busy one
        sampler.source = ScriptedSource::cycle(&[Ok(0x0)]);
        for _ in 0..120 {
            sampler.tick();
        }
        sampler.close_window();

        let snapshot = slot.latest().unwrap();
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(percent_of(&snapshot, "SHADER"), 0);
        assert_eq!(percent_of(&snapshot, "MEM"), 0);
    }

    #[test]
    fn run_drains_and_releases_the_source_on_shutdown() {
        let dropped = Arc::new(AtomicBool::new(false));
        let mut source = ScriptedSource::cycle(&[Ok(0x1)]);
        source.dropped = Some(Arc::clone(&dropped));

        // long window, so the only snapshot comes from the drain
        let (sampler, slot, shutdown) = sampler(source, 200, 60);

        let thread = std::thread::spawn(move || sampler.run());
        std::thread::sleep(Duration::from_millis(100));
        shutdown.store(true, Ordering::Release);
        thread.join().unwrap();

        let snapshot = slot.latest().unwrap();
        assert!(snapshot.ticks >= 1);
        assert_eq!(percent_of(&snapshot, "SHADER"), 100);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn run_with_no_ticks_publishes_nothing() {
        let (sampler, slot, shutdown) = sampler(
            ScriptedSource::cycle(&[Ok(0x1)]),
            120,
            1,
        );

        shutdown.store(true, Ordering::Release);
        sampler.run();

        assert!(slot.latest().is_none());
    }
}
