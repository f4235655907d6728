use super::{BlockUsage, StatusRegister};

/// Per-block busy-tick accumulators for the window currently being
/// aggregated. Owned by the sampling thread, cleared when the window
/// closes.
#[derive(Clone, Debug)]
pub struct PerfCounter {
    pub blocks: Vec<BlockCounter>,
}

#[derive(Clone, Debug)]
pub struct BlockCounter {
    pub name: &'static str,
    /// Index of the status register in the decode table.
    pub register: usize,
    pub mask: u32,
    pub busy: u32,
}

impl PerfCounter {
    pub fn new(registers: &[StatusRegister]) -> Self {
        let blocks = registers
            .iter()
            .enumerate()
            .flat_map(|(register, reg)| {
                reg.blocks.iter().map(move |(name, mask)| BlockCounter {
                    name,
                    register,
                    mask: *mask,
                    busy: 0,
                })
            })
            .collect();

        Self { blocks }
    }

    /// Accumulate one read of the `register`-th decode-table entry.
    pub fn acc(&mut self, register: usize, value: u32) {
        for block in self.blocks.iter_mut() {
            if block.register == register && value & block.mask != 0 {
                block.busy += 1;
            }
        }
    }

    pub fn clear(&mut self) {
        for block in self.blocks.iter_mut() {
            block.busy = 0;
        }
    }

    /// Busy percentages over `ticks` samples, in decode-table order.
    pub fn usage(&self, ticks: u32) -> Vec<BlockUsage> {
        self.blocks
            .iter()
            .map(|block| BlockUsage {
                name: block.name,
                percent: percent(block.busy, ticks),
            })
            .collect()
    }
}

/// `round(100 * busy / ticks)`, clamped to 100.
pub fn percent(busy: u32, ticks: u32) -> u8 {
    if ticks == 0 {
        return 0;
    }

    let rounded = (u64::from(busy) * 100 + u64::from(ticks) / 2) / u64::from(ticks);

    rounded.min(100) as u8
}
