// GRBM: Graphics Register Bus Manager
// Bit layouts from the r600/evergreen/cik register headers in the kernel
// radeon and amdgpu drivers.

use crate::Family;

/// GRBM_STATUS, present on every generation this tool knows.
pub const GRBM_STATUS: u64 = 0x8010;
/// GRBM_STATUS2, decoded on Volcanic Islands and newer.
pub const GRBM_STATUS2: u64 = 0x8008;

/// One status register and the busy bits it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    pub name: &'static str,
    pub offset: u64,
    pub blocks: &'static [(&'static str, u32)],
}

pub(crate) const R600_GRBM_BLOCKS: &[(&str, u32)] = &[
    ("Graphics Pipe", 1 << 31), // GUI_ACTIVE
    ("Event Engine", 1 << 10),
    ("Vertex Cache", 1 << 11),
    ("Texture Addresser", 1 << 14),
    ("Vertex Grouper / Tessellator", 1 << 17),
    ("Shader Export", 1 << 20),
    ("Sequencer Cache", 1 << 21),
    ("Shader Interpolator", 1 << 22),
    ("Shader Memory Exchange", 1 << 23),
    ("Scan Converter", 1 << 24),
    ("Primitive Assembly", 1 << 25),
    ("Depth Block", 1 << 26),
    ("Clip Rectangle", 1 << 27),
    ("Color Block", 1 << 30),
];

pub(crate) const EVERGREEN_GRBM_BLOCKS: &[(&str, u32)] = &[
    ("Graphics Pipe", 1 << 31),
    ("Event Engine", 1 << 10),
    ("Texture Addresser", 1 << 14),
    ("Global Data Share", 1 << 15),
    ("Vertex Grouper / Tessellator", 1 << 17),
    ("Input Assembly", 1 << 19),
    ("Shader Export", 1 << 20),
    ("Sequencer Cache", 1 << 21),
    ("Shader Interpolator", 1 << 22),
    ("Scan Converter", 1 << 24),
    ("Primitive Assembly", 1 << 25),
    ("Depth Block", 1 << 26),
    ("Command Processor", 1 << 29),
    ("Color Block", 1 << 30),
];

pub(crate) const GCN_GRBM_BLOCKS: &[(&str, u32)] = &[
    ("Graphics Pipe", 1 << 31),
    ("Texture Pipe", 1 << 14),
    ("Global Data Share", 1 << 15),
    ("Vertex Grouper / Tessellator", 1 << 17),
    ("Input Assembly", 1 << 19),
    ("Shader Export", 1 << 20),
    ("Work Distributor", 1 << 21),
    ("Shader Processor Interpolator", 1 << 22),
    ("Scan Converter", 1 << 24),
    ("Primitive Assembly", 1 << 25),
    ("Depth Block", 1 << 26),
    ("Command Processor", 1 << 29),
    ("Color Block", 1 << 30),
];

pub(crate) const VI_GRBM2_BLOCKS: &[(&str, u32)] = &[
    ("RunList Controller", 1 << 24),
    ("Texture Cache", 1 << 25),
    ("Command Processor -  Fetcher", 1 << 28), // CPF
    ("Command Processor -  Compute", 1 << 29), // CPC
    ("Command Processor - Graphics", 1 << 30), // CPG
];

pub(crate) const GFX9_GRBM2_BLOCKS: &[(&str, u32)] = &[
    ("RunList Controller", 1 << 24),
    ("Texture Cache", 1 << 25),
    ("Unified Translation Cache Level-2", 1 << 15), // UTCL2
    ("Efficiency Arbiter", 1 << 16), // EA
    ("Render Backend Memory Interface", 1 << 17), // RMI
    ("Command Processor -  Fetcher", 1 << 28), // CPF
    ("Command Processor -  Compute", 1 << 29), // CPC
    ("Command Processor - Graphics", 1 << 30), // CPG
];

// Unknown generations still get the two bits that have kept their
// position since R600.
pub(crate) const GENERIC_GRBM_BLOCKS: &[(&str, u32)] = &[
    ("Graphics Pipe", 1 << 31),
    ("Command Processor", 1 << 29),
];

const R600_REGISTERS: &[StatusRegister] = &[
    StatusRegister { name: "GRBM_STATUS", offset: GRBM_STATUS, blocks: R600_GRBM_BLOCKS },
];

const EVERGREEN_REGISTERS: &[StatusRegister] = &[
    StatusRegister { name: "GRBM_STATUS", offset: GRBM_STATUS, blocks: EVERGREEN_GRBM_BLOCKS },
];

const GCN_REGISTERS: &[StatusRegister] = &[
    StatusRegister { name: "GRBM_STATUS", offset: GRBM_STATUS, blocks: GCN_GRBM_BLOCKS },
];

const VI_REGISTERS: &[StatusRegister] = &[
    StatusRegister { name: "GRBM_STATUS", offset: GRBM_STATUS, blocks: GCN_GRBM_BLOCKS },
    StatusRegister { name: "GRBM_STATUS2", offset: GRBM_STATUS2, blocks: VI_GRBM2_BLOCKS },
];

const GFX9_REGISTERS: &[StatusRegister] = &[
    StatusRegister { name: "GRBM_STATUS", offset: GRBM_STATUS, blocks: GCN_GRBM_BLOCKS },
    StatusRegister { name: "GRBM_STATUS2", offset: GRBM_STATUS2, blocks: GFX9_GRBM2_BLOCKS },
];

const GENERIC_REGISTERS: &[StatusRegister] = &[
    StatusRegister { name: "GRBM_STATUS", offset: GRBM_STATUS, blocks: GENERIC_GRBM_BLOCKS },
];

/// Decode table for a generation. Selected once at classification,
/// immutable afterwards.
pub fn decode_table(family: Family) -> &'static [StatusRegister] {
    match family {
        Family::R600 | Family::R700 => R600_REGISTERS,
        Family::Evergreen | Family::NorthernIslands => EVERGREEN_REGISTERS,
        Family::SouthernIslands | Family::SeaIslands => GCN_REGISTERS,
        Family::VolcanicIslands => VI_REGISTERS,
        Family::ArcticIslands => GFX9_REGISTERS,
        Family::Unknown => GENERIC_REGISTERS,
    }
}

mod perf_counter;
pub use perf_counter::*;

mod snapshot;
pub use snapshot::*;

mod sampler;
pub use sampler::RegisterSource;
pub(crate) use sampler::Sampler;

mod sensors;
pub use sensors::*;

pub(crate) fn parse_sysfs<T: std::str::FromStr, P: Into<std::path::PathBuf>>(path: P) -> Option<T> {
    std::fs::read_to_string(path.into()).ok()
        .and_then(|file| file.trim_end().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FAMILIES: &[Family] = &[
        Family::Unknown,
        Family::R600,
        Family::R700,
        Family::Evergreen,
        Family::NorthernIslands,
        Family::SouthernIslands,
        Family::SeaIslands,
        Family::VolcanicIslands,
        Family::ArcticIslands,
    ];

    #[test]
    fn every_family_has_a_table() {
        for family in ALL_FAMILIES {
            let table = decode_table(*family);
            assert!(!table.is_empty(), "{family}");
        }
    }

    #[test]
    fn block_names_are_unique_within_a_family() {
        for family in ALL_FAMILIES {
            let names: Vec<&str> = decode_table(*family)
                .iter()
                .flat_map(|reg| reg.blocks.iter().map(|(name, _)| *name))
                .collect();
            let mut deduped = names.clone();
            deduped.sort_unstable();
            deduped.dedup();

            assert_eq!(names.len(), deduped.len(), "{family}");
        }
    }

    #[test]
    fn masks_are_single_nonzero_bits() {
        for family in ALL_FAMILIES {
            for reg in decode_table(*family) {
                for (name, mask) in reg.blocks {
                    assert_eq!(mask.count_ones(), 1, "{family}: {name}");
                }
            }
        }
    }
}
