use std::fmt;

/// Hardware generation, decided once from the PCI device id.
///
/// Every generation shares one register bit layout; the decode tables in
/// [`crate::stat`] are keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Family {
    Unknown,
    R600,
    R700,
    Evergreen,
    NorthernIslands,
    SouthernIslands,
    SeaIslands,
    VolcanicIslands,
    ArcticIslands,
}

impl Family {
    /// Classify a device id. Ids outside every known range yield
    /// `Unknown`; monitoring still runs with the generic block set.
    pub fn from_device_id(device_id: u32) -> Self {
        DEVICE_ID_RANGES
            .iter()
            .find(|(first, last, _)| (*first..=*last).contains(&device_id))
            .map_or(Family::Unknown, |(_, _, family)| *family)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::R600 => "R600",
            Self::R700 => "R700",
            Self::Evergreen => "Evergreen",
            Self::NorthernIslands => "Northern Islands",
            Self::SouthernIslands => "Southern Islands",
            Self::SeaIslands => "Sea Islands",
            Self::VolcanicIslands => "Volcanic Islands",
            Self::ArcticIslands => "Arctic Islands",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Radeon device ids are scattered, so each generation owns several
// disjoint ranges. Ids taken from the pci.ids database.
const DEVICE_ID_RANGES: &[(u32, u32, Family)] = &[
    /* R600 */
    (0x9400, 0x940F, Family::R600), // R600
    (0x94C0, 0x94CF, Family::R600), // RV610
    (0x9500, 0x950F, Family::R600), // RV670
    (0x9580, 0x959F, Family::R600), // RV630 / RV635
    (0x95C0, 0x95CF, Family::R600), // RV620
    /* R700 */
    (0x9440, 0x946F, Family::R700), // RV770 / RV790
    (0x9480, 0x94BF, Family::R700), // RV730 / RV740
    (0x9540, 0x955F, Family::R700), // RV710
    /* Evergreen */
    (0x6880, 0x689F, Family::Evergreen), // Cypress / Hemlock
    (0x68A0, 0x68BF, Family::Evergreen), // Juniper
    (0x68C0, 0x68DF, Family::Evergreen), // Redwood
    (0x68E0, 0x68FF, Family::Evergreen), // Cedar
    /* Northern Islands */
    (0x6700, 0x671F, Family::NorthernIslands), // Cayman
    (0x6720, 0x673F, Family::NorthernIslands), // Barts
    (0x6740, 0x675F, Family::NorthernIslands), // Turks
    (0x6760, 0x677F, Family::NorthernIslands), // Caicos
    (0x9640, 0x964F, Family::NorthernIslands), // Sumo APU
    /* Southern Islands */
    (0x6600, 0x663F, Family::SouthernIslands), // Oland
    (0x6660, 0x667F, Family::SouthernIslands), // Hainan
    (0x6780, 0x679F, Family::SouthernIslands), // Tahiti
    (0x6800, 0x681F, Family::SouthernIslands), // Pitcairn
    (0x6820, 0x683F, Family::SouthernIslands), // Cape Verde
    /* Sea Islands */
    (0x1304, 0x131D, Family::SeaIslands), // Kaveri APU
    (0x6640, 0x665F, Family::SeaIslands), // Bonaire
    (0x67A0, 0x67BF, Family::SeaIslands), // Hawaii
    (0x9830, 0x983F, Family::SeaIslands), // Kabini APU
    /* Volcanic Islands */
    (0x67C0, 0x67FF, Family::VolcanicIslands), // Polaris 10 / 11
    (0x6920, 0x693F, Family::VolcanicIslands), // Tonga
    (0x6980, 0x699F, Family::VolcanicIslands), // Polaris 12
    (0x7300, 0x730F, Family::VolcanicIslands), // Fiji
    (0x9870, 0x987F, Family::VolcanicIslands), // Carrizo APU
    /* Arctic Islands */
    (0x15D8, 0x15DD, Family::ArcticIslands), // Raven APU
    (0x6860, 0x687F, Family::ArcticIslands), // Vega 10
    (0x66A0, 0x66AF, Family::ArcticIslands), // Vega 20
    (0x69A0, 0x69AF, Family::ArcticIslands), // Vega 12
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_classify() {
        assert_eq!(Family::from_device_id(0x9400), Family::R600);
        assert_eq!(Family::from_device_id(0x9442), Family::R700);
        assert_eq!(Family::from_device_id(0x68C8), Family::Evergreen);
        assert_eq!(Family::from_device_id(0x6719), Family::NorthernIslands);
        assert_eq!(Family::from_device_id(0x6798), Family::SouthernIslands); // Tahiti XT
        assert_eq!(Family::from_device_id(0x67B0), Family::SeaIslands); // Hawaii
        assert_eq!(Family::from_device_id(0x67DF), Family::VolcanicIslands); // Polaris 10
        assert_eq!(Family::from_device_id(0x687F), Family::ArcticIslands); // Vega 10
    }

    #[test]
    fn every_id_in_a_declared_range_classifies_to_it() {
        for (first, last, family) in DEVICE_ID_RANGES {
            for id in *first..=*last {
                assert_eq!(Family::from_device_id(id), *family, "id {id:#06x}");
            }
        }
    }

    #[test]
    fn unmatched_ids_are_unknown() {
        assert_eq!(Family::from_device_id(0x0000), Family::Unknown);
        assert_eq!(Family::from_device_id(0x7310), Family::Unknown); // Navi 10
        assert_eq!(Family::from_device_id(0xFFFF), Family::Unknown);
    }

    #[test]
    fn ranges_are_disjoint() {
        for (i, (a_first, a_last, _)) in DEVICE_ID_RANGES.iter().enumerate() {
            for (b_first, b_last, _) in &DEVICE_ID_RANGES[i + 1..] {
                assert!(
                    a_last < b_first || b_last < a_first,
                    "{a_first:#06x}..={a_last:#06x} overlaps {b_first:#06x}..={b_last:#06x}"
                );
            }
        }
    }
}
