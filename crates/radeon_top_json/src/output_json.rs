use std::time::UNIX_EPOCH;

use serde_json::{json, Map, Value};

use libradeon_top::stat::{Sensors, Snapshot};
use libradeon_top::DeviceInfo;

pub trait OutputJson {
    fn json(&self) -> Value;
}

impl OutputJson for Snapshot {
    fn json(&self) -> Value {
        let mut blocks = Map::new();

        for block in &self.blocks {
            blocks.insert(
                block.name.to_string(),
                json!({
                    "value": block.percent,
                    "unit": "%",
                }),
            );
        }

        json!({
            "sequence": self.sequence,
            "timestamp": self.timestamp
                .duration_since(UNIX_EPOCH)
                .map_or(0, |since| since.as_secs()),
            "period": {
                "ticks": self.ticks,
            },
            "stalled": self.stalled,
            "GRBM": blocks,
            "Sensors": self.sensors.as_ref().map_or(Value::Null, |sensors| sensors.json()),
        })
    }
}

impl OutputJson for Sensors {
    fn json(&self) -> Value {
        let mut m = Map::new();

        for (label, value, unit) in [
            ("GPU Clock", self.sclk_mhz, "MHz"),
            ("Memory Clock", self.mclk_mhz, "MHz"),
            ("VRAM Usage", self.vram_used.map(|b| b >> 20), "MiB"),
            ("Total VRAM", self.vram_total.map(|b| b >> 20), "MiB"),
        ] {
            let Some(value) = value else { continue };

            m.insert(
                label.to_string(),
                json!({
                    "value": value,
                    "unit": unit,
                }),
            );
        }

        m.into()
    }
}

impl OutputJson for DeviceInfo {
    fn json(&self) -> Value {
        json!({
            "PCI": self.pci.map_or(Value::Null, |pci| Value::String(pci.to_string())),
            "device_id": format!("{:#06x}", self.device_id),
            "family": self.family.to_string(),
        })
    }
}
