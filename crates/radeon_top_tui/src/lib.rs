use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cursive::align::HAlign;
use cursive::theme::{Color, PaletteColor};
use cursive::views::{LinearLayout, Panel, TextView};

use libradeon_top::stat::{self, Snapshot};
use libradeon_top::{DeviceInfo, Engine};

mod view;
use view::{ActivityView, Text};

// bounded wait between publisher polls; faster polls just see the same
// snapshot again
const POLL_PERIOD: Duration = Duration::from_millis(250);

const TOGGLE_HELP: &str = " (q)uit";

pub fn run(title: &str, engine: Engine, color: bool) {
    let activity = ActivityView::new(stat::decode_table(engine.device_info().family));
    let sensors = Text::default();
    let status = Text::default();
    status.set(" collecting samples ...".to_string());

    let mut siv = cursive::default();
    siv.update_theme(|theme| {
        theme.shadow = false;

        if !color {
            for palette_color in [
                PaletteColor::Background,
                PaletteColor::View,
                PaletteColor::Primary,
                PaletteColor::TitlePrimary,
                PaletteColor::Highlight,
                PaletteColor::HighlightText,
            ] {
                theme.palette[palette_color] = Color::TerminalDefault;
            }
        }
    });

    siv.add_layer(
        LinearLayout::vertical()
            .child(
                Panel::new(TextView::new(info_bar(engine.device_info())).center())
                    .title(title)
                    .title_position(HAlign::Center)
            )
            .child(activity.panel("GRBM"))
            .child(sensors.panel("Sensors"))
            .child(TextView::new_with_content(status.content.clone()))
            .child(TextView::new(TOGGLE_HELP))
    );
    siv.add_global_callback('q', cursive::Cursive::quit);

    let cb_sink = siv.cb_sink().clone();
    let quit = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut last_sequence = 0;

            while !quit.load(Ordering::Relaxed) {
                std::thread::sleep(POLL_PERIOD);

                let Some(snapshot) = engine.latest_snapshot() else { continue };
                if snapshot.sequence == last_sequence {
                    continue;
                }
                last_sequence = snapshot.sequence;

                activity.set_value(&snapshot);
                sensors.set(draw_sensors(&snapshot));
                status.set(draw_status(&snapshot));

                if cb_sink.send(Box::new(cursive::Cursive::noop)).is_err() {
                    break;
                }
            }
        });

        siv.run();
        quit.store(true, Ordering::Relaxed);
    });

    engine.stop();
}

fn info_bar(info: &DeviceInfo) -> String {
    format!(
        "{pci} [1002:{device_id:04x}]\n{family}",
        pci = info.pci.map_or_else(|| "?".to_string(), |pci| pci.to_string()),
        device_id = info.device_id,
        family = info.family,
    )
}

fn draw_sensors(snapshot: &Snapshot) -> String {
    let Some(sensors) = &snapshot.sensors else { return String::new() };
    let mut buf = String::new();

    if let Some(sclk) = sensors.sclk_mhz {
        let _ = write!(buf, " GPU: {sclk:4} MHz");
    }
    if let Some(mclk) = sensors.mclk_mhz {
        let _ = write!(buf, "  Mem: {mclk:4} MHz");
    }
    if let [Some(used), Some(total)] = [sensors.vram_used, sensors.vram_total] {
        let _ = write!(buf, "  VRAM: {:5} / {:5} MiB", used >> 20, total >> 20);
    }

    buf
}

fn draw_status(snapshot: &Snapshot) -> String {
    if snapshot.stalled {
        format!(
            " window #{}: device stalled, no readable sample",
            snapshot.sequence,
        )
    } else {
        format!(
            " window #{}, {} ticks",
            snapshot.sequence,
            snapshot.ticks,
        )
    }
}
