use cursive::align::HAlign;
use cursive::utils::Counter;
use cursive::views::{
    FixedLayout,
    LinearLayout,
    Panel,
    ProgressBar,
    TextContent,
    TextView,
};
use cursive::Rect;

use libradeon_top::stat::{Snapshot, StatusRegister};

pub const PANEL_WIDTH: usize = 70;

#[derive(Clone)]
pub struct Text {
    pub content: TextContent,
}

impl Text {
    pub fn set(&self, buf: String) {
        self.content.set_content(buf);
    }

    pub fn panel(&self, title: &str) -> Panel<TextView> {
        Panel::new(TextView::new_with_content(self.content.clone()).no_wrap())
            .title(title)
            .title_position(HAlign::Left)
    }
}

impl Default for Text {
    fn default() -> Self {
        Self { content: TextContent::new("") }
    }
}

/// One progress bar per functional block, in decode-table order —
/// the same order the snapshot's blocks arrive in.
pub struct ActivityView {
    pub names: Vec<&'static str>,
    pub counters: Vec<Counter>,
}

impl ActivityView {
    pub fn new(registers: &'static [StatusRegister]) -> Self {
        let names: Vec<&'static str> = registers
            .iter()
            .flat_map(|reg| reg.blocks.iter().map(|(name, _)| *name))
            .collect();
        let counters = (0..names.len()).map(|_| Counter::new(0)).collect();

        Self { names, counters }
    }

    pub fn panel(&self, title: &str) -> Panel<LinearLayout> {
        const BAR_WIDTH: usize = 36;
        const LEFT_LEN: usize = PANEL_WIDTH - BAR_WIDTH;

        let label = |value: usize, (_, _): (usize, usize)| -> String {
            format!("[{val:^width$}]", width = BAR_WIDTH - 2, val = format!("{value:3} %"))
        };
        let mut sub_layout = LinearLayout::vertical();

        for (counter, name) in self.counters.iter().zip(self.names.iter()) {
            sub_layout.add_child(
                FixedLayout::new()
                    .child(
                        Rect::from_size((0, 0), (LEFT_LEN + 1, 1)),
                        TextView::new(format!("{name:>LEFT_LEN$}:")),
                    )
                    .child(
                        Rect::from_size((LEFT_LEN + 2, 0), (BAR_WIDTH, 1)),
                        ProgressBar::new()
                            .with_value(counter.clone())
                            .with_label(label),
                    ),
            );
        }

        Panel::new(sub_layout)
            .title(title)
            .title_position(HAlign::Left)
    }

    pub fn set_value(&self, snapshot: &Snapshot) {
        for (counter, block) in self.counters.iter().zip(snapshot.blocks.iter()) {
            counter.set(usize::from(block.percent));
        }
    }
}
