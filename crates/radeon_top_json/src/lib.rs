use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use serde_json::{json, Value};

use libradeon_top::Engine;

mod output_json;
pub use output_json::OutputJson;

/// Dump loop: one JSON line per dump interval, to a file or stdout.
pub struct DumpApp {
    engine: Engine,
    writer: Box<dyn Write>,
    interval: Duration,
    /// Stop after this many lines, 0 for forever.
    limit: u32,
    title: String,
}

impl DumpApp {
    /// `target` is a file path, or `-` for stdout.
    pub fn new(
        title: &str,
        engine: Engine,
        target: &str,
        interval_secs: u32,
        limit: u32,
    ) -> io::Result<Self> {
        let writer: Box<dyn Write> = if target == "-" {
            Box::new(io::stdout())
        } else {
            Box::new(File::create(target)?)
        };

        Ok(Self {
            engine,
            writer,
            interval: Duration::from_secs(interval_secs.into()),
            limit,
            title: title.to_string(),
        })
    }

    fn json(&self) -> Value {
        json!({
            "title": self.title,
            "device": self.engine.device_info().json(),
            "snapshot": self.engine
                .latest_snapshot()
                .map_or(Value::Null, |snapshot| snapshot.json()),
        })
    }

    /// Run until the line limit is reached, then stop the engine.
    pub fn run(mut self) -> io::Result<()> {
        let mut n = 0u32;

        loop {
            std::thread::sleep(self.interval);

            let line = self.json().to_string();
            writeln!(self.writer, "{line}")?;
            self.writer.flush()?;

            if self.limit != 0 {
                n += 1;
                if n == self.limit {
                    break;
                }
            }
        }

        self.engine.stop();

        Ok(())
    }
}
