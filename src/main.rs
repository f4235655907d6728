use anyhow::Context;

use libradeon_top::{privilege, Config, DeviceSelector, Engine};

mod args;
use args::{AppMode, MainOpt};

const TITLE: &str = env!("TITLE");

fn main() {
    // Give up a setuid-root effective uid before anything else runs;
    // the engine re-raises it only around device setup.
    privilege::drop_effective_privileges();

    env_logger::init();

    let opt = MainOpt::parse();

    if let Err(err) = run(opt) {
        eprintln!("{TITLE}: {err:#}");
        std::process::exit(1);
    }
}

fn run(opt: MainOpt) -> anyhow::Result<()> {
    let selector = if let Some(path) = opt.device_path {
        DeviceSelector::Path(path)
    } else if let Some(pci) = opt.pci {
        DeviceSelector::Pci(pci)
    } else if let Some(bus) = opt.bus {
        DeviceSelector::Bus(bus)
    } else {
        DeviceSelector::Auto
    };

    let config = Config {
        ticks_per_second: opt.ticks,
        // in dump mode every line covers one dump interval
        window_secs: match &opt.app_mode {
            AppMode::Dump(_) => opt.dump_interval,
            AppMode::Tui => 1,
        },
        selector,
        force_mem: opt.force_mem,
    };

    let engine = Engine::start(config).context("could not start monitoring")?;

    match opt.app_mode {
        AppMode::Tui => {
            #[cfg(feature = "tui")]
            radeon_top_tui::run(TITLE, engine, opt.color);

            #[cfg(not(feature = "tui"))]
            {
                let _ = engine;
                anyhow::bail!("\"tui\" feature is not enabled for this build, use -d/--dump");
            }
        },
        AppMode::Dump(target) => {
            #[cfg(feature = "json")]
            radeon_top_json::DumpApp::new(TITLE, engine, &target, opt.dump_interval, opt.limit)
                .with_context(|| format!("could not open the dump target {target:?}"))?
                .run()
                .context("dump failed")?;

            #[cfg(not(feature = "json"))]
            {
                let _ = (engine, target);
                anyhow::bail!("\"json\" feature is not enabled for this build.");
            }
        },
    }

    Ok(())
}
