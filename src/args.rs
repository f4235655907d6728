use std::path::PathBuf;

use libradeon_top::{PciAddress, DEFAULT_TICKS_PER_SECOND};

pub struct MainOpt {
    pub bus: Option<u8>,
    pub pci: Option<PciAddress>,
    pub device_path: Option<PathBuf>,
    pub force_mem: bool,
    pub ticks: u32,
    pub dump_interval: u32, // sec
    pub limit: u32,
    pub color: bool,
    pub app_mode: AppMode,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AppMode {
    Tui,
    /// Dump target, a file path or `-` for stdout.
    Dump(String),
}

impl Default for MainOpt {
    fn default() -> Self {
        Self {
            bus: None,
            pci: None,
            device_path: None,
            force_mem: false,
            ticks: DEFAULT_TICKS_PER_SECOND,
            dump_interval: 1, // sec
            limit: 0,
            color: false,
            app_mode: AppMode::Tui,
        }
    }
}

const HELP_MSG: &str = concat!(
    env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), "\n",
    env!("CARGO_PKG_HOMEPAGE"), "\n",
    "\n",
    "USAGE:\n",
    "    <", env!("CARGO_PKG_NAME"), "> [options ..]\n",
    "\n",
    "FLAGS:\n",
    "   -c, --color\n",
    "       Enable colors in the TUI.\n",
    "   -m, --mem\n",
    "       Force access to the registers through /dev/mem instead of the\n",
    "       PCI resource files.\n",
    "   -v, --version\n",
    "       Print version information.\n",
    "   -h, --help\n",
    "       Print help information.\n",
    "\n",
    "OPTIONS:\n",
    "   -b, --bus <hex>\n",
    "       Select the GPU on this PCI bus number.\n",
    "   --pci <String>\n",
    "       Select the GPU at this PCI bus address,\n",
    "       e.g. \"0000:03:00.0\"\n",
    "   -p, --path <Path>\n",
    "       Monitor the device behind this sysfs path,\n",
    "       e.g. /sys/bus/pci/devices/0000:03:00.0\n",
    "   -t, --ticks <u32>\n",
    "       Samples per second. (default: 120)\n",
    "   -d, --dump <file>\n",
    "       Dump data to this file, \"-\" for stdout.\n",
    "   -i, --dump-interval <u32>\n",
    "       Number of seconds between dumps. (default: 1)\n",
    "   -l, --limit <u32>\n",
    "       Quit after dumping N lines. (default: forever)\n",
);

impl MainOpt {
    pub fn parse() -> Self {
        let mut opt = Self::default();
        let mut skip = false;

        let args = &std::env::args().skip(1).collect::<Vec<String>>();

        for (idx, arg) in args.iter().enumerate() {
            if skip {
                skip = false;
                continue;
            }

            if !arg.starts_with('-') {
                eprintln!("Unknown option: {arg}");
                continue;
            }

            match arg.as_str() {
                "-b" | "--bus" => {
                    let val_str = args.get(idx+1).unwrap_or_else(|| {
                        eprintln!("missing argument: \"-b <hex>\"");
                        std::process::exit(1);
                    });
                    opt.bus = {
                        let bus = u8::from_str_radix(val_str, 16).unwrap_or_else(|_| {
                            eprintln!("Failed to parse from {val_str:?} to a PCI bus number");
                            std::process::exit(1);
                        });
                        Some(bus)
                    };
                    skip = true;
                },
                "--pci" => {
                    let s = args.get(idx+1).unwrap_or_else(|| {
                        eprintln!("missing argument: \"--pci <String>\"");
                        std::process::exit(1);
                    });
                    opt.pci = {
                        let pci = s.parse::<PciAddress>().unwrap_or_else(|_| {
                            eprintln!("Failed to parse from {s:?} to a PCI bus address");
                            std::process::exit(1);
                        });
                        Some(pci)
                    };
                    skip = true;
                },
                "-p" | "--path" => {
                    if let Some(val_str) = args.get(idx+1) {
                        opt.device_path = Some(PathBuf::from(val_str));
                        skip = true;
                    } else {
                        eprintln!("missing argument: \"-p <Path>\"");
                        std::process::exit(1);
                    }
                },
                "-t" | "--ticks" => {
                    if let Some(val_str) = args.get(idx+1) {
                        opt.ticks = val_str.parse::<u32>().unwrap_or_else(|_| {
                            eprintln!("Failed to parse from {val_str:?} to u32");
                            std::process::exit(1);
                        });
                        skip = true;
                    } else {
                        eprintln!("missing argument: \"-t <u32>\"");
                        std::process::exit(1);
                    }
                },
                "-d" | "--dump" => {
                    #[cfg(feature = "json")]
                    {
                        let s = if let Some(val_str) = args.get(idx+1) {
                            skip = true;
                            String::from(val_str)
                        } else {
                            eprintln!("missing argument: \"-d <file>\"");
                            std::process::exit(1);
                        };

                        opt.app_mode = AppMode::Dump(s);
                    }
                    #[cfg(not(feature = "json"))]
                    {
                        eprintln!("\"json\" feature is not enabled for this build.");
                        std::process::exit(1);
                    }
                },
                "-i" | "--dump-interval" => {
                    if let Some(val_str) = args.get(idx+1) {
                        let tmp = val_str.parse::<u32>().unwrap_or_else(|_| {
                            eprintln!("Failed to parse from {val_str:?} to u32");
                            std::process::exit(1);
                        });

                        // a dump faster than once per second is meaningless
                        opt.dump_interval = tmp.max(1);

                        skip = true;
                    } else {
                        eprintln!("missing argument: \"-i <u32>\"");
                        std::process::exit(1);
                    }
                },
                "-l" | "--limit" => {
                    if let Some(val_str) = args.get(idx+1) {
                        opt.limit = val_str.parse::<u32>().unwrap_or_else(|_| {
                            eprintln!("Failed to parse from {val_str:?} to u32");
                            std::process::exit(1);
                        });
                        skip = true;
                    } else {
                        eprintln!("missing argument: \"-l <u32>\"");
                        std::process::exit(1);
                    }
                },
                "-m" | "--mem" => {
                    opt.force_mem = true;
                },
                "-c" | "--color" => {
                    opt.color = true;
                },
                "-v" | "--version" => {
                    println!("{}", env!("TITLE"));
                    std::process::exit(0);
                },
                "-h" | "--help" => {
                    println!("{HELP_MSG}");
                    std::process::exit(0);
                },
                _ => {
                    eprintln!("Unknown option: {arg}");
                    std::process::exit(1);
                },
            }
        }

        opt
    }
}
