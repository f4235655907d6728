fn main() {
    const BASE: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

    let debug = if cfg!(debug_assertions) { " (debug build)" } else { "" };
    let title = format!("{BASE}{debug}");

    println!("cargo:rustc-env=TITLE={title}");
}
