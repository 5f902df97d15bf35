use env_logger::Env;
use std::io::Write;

/// Installs the process logger. `level` wins over `RUST_LOG`; with neither
/// set the filter is `info`.
pub fn init_logging(level: Option<&str>) {
    let env = Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(level) = level {
        builder.parse_filters(level);
    }

    if builder
        .format(|buf, record| {
            let t = chrono::Local::now();
            writeln!(
                buf,
                "{} {:<5} {} {}",
                t.format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .is_err()
    {
        log::warn!("Unable to initialize logging, it is already initialized");
    }
}
