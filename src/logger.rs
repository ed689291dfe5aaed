use std::fs::File;
use std::path::Path;

/// Extracts the interesting part of source paths in log lines: project files
/// are shown relative to `src/`, registry crates lose the cargo cache prefix.
fn simplify_file_path(file_path: &str) -> String {
    if file_path.contains("ccbridge") {
        if let Some(pos) = file_path.rfind("/src/") {
            return file_path[(pos + 1)..].to_string();
        }
    }

    if let Some((_, suffix)) = file_path.split_once(".cargo/registry/src/") {
        if let Some(first_slash) = suffix.find('/') {
            suffix[(first_slash + 1)..].to_string()
        } else {
            suffix.to_string()
        }
    } else {
        file_path.to_string()
    }
}

/// Console format: colored level, short time, file:line.
pub fn console_log_formatter(
    out: fern::FormatCallback,
    message: &std::fmt::Arguments,
    record: &log::Record,
) {
    let level = record.level();
    let level_color = match level {
        log::Level::Error => "\x1B[31m", // red
        log::Level::Warn => "\x1B[33m",  // yellow
        log::Level::Info => "\x1B[32m",  // green
        log::Level::Debug => "\x1B[0m",  // normal
        log::Level::Trace => "\x1B[35m", // purple
    };
    let reset = "\x1B[0m";

    out.finish(format_args!(
        "{}{}[{}] {}:{} {}{}",
        level_color,
        chrono::Local::now().format("%H:%M:%S.%3f "),
        get_level(level),
        simplify_file_path(record.file().unwrap_or("")),
        record.line().unwrap_or(0),
        message,
        reset,
    ))
}

/// File format: full date, no colors, same file:line context.
pub fn file_log_formatter(
    out: fern::FormatCallback,
    message: &std::fmt::Arguments,
    record: &log::Record,
) {
    out.finish(format_args!(
        "{}[{}] {}:{} {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        get_level(record.level()),
        simplify_file_path(record.file().unwrap_or("")),
        record.line().unwrap_or(0),
        message
    ))
}

/// Installs the global logger: console always, plus a log file when a path
/// is given.
pub fn setup_logger(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut dispatcher = fern::Dispatch::new().level(log::LevelFilter::Debug).chain(
        fern::Dispatch::new()
            .level(log::LevelFilter::Debug)
            .filter(|record| {
                record.target().contains("ccbridge") || record.level() < log::LevelFilter::Debug
            })
            .format(console_log_formatter)
            .chain(std::io::stdout()),
    );

    if let Some(path) = log_file {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        File::create(path)?;
        dispatcher = dispatcher.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(file_log_formatter)
                .chain(fern::log_file(path)?),
        );
    }

    dispatcher.apply()?;
    log::debug!("logger initialized");
    Ok(())
}

fn get_level(level: log::Level) -> String {
    match level {
        log::Level::Error => "E",
        log::Level::Warn => "W",
        log::Level::Info => "I",
        log::Level::Debug => "D",
        log::Level::Trace => "T",
    }
    .to_string()
}
