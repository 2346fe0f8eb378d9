use env_logger::{Logger, Target};
use log::{Log, Metadata, Record, SetLoggerError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

/// Appends formatted records to `<config dir>/kanbanx/logs/kanbanx.log`.
struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kanbanx")
            .join("logs")
            .join("kanbanx.log");
        let file = Self::open(&path).ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn append_line(&self, line: &str) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_none() {
            match Self::open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(_) => return,
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.write_all(b"\n");
            let _ = file.flush();
        }
    }
}

static LOG_FILE: LazyLock<LogFile> = LazyLock::new(LogFile::new);

fn format_log_line(timestamp_ms: i64, level: &str, target: &str, message: &str) -> String {
    format!(
        "{} [{}] [{}] {}",
        timestamp_ms,
        level.to_uppercase(),
        target,
        message.replace('\n', "\\n")
    )
}

/// Filters through env_logger and mirrors accepted records to stderr and
/// the log file.
struct FileLogger {
    inner: Logger,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);
        let line = format_log_line(
            chrono::Utc::now().timestamp_millis(),
            record.level().as_str(),
            record.target(),
            &record.args().to_string(),
        );
        LOG_FILE.append_line(&line);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

pub fn init() -> Result<(), SetLoggerError> {
    let _ = &*LOG_FILE;
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.target(Target::Stderr);
    let logger = Box::leak(Box::new(FileLogger {
        inner: builder.build(),
    }));
    log::set_logger(logger)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

pub fn log_file_path() -> String {
    LOG_FILE.path.display().to_string()
}

/// For failures before the logger is installed.
pub fn write_fallback_line(message: &str) {
    let line = format_log_line(chrono::Utc::now().timestamp_millis(), "error", "kanbanx.log_bridge", message);
    eprintln!("{}", line);
    LOG_FILE.append_line(&line);
}
