use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Opt-in plain-text transcript of the conversation, appended as it happens.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    /// Logging starts active when a file is given up front.
    pub fn new(log_file: Option<PathBuf>) -> io::Result<Self> {
        let mut log = TranscriptLog {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> io::Result<String> {
        // Fail early if the file can't be created or appended to.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle(&mut self) -> Result<String, String> {
        let Some(path) = &self.file_path else {
            return Err(
                "No log file specified. Use /log <filename> to enable logging first.".to_string(),
            );
        };
        let path = path.display().to_string();

        if self.is_active {
            self.log_message("##", "Logging paused")
                .map_err(|err| format!("Failed to write to log: {err}"))?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {path})"))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {path}"))
        }
    }

    /// Append `content` under a `speaker:` prefix followed by a blank line.
    pub fn log_message(&self, speaker: &str, content: &str) -> io::Result<()> {
        let Some(path) = self.file_path.as_ref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for line in format!("{speaker} {content}").lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn status(&self) -> String {
        let file_name = |path: &Path| {
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }
}
