use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_dir: PathBuf,
    pub logger_level: String,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/minnow")
        } else {
            PathBuf::from("/tmp/minnow")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("minnow"),
            history_file: config_dir.join("history"),
            editor_mode: String::from("emacs"),
            logger_dir: config_dir.join("logs"),
            logger_level: String::from("warn"),
            config_dir,
        }
    }

    pub fn new() -> Self {
        dotenv().ok();

        let mut config = Config::default();

        if let Ok(editor) = env::var("MINNOW_EDITOR") {
            config.editor_mode = editor;
        }
        if let Ok(history) = env::var("MINNOW_HISTORY") {
            config.history_file = PathBuf::from(history);
        }
        if let Ok(level) = env::var("MINNOW_LOG") {
            config.logger_level = level;
        }
        if let Ok(dir) = env::var("MINNOW_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        if let Some(parent) = config.history_file.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                eprintln!("minnow: could not create {}: {}", parent.display(), err);
            }
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
