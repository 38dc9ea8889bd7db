//! Configuration access port trait.
//!
//! Values are looked up by `[section] key`. Typed getters fall back to the
//! supplied default when a key is absent or unparseable.

use std::path::PathBuf;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Non-empty string value, with surrounding whitespace removed.
    fn get_trimmed(&self, section: &str, key: &str) -> Option<String> {
        self.get_string(section, key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_trimmed(section, key).map(PathBuf::from)
    }
}
