//! Configuration access port trait.
//!
//! Values come back as raw strings; typing and range checks live in
//! `domain::config_validation` so that every bad value maps to a
//! `ConfigInvalid` error naming its section and key.

use std::collections::BTreeMap;

pub trait ConfigPort {
    /// Raw value of `key` in `section`, if present.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// All keys of `section` with a value, empty when the section is absent.
    fn section(&self, section: &str) -> BTreeMap<String, String>;
}
