//! Configuration access port trait.
//!
//! Keys are dotted paths, `section.key`, e.g. `risk.max_position_allocation`.
//! Numbers are read as strings and parsed by `config_validation`, which
//! reports malformed values instead of falling back to a default.

pub trait ConfigPort {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_bool(&self, key: &str, default: bool) -> bool;
}
