//! Shared default providers for domain configs

pub fn default_true() -> bool {
    true
}

pub fn default_false() -> bool {
    false
}
