pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod fingerprint;
pub mod logging;
pub mod paths;
