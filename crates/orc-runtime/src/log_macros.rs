/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field automatically so callers never need to
/// remember the string literal. Domains in use: `plan`, `sched`, `exec`,
/// `qc`, `vcs`, `sys`.
///
/// # Usage
///
/// ```ignore
/// use crate::log_macros::*;
///
/// orc_info!(sys, waves = waves.len(), "plan admitted");
/// orc_warn!(exec, task = %task_number, "retrying after RED");
/// orc_debug!(vcs, files = changed.len(), "isolation audit diff");
/// ```
///
/// The macros accept any tracing-compatible field syntax after the domain
/// identifier. The domain identifier is **not** a string — it is a bare
/// identifier that the macro converts to a `&str` literal.

// ---------------------------------------------------------------------------
// Core macro — dispatches to the matching tracing level macro.
// ---------------------------------------------------------------------------

/// Internal helper. Do not call directly; use `orc_error!` … `orc_trace!`.
#[doc(hidden)]
macro_rules! orc_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

// ---------------------------------------------------------------------------
// Public per-level macros
// ---------------------------------------------------------------------------

/// Log at ERROR level with an automatic `domain` field.
macro_rules! orc_error {
    ($domain:ident, $($rest:tt)*) => {
        orc_log!(error, $domain, $($rest)*)
    };
}

/// Log at WARN level with an automatic `domain` field.
macro_rules! orc_warn {
    ($domain:ident, $($rest:tt)*) => {
        orc_log!(warn, $domain, $($rest)*)
    };
}

/// Log at INFO level with an automatic `domain` field.
macro_rules! orc_info {
    ($domain:ident, $($rest:tt)*) => {
        orc_log!(info, $domain, $($rest)*)
    };
}

/// Log at DEBUG level with an automatic `domain` field.
macro_rules! orc_debug {
    ($domain:ident, $($rest:tt)*) => {
        orc_log!(debug, $domain, $($rest)*)
    };
}

/// Log at TRACE level with an automatic `domain` field.
#[allow(unused_macros)]
macro_rules! orc_trace {
    ($domain:ident, $($rest:tt)*) => {
        orc_log!(trace, $domain, $($rest)*)
    };
}
