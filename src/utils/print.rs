//! Helper macros for logging (console printing).

/// Log TRACE message, optionally with a parenthesized prefix.
///
/// Example:
/// ```no_run
/// pf_trace!(id; "got {} to print", msg);
/// ```
#[macro_export]
macro_rules! pf_trace {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::trace!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::trace!($fmt_str $($fmt_arg)*)
    };
}

/// Log DEBUG message, optionally with a parenthesized prefix.
///
/// Example:
/// ```no_run
/// pf_debug!(id; "got {} to print", msg);
/// ```
#[macro_export]
macro_rules! pf_debug {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::debug!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::debug!($fmt_str $($fmt_arg)*)
    };
}

/// Log INFO message, optionally with a parenthesized prefix.
///
/// Example:
/// ```no_run
/// pf_info!(id; "got {} to print", msg);
/// ```
#[macro_export]
macro_rules! pf_info {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::info!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::info!($fmt_str $($fmt_arg)*)
    };
}

/// Log WARN message, optionally with a parenthesized prefix.
///
/// Example:
/// ```no_run
/// pf_warn!(id; "got {} to print", msg);
/// ```
#[macro_export]
macro_rules! pf_warn {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::warn!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::warn!($fmt_str $($fmt_arg)*)
    };
}

/// Log ERROR message, optionally with a parenthesized prefix.
///
/// Example:
/// ```no_run
/// pf_error!(id; "got {} to print", msg);
/// ```
#[macro_export]
macro_rules! pf_error {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        log::error!(concat!("({}) ", $fmt_str), $prefix $($fmt_arg)*)
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        log::error!($fmt_str $($fmt_arg)*)
    };
}

/// Log an error string to logger and then return a `TaglogError`
/// containing the string.
///
/// Example:
/// ```no_run
/// let e = logged_err!(id; "got {} to print", msg);
/// ```
#[macro_export]
macro_rules! logged_err {
    ($prefix:expr; $fmt_str:literal $($fmt_arg:tt)*) => {
        {
            pf_error!($prefix; $fmt_str $($fmt_arg)*);
            Err($crate::utils::TaglogError::Msg(format!(
                concat!("({}) ", $fmt_str),
                $prefix $($fmt_arg)*
            )))
        }
    };

    ($fmt_str:literal $($fmt_arg:tt)*) => {
        {
            pf_error!($fmt_str $($fmt_arg)*);
            Err($crate::utils::TaglogError::Msg(format!(
                $fmt_str $($fmt_arg)*
            )))
        }
    };
}

#[cfg(test)]
mod print_tests {
    use crate::tags::{Tag, TagLocality, Uid};
    use crate::utils::TaglogError;

    #[test]
    fn error_with_debug_id_prefix() {
        let dbgid = Uid(0xfeed, 0x17);
        assert_eq!(
            logged_err!(dbgid; "epoch end version not yet computed"),
            Err::<(), TaglogError>(TaglogError::Msg(format!(
                "({}) epoch end version not yet computed",
                dbgid
            )))
        );
        assert_eq!(
            logged_err!("router"; "rejoin from an unknown log server"),
            Err::<(), TaglogError>(TaglogError::Msg(
                "(router) rejoin from an unknown log server".into()
            ))
        );
    }

    #[test]
    fn error_with_format_args() {
        let tag = Tag::new(TagLocality::Primary, 17);
        assert_eq!(
            logged_err!(3; "no generation covers {} below {}", tag, 150),
            Err::<(), TaglogError>(TaglogError::Msg(
                "(3) no generation covers primary:17 below 150".into()
            ))
        );
        assert_eq!(
            logged_err!("lock reply missing from server {}", 2),
            Err::<(), TaglogError>(TaglogError::Msg(
                "lock reply missing from server 2".into()
            ))
        );
    }
}
