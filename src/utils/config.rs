//! Configuration parameters struct parsing helper.

/// Composes a configuration struct from its default values, then overwrites
/// given fields by parsing from given TOML string if it's not `None`. Returns
/// an `Ok(config)` on success, and `Err(TaglogError)` on parser failure.
///
/// Example:
/// ```no_run
/// let knobs = parsed_config!(config_str => Knobs; pop_delay, tlog_timeout)?;
/// ```
#[macro_export]
macro_rules! parsed_config {
    ($config_str:expr => $config_type:ty; $($field:ident),+) => {{
        let config_str: Option<&str> = $config_str;

        // closure helper for easier error returning
        let compose_config = || -> Result<$config_type, TaglogError> {
            let mut config: $config_type = Default::default();
            if config_str.is_none() {
                return Ok(config);
            }

            let mut table = config_str.unwrap().parse::<toml::Table>()?;

            // traverse through all given field names
            $({
                // if field name found in table (and removed)
                if let Some(v) = table.remove(stringify!($field)) {
                    config.$field = v.try_into()?;
                }
            })+

            // if table is not empty at this time, some parsed keys are not
            // expected hence invalid
            if !table.is_empty() {
                return Err(TaglogError::Msg(format!(
                    "invalid field name '{}' in config",
                    table.keys().next().unwrap(),
                )));
            }

            Ok(config)
        };

        compose_config()
    }};
}

#[cfg(test)]
mod config_tests {
    use crate::utils::TaglogError;

    // a slice of the log-system tuning surface, enough to exercise the
    // default / override / rejection paths
    #[derive(Debug, PartialEq)]
    struct PopTuning {
        pop_delay: f64,
        router_pop_delay: f64,
        store_dir: String,
    }

    impl Default for PopTuning {
        fn default() -> Self {
            PopTuning {
                pop_delay: 1.0,
                router_pop_delay: 0.0,
                store_dir: "tlog-data".into(),
            }
        }
    }

    #[test]
    fn defaults_when_unconfigured() -> Result<(), TaglogError> {
        let tuning = parsed_config!(None => PopTuning;
                                    pop_delay, router_pop_delay, store_dir)?;
        assert_eq!(tuning, PopTuning::default());
        Ok(())
    }

    #[test]
    fn partial_override_keeps_rest() -> Result<(), TaglogError> {
        let config_str = Some("router_pop_delay = 0.25");
        let tuning = parsed_config!(config_str => PopTuning;
                                    pop_delay, router_pop_delay)?;
        assert_eq!(tuning.router_pop_delay, 0.25);
        assert_eq!(tuning.pop_delay, 1.0);
        assert_eq!(tuning.store_dir, "tlog-data");
        Ok(())
    }

    #[test]
    fn unknown_knob_rejected() {
        let config_str = Some("max_peek_bytes = 65536");
        assert!(
            parsed_config!(config_str => PopTuning; pop_delay).is_err()
        );
    }
}
