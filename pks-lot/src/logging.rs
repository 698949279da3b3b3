//! Tracing setup
//!
//! The subscriber is installed before the bootstrap config is read, at the
//! compiled default level, so config-loading warnings are not lost. Once the
//! config is known its level is swapped in through the reload handle.
//! `RUST_LOG` overrides both.

use pks_common::config::CompiledDefaults;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter directives for this service at `level`
pub fn directives(level: &str) -> String {
    format!("pks_lot={level},pks_common={level},tower_http=info", level = level)
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| directives(level).into())
}

/// Registry with a reloadable filter and a fmt layer writing to `writer`
pub fn subscriber<W>(level: &str, writer: W) -> (impl Subscriber + Send + Sync + 'static, FilterHandle)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(filter_for(level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer));
    (subscriber, handle)
}

/// Install the global subscriber at the compiled default level
pub fn init() -> FilterHandle {
    let defaults = CompiledDefaults::for_current_platform();
    let (subscriber, handle) = subscriber(&defaults.log_level, std::io::stdout);
    subscriber.init();
    handle
}

/// Switch to the configured level
pub fn apply_level(handle: &FilterHandle, level: &str) -> Result<(), reload::Error> {
    handle.reload(filter_for(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pks_common::config::load_toml_config;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_directives_cover_both_crates() {
        assert_eq!(directives("debug"), "pks_lot=debug,pks_common=debug,tower_http=info");
    }

    #[test]
    fn test_missing_config_warning_is_logged_before_level_applied() {
        let out = Captured::default();
        let writer = out.clone();
        let (subscriber, handle) = subscriber("info", move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            let dir = tempfile::TempDir::new().unwrap();
            let config = load_toml_config(Some(&dir.path().join("lot.toml"))).unwrap();
            assert_eq!(config.logging.level, "info");

            apply_level(&handle, "error").unwrap();
            tracing::warn!("below the configured level");
        });

        let text = out.text();
        assert!(text.contains("Config file not found"), "captured: {}", text);
        assert!(!text.contains("below the configured level"), "captured: {}", text);
    }
}
