//! Sample extension module.
//!
//! Exports two extensions:
//! - `Greeter`: prints a configurable greeting and counts how often it ran
//!   (`configs/Greeter.json`)
//! - `Ticker`: counts ticks on a background thread while running and records
//!   the total on unload (`configs/Ticker.yaml`)
//!
//! Build with `cargo build -p plughost-sample-extension` and copy the
//! resulting library into the host's `plugins` directory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use plughost_extension_sdk::export_extensions;
use plughost_extension_sdk::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GreeterJsonConfig {
    pub greeting: String,
    pub run_count: u32,
}

impl Default for GreeterJsonConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello from plughost".to_string(),
            run_count: 0,
        }
    }
}

impl ExtensionConfig for GreeterJsonConfig {}

/// Greets on start and says goodbye on stop.
#[derive(Default)]
pub struct Greeter {
    config: TypedConfig<GreeterJsonConfig>,
}

#[async_trait]
impl Extension for Greeter {
    fn config(&self) -> Option<&dyn ConfigDocument> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigDocument> {
        Some(&mut self.config)
    }

    async fn on_init(&mut self) -> HookResult {
        if self.config.get().greeting.trim().is_empty() {
            return Err(HookError::failed("greeting must not be empty"));
        }
        self.config.get_mut().run_count += 1;
        Ok(())
    }

    async fn load(&mut self, _cancel: CancellationToken) -> HookResult {
        let config = self.config.get();
        println!("[Greeter] {} (run #{})", config.greeting, config.run_count);
        Ok(())
    }

    async fn unload(&mut self, _cancel: CancellationToken) -> HookResult {
        println!("[Greeter] Goodbye");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TickerYamlConfig {
    pub interval_ms: u64,
    pub total_ticks: u64,
}

impl Default for TickerYamlConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            total_ticks: 0,
        }
    }
}

impl ExtensionConfig for TickerYamlConfig {}

/// Counts ticks on a plain thread between `load` and `unload`.
///
/// The thread waits on a channel between ticks, so `unload` wakes it at once
/// and the join returns without waiting out the interval. Host cancellation
/// is noticed at the next tick.
#[derive(Default)]
pub struct Ticker {
    config: TypedConfig<TickerYamlConfig>,
    ticks: Arc<AtomicU64>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Extension for Ticker {
    fn config(&self) -> Option<&dyn ConfigDocument> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigDocument> {
        Some(&mut self.config)
    }

    async fn load(&mut self, cancel: CancellationToken) -> HookResult {
        let interval = Duration::from_millis(self.config.get().interval_ms.max(1));
        let ticks = Arc::clone(&self.ticks);
        let (stop, wake) = mpsc::channel::<()>();

        let worker = std::thread::Builder::new()
            .name("ticker".to_string())
            .spawn(move || loop {
                match wake.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) if !cancel.is_cancelled() => {
                        ticks.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => break,
                }
            })?;

        self.stop = Some(stop);
        self.worker = Some(worker);
        Ok(())
    }

    async fn unload(&mut self, _cancel: CancellationToken) -> HookResult {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| HookError::failed("ticker thread panicked"))?;
        }
        self.config.get_mut().total_ticks += self.ticks.swap(0, Ordering::Relaxed);
        Ok(())
    }
}

export_extensions!(Greeter::default(), Ticker::default());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_config_kinds() {
        let greeter: BoxedExtension = Box::new(Greeter::default());
        let ticker: BoxedExtension = Box::new(Ticker::default());

        assert_eq!(greeter.name(), "Greeter");
        assert_eq!(greeter.config().unwrap().type_hint(), "GreeterJsonConfig");
        assert_eq!(ticker.name(), "Ticker");
        assert_eq!(ticker.config().unwrap().type_hint(), "TickerYamlConfig");
    }

    #[test]
    fn test_exported_entry_points() {
        assert_eq!(plughost_abi_version(), plughost_extension_sdk::ABI_VERSION);

        let raw = plughost_create_extensions();
        assert!(!raw.is_null());
        let batch = unsafe { *Box::from_raw(raw) };
        let names: Vec<String> = batch
            .into_inner()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["Greeter", "Ticker"]);
    }

    #[tokio::test]
    async fn test_greeter_rejects_empty_greeting() {
        let mut greeter = Greeter::default();
        greeter
            .config_mut()
            .unwrap()
            .decode("json", br#"{"greeting":"  "}"#)
            .unwrap();

        assert!(greeter.on_init().await.is_err());
    }

    #[tokio::test]
    async fn test_ticker_unload_does_not_wait_out_interval() {
        let mut ticker = Ticker::default();
        ticker
            .config_mut()
            .unwrap()
            .decode("yaml", b"intervalMs: 60000\n")
            .unwrap();

        ticker.load(CancellationToken::new()).await.unwrap();
        let started = std::time::Instant::now();
        ticker.unload(CancellationToken::new()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ticker.ticks(), 0);
    }

    #[tokio::test]
    async fn test_ticker_records_ticks_on_unload() {
        let mut ticker = Ticker::default();
        ticker
            .config_mut()
            .unwrap()
            .decode("yaml", b"intervalMs: 1\ntotalTicks: 10\n")
            .unwrap();

        ticker.load(CancellationToken::new()).await.unwrap();
        while ticker.ticks() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        ticker.unload(CancellationToken::new()).await.unwrap();

        let saved: TickerYamlConfig =
            serde_yaml::from_slice(&ticker.config().unwrap().encode("yaml").unwrap()).unwrap();
        assert!(saved.total_ticks > 10);
        assert_eq!(ticker.ticks(), 0);
    }
}
