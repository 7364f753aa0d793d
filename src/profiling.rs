//! Feature-gated profiling support via `tracing-chrome`.
//!
//! With the `profiling` feature, [`init`] installs a Chrome trace subscriber
//! writing `trace.json` in the current directory, and every WAV pair
//! conversion is recorded as a `wav_to_ibm` span. Open the file in
//! `chrome://tracing` or [Perfetto](https://ui.perfetto.dev).
//!
//! Without the feature, [`init`] returns `None` and installs nothing.

/// Guard that flushes the trace file on drop.
#[cfg(feature = "profiling")]
pub struct ProfilingGuard {
    _guard: tracing_chrome::FlushGuard,
}

/// Zero-size stand-in when profiling is disabled.
#[cfg(not(feature = "profiling"))]
pub struct ProfilingGuard;

/// Initialize the Chrome tracing layer.
///
/// Returns `Some(guard)` when the `profiling` feature is active. Hold the
/// guard until the end of the program; the trace is written when it drops.
pub fn init() -> Option<ProfilingGuard> {
    #[cfg(feature = "profiling")]
    {
        use tracing_chrome::ChromeLayerBuilder;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let (chrome_layer, guard) = ChromeLayerBuilder::new()
            .file("trace.json")
            .include_args(true)
            .build();

        tracing_subscriber::registry().with(chrome_layer).init();

        tracing::info!("Profiling enabled, writing trace.json");
        Some(ProfilingGuard { _guard: guard })
    }

    #[cfg(not(feature = "profiling"))]
    {
        None
    }
}
