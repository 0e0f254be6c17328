#![warn(missing_docs)]
#![forbid(unsafe_code)]
//! Helpers shared by the test suites of the xmlbuilder crates.
//!
//! Call [`setup`] at the top of every test. It installs a tracing subscriber
//! once per process; set `XMLBUILDER_LOG` (tracing `Targets` syntax, e.g.
//! `xmlbuilder_tree=trace,xmlbuilder=debug`) to narrow the output.

use std::sync::LazyLock;
use std::time::Instant;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

struct Uptime;

impl FormatTime for Uptime {
    fn format_time(&self, w: &mut Writer<'_>) -> core::fmt::Result {
        let elapsed = START_TIME.elapsed();
        write!(w, "{:4}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
    }
}

static SUBSCRIBER_INIT: LazyLock<()> = LazyLock::new(|| {
    let _ = *START_TIME;

    let filter = std::env::var("XMLBUILDER_LOG")
        .ok()
        .and_then(|s| s.parse::<Targets>().ok())
        .unwrap_or_else(|| Targets::new().with_default(tracing::Level::DEBUG));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_timer(Uptime)
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .with(filter)
        .try_init()
        .ok();
});

/// Set up a tracing subscriber for tests.
///
/// Safe to call from every test; the subscriber is only installed once.
pub fn setup() {
    #[allow(clippy::let_unit_value)]
    let _ = *SUBSCRIBER_INIT;
}

/// Collapse every run of whitespace between tags, so two documents that only
/// differ in indentation compare equal.
pub fn squash_whitespace(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut pending = String::new();
    let mut after_tag = true;

    for ch in xml.chars() {
        if ch.is_whitespace() {
            pending.push(ch);
            continue;
        }
        if !(after_tag && ch == '<') {
            out.push_str(&pending);
        }
        pending.clear();
        after_tag = ch == '>';
        out.push(ch);
    }
    if !after_tag {
        out.push_str(&pending);
    }
    out
}
