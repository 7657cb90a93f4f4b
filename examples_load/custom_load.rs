use std::sync::Arc;
use std::time::Instant;

use tracing_log_envelope::caller;
use tracing_log_envelope::init::Logger;
use tracing_log_envelope::noop_sink::NoopSink;
use tracing_log_envelope::record::Severity;
use tracing_log_envelope::response::{Responder, ResponseStatus};

fn main() {
    // Drop every record to measure the envelope and layer on their own.
    let sink = Arc::new(NoopSink::default());
    let responder = Responder::new(Logger::with_sink("load", sink, Severity::Info));

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        responder.respond(&caller!(), ResponseStatus::Error, "custom load test error", Some(i));
    }

    let elapsed = start.elapsed();
    println!("noop sink: built {} envelopes in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}
