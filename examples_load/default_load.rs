use std::time::Instant;

use tracing_log_envelope::response::ResponseStatus;
use tracing_log_envelope::{get_logger, resp};

fn handle_request(i: u64) {
    if i % 10 == 0 {
        resp!(ResponseStatus::Warning, format!("request {} was slow", i));
    } else {
        resp!(ResponseStatus::Success, "request handled", i);
    }
}

fn main() {
    let logger = get_logger().expect("set up log/Today.log");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        handle_request(i);
    }

    let elapsed = start.elapsed();
    println!("default config: built {} envelopes in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.flush().expect("flush log file");
}
