//! # Example: quickstart
//!
//! Composes a flaky executor with [`Retry`], [`Backoff`] and [`Timeout`] and runs it as the
//! main executor of a [`Routine`] with a [`LogWriter`] trace sink.
//!
//! ## Flow
//! ```text
//! Routine::execute()
//!   ├─► RoutineStarting
//!   ├─► Timeout(2s)
//!   │     └─► Retry(4)
//!   │           └─► Backoff(50ms × 2^n)
//!   │                 └─► flaky: fails twice, then succeeds
//!   ├─► MainExited
//!   ├─► AllJoined
//!   └─► RoutineStopped
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example quickstart
//! ```

use std::sync::Arc;
use std::time::Duration;

use routine::{
    Backoff, BackoffPolicy, Code, Context, Error, ExecutorFn, JitterPolicy, LogWriter, Retry,
    Routine, Timeout,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let flaky = ExecutorFn::new(|ctx: Context| async move {
        println!("[flaky] attempt {}", ctx.retry());
        if ctx.retry() <= 2 {
            return Err(Error::failed(format!("boom #{}", ctx.retry())));
        }
        println!("[flaky] success");
        Ok(())
    });

    let policy = BackoffPolicy {
        first: Duration::from_millis(50),
        max: Duration::from_millis(500),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    };
    let main = Timeout::new(
        Duration::from_secs(2),
        Retry::new(4, Backoff::new(policy, flaky)),
    );

    let res = Routine::builder(main)
        .with_default_interrupts()
        .trace(Arc::new(LogWriter::new()))
        .build()
        .execute(Context::new())
        .await;

    let code = Code::of(&res);
    println!("exit: {code}");
    code.into()
}
