//! # Example: supervised
//!
//! A [`Routine`] with prepare/cleanup hooks, a heartbeat child, a worker [`Pool`] fed from
//! the main executor, tracked children spawned through [`Handle::go`], and a `SIGHUP` trap.
//! The run ends on Ctrl-C / `SIGTERM` or after five seconds.
//!
//! ## Run
//! ```bash
//! RUST_LOG=routine=debug cargo run --example supervised
//! ```

use std::sync::Arc;
use std::time::Duration;

use routine::{
    Buffer, Command, Concurrent, Context, Error, Executor, ExecutorFn, Guarantee, LogWriter,
    Output, Pool, PoolConfig, Repeat, Routine, Signal, args,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let pool = Pool::new(
        PoolConfig::default()
            .with_running_size(2)
            .with_max_concurrency(4),
    );

    let open = {
        let pool = pool.clone();
        ExecutorFn::new(move |ctx: Context| {
            let pool = pool.clone();
            async move {
                pool.open(&ctx);
                println!("[prepare] pool open");
                Ok(())
            }
        })
    };
    let close = {
        let pool = pool.clone();
        ExecutorFn::new(move |_ctx: Context| {
            let pool = pool.clone();
            async move {
                pool.close();
                println!("[cleanup] pool closed");
                Ok(())
            }
        })
    };

    let heartbeat = Repeat::forever(
        Duration::from_secs(1),
        ExecutorFn::new(|ctx: Context| async move {
            println!("[heartbeat] #{}", ctx.repeat());
            Ok(())
        }),
    );

    let main = {
        let pool = pool.clone();
        ExecutorFn::new(move |ctx: Context| {
            let pool = pool.clone();
            async move { serve(ctx, pool).await }
        })
    };

    let res = Routine::builder(main)
        .arguments(args!["supervised"])
        .prepare(open)
        .cleanup(close)
        .go(heartbeat)
        .trace(Arc::new(LogWriter::new()))
        .signal(Signal::HANGUP, || println!("[signal] reload requested"))
        .cancel_signals([Signal::INTERRUPT, Signal::TERMINATE])
        .build()
        .execute(Context::new().with_timeout(Duration::from_secs(5)))
        .await;

    match &res {
        Ok(()) => println!("finished"),
        Err(err) => println!("finished: {err}"),
    }
    routine::Code::of(&res).into()
}

async fn serve(ctx: Context, pool: Pool) -> Result<(), Error> {
    let name = ctx
        .arguments()
        .and_then(|a| a.get::<&str>(0).copied())
        .unwrap_or("routine");

    // Fan work out through the pool and collect the results.
    let job = ExecutorFn::arc(|ctx: Context| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        println!("[pool] job done (cancelled={})", ctx.is_cancelled());
        Ok(())
    });
    let mut submissions = Vec::new();
    for _ in 0..6 {
        submissions.push(pool.go(ctx.clone(), job.clone()).await?);
    }
    for submission in submissions {
        submission.await?;
    }

    // Spawn tracked children into the running routine.
    if let Some(handle) = ctx.routine() {
        let burst = Guarantee::new(Concurrent::new(
            3,
            ExecutorFn::new(|_ctx: Context| async {
                println!("[burst] hello");
                Ok(())
            }),
        ));
        handle.go(Arc::new(burst))?;
    }

    // Run an external process and capture its output.
    let out = Buffer::new();
    Command::new("echo")
        .arg(format!("hello from {name}"))
        .stdout(Output::Capture(out.clone()))
        .execute(ctx.clone())
        .await?;
    print!("[command] {}", out.to_string_lossy());

    ctx.cancelled().await;
    Ok(())
}
