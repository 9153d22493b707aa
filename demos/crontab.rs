//! # Example: crontab
//!
//! Registers three jobs on a [`Crontab`]: a one-shot job, a fixed-interval job and a
//! minutely cron job, then closes the crontab after a few seconds (or on Ctrl-C).
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example crontab
//! ```

use std::time::Duration;

use routine::{Context, Crontab, Error, ExecutorFn, PoolConfig, args};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let crontab = Crontab::new(PoolConfig::default().with_max_concurrency(4));
    let ctx = Context::new().with_tracker();
    crontab.open(&ctx);

    let hello = ExecutorFn::arc(|ctx: Context| async move {
        let who = ctx
            .arguments()
            .and_then(|a| a.get::<&str>(0).copied())
            .unwrap_or("nobody");
        println!("[once] hello, {who}");
        Ok(())
    });
    crontab.now(hello).go(&ctx, args!["crontab"]).await?;

    let tick = ExecutorFn::arc(|_ctx: Context| async move {
        println!("[every] tick");
        Ok(())
    });
    crontab
        .every(Duration::from_millis(700), tick)
        .go(&ctx, args![])
        .await?;

    let minutely = ExecutorFn::arc(|ctx: Context| async move {
        println!("[cron] fired at {:?}", ctx.fire_time());
        Ok(())
    });
    let job = crontab.job("* * * * *", minutely)?;
    println!("[cron] next fire: {:?}", job.next(chrono::Local::now()));
    job.go(&ctx, args![]).await?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(3)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    crontab.close();
    ctx.cancel();
    ctx.join().await;
    println!("done");
    Ok(())
}
