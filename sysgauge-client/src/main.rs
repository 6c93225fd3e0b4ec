#![forbid(unsafe_code)]

use std::{
    io,
    sync::{Arc, Mutex},
};

use argh::FromArgs;
use simple_logger::SimpleLogger;
use sysgauge_proto::{CPUS_ENDPOINT, CpuSnapshot, RAM_ENDPOINT, RamSnapshot};
use tokio_util::sync::CancellationToken;

use crate::screen::MountId;

mod endpoint;
mod screen;
mod stream;
mod view;

#[derive(FromArgs, Debug)]
#[argh(description = "Live CPU and RAM gauges for a sysgauge server.")]
struct ClientConfig {
    #[argh(
        positional,
        description = "server origin, e.g. http://127.0.0.1:7032"
    )]
    pub origin: String,
    #[argh(
        option,
        short = 'w',
        default = "30",
        description = "gauge bar width in terminal cells"
    )]
    pub bar_width: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new().env().init()?;

    let cfg: ClientConfig = argh::from_env();
    log::debug!("Client config: {cfg:#?}");

    let cpus_url = endpoint::endpoint_url(&cfg.origin, CPUS_ENDPOINT)?;
    let ram_url = endpoint::endpoint_url(&cfg.origin, RAM_ENDPOINT)?;

    let screen = Arc::new(Mutex::new(screen::Screen::new(io::stdout(), cfg.bar_width)));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            shutdown.cancel();
        }
    });

    let cpus_wiring = tokio::spawn(stream::run_stream(
        cpus_url,
        shutdown.clone(),
        screen.clone(),
        MountId::Cpus,
        |snapshot: &CpuSnapshot| view::cpu_view(snapshot),
    ));
    let ram_wiring = tokio::spawn(stream::run_stream(
        ram_url,
        shutdown.clone(),
        screen.clone(),
        MountId::Ram,
        |snapshot: &RamSnapshot| vec![view::ram_view(snapshot)],
    ));

    // one gauge failing must not take the other down; both run to the end
    let (cpus_res, ram_res) = tokio::join!(cpus_wiring, ram_wiring);
    for res in [cpus_res?, ram_res?] {
        if let Err(e) = res {
            log::warn!("stream wiring ended with error: {e}");
        }
    }

    Ok(())
}
