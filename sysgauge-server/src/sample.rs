use std::time::Duration;

use sysgauge_proto::{CpuSnapshot, RamSnapshot};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Reads host CPU and memory state through `sysinfo`.
#[derive(Debug)]
pub struct SystemSampler {
    system: sysinfo::System,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
        }
    }

    pub fn sample_cpus(&mut self) -> CpuSnapshot {
        self.system.refresh_cpu_all();
        self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect()
    }

    pub fn sample_ram(&mut self) -> RamSnapshot {
        self.system.refresh_memory();
        RamSnapshot {
            used: self.system.used_memory(),
            total: self.system.total_memory(),
        }
    }
}

/// Samples the host on a fixed interval and fans the snapshots out.
///
/// Send errors mean nobody is subscribed right now; the snapshot is
/// simply dropped.
pub async fn run(
    mut sampler: SystemSampler,
    cpus_tx: broadcast::Sender<CpuSnapshot>,
    ram_tx: broadcast::Sender<RamSnapshot>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.cancelled() => return,
        }

        let cpus = sampler.sample_cpus();
        let ram = sampler.sample_ram();
        trace!(cores = cpus.len(), ram_used = ram.used, "host sampled");

        let _ = cpus_tx.send(cpus);
        let _ = ram_tx.send(ram);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sample_cpus() {
        let mut sampler = SystemSampler::new();
        let _ = sampler.sample_cpus();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let snapshot = sampler.sample_cpus();

        assert!(!snapshot.is_empty());
        assert!(snapshot.iter().all(|usage| usage.is_finite()));
    }

    #[test]
    fn test_sample_ram() {
        let mut sampler = SystemSampler::new();
        let snapshot = sampler.sample_ram();

        assert!(snapshot.total > 0);
        assert!(snapshot.used <= snapshot.total);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let (cpus_tx, _) = broadcast::channel(1);
        let (ram_tx, _) = broadcast::channel(1);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run(
            SystemSampler::new(),
            cpus_tx,
            ram_tx,
            Duration::from_millis(250),
            shutdown.clone(),
        ));

        shutdown.cancel();
        task.await.unwrap();
    }
}
