use sysgauge_proto::RamSnapshot;

/// One horizontal bar of the dashboard: a fill ratio plus its caption.
///
/// `fill_percent` carries the raw metric value; it is not clamped here,
/// the renderer clips at the edge of its region when drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub fill_percent: f64,
    pub label: String,
}

/// One gauge per logical core, in snapshot order.
pub fn cpu_view(cpus: &[f32]) -> Vec<Gauge> {
    cpus.iter()
        .map(|&usage| Gauge {
            fill_percent: usage as f64,
            label: format!("{usage:.2}%"),
        })
        .collect()
}

/// Single gauge showing used memory against the total.
///
/// A zero total reads as an empty gauge instead of a NaN fill.
pub fn ram_view(ram: &RamSnapshot) -> Gauge {
    let fill_percent = if ram.total == 0 {
        0.0
    } else {
        ram.used as f64 / ram.total as f64 * 100.0
    };
    Gauge {
        fill_percent,
        label: format!("{:.2} GB", ram.used as f64 / 1e9),
    }
}
