use std::io::{self, Write};

use crate::view::Gauge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountId {
    Cpus,
    Ram,
}

/// The terminal frame: two fixed mount regions, `cpus` stacked above
/// `ram`. Rendering into a mount replaces that mount's contents and
/// repaints the whole frame in place; nothing is diffed or carried
/// over between frames.
#[derive(Debug)]
pub struct Screen<W> {
    out: W,
    bar_width: usize,
    cpus: Vec<String>,
    ram: Vec<String>,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W, bar_width: usize) -> Self {
        Self {
            out,
            bar_width,
            cpus: Vec::new(),
            ram: Vec::new(),
        }
    }

    pub fn render(&mut self, mount: MountId, gauges: &[Gauge]) -> io::Result<()> {
        let lines: Vec<String> = gauges
            .iter()
            .map(|gauge| gauge_line(gauge, self.bar_width))
            .collect();
        match mount {
            MountId::Cpus => self.cpus = lines,
            MountId::Ram => self.ram = lines,
        }
        self.repaint()
    }

    fn repaint(&mut self) -> io::Result<()> {
        // home the cursor, rewrite every line clearing its tail, then
        // drop whatever is left of a taller previous frame
        write!(self.out, "\x1b[H")?;
        write!(self.out, "cpus\x1b[K\r\n")?;
        for line in &self.cpus {
            write!(self.out, "{line}\x1b[K\r\n")?;
        }
        write!(self.out, "ram\x1b[K\r\n")?;
        for line in &self.ram {
            write!(self.out, "{line}\x1b[K\r\n")?;
        }
        write!(self.out, "\x1b[J")?;
        self.out.flush()
    }
}

fn gauge_line(gauge: &Gauge, bar_width: usize) -> String {
    let filled = (gauge.fill_percent.clamp(0.0, 100.0) / 100.0 * bar_width as f64).round() as usize;

    let mut line = String::with_capacity(bar_width + gauge.label.len() + 3);
    line.push('[');
    for cell in 0..bar_width {
        line.push(if cell < filled { '█' } else { ' ' });
    }
    line.push(']');
    line.push(' ');
    line.push_str(&gauge.label);
    line
}
