/// Performance measurement utilities
/// Each rendering stage is timed and logged for optimization analysis
use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        println!("[PERF] {}: {:.2}μs", self.name, elapsed.as_micros());
    }
}

/// Performance statistics accumulator
pub struct PerfStats {
    pub clear_us: f64,
    pub vis_testing_us: f64,
    pub drawing_us: f64,
    pub total_us: f64,
}

impl PerfStats {
    pub fn new() -> Self {
        Self {
            clear_us: 0.0,
            vis_testing_us: 0.0,
            drawing_us: 0.0,
            total_us: 0.0,
        }
    }

    pub fn print_summary(&self) {
        println!("\n========== PERFORMANCE SUMMARY ==========");
        println!(
            "Frame Clear:     {:8.2}μs ({:5.1}%)",
            self.clear_us,
            (self.clear_us / self.total_us) * 100.0
        );
        println!(
            "Vis Testing:     {:8.2}μs ({:5.1}%)",
            self.vis_testing_us,
            (self.vis_testing_us / self.total_us) * 100.0
        );
        println!(
            "Stage Drawing:   {:8.2}μs ({:5.1}%)",
            self.drawing_us,
            (self.drawing_us / self.total_us) * 100.0
        );
        println!("─────────────────────────────────────────");
        println!("Total:           {:8.2}μs", self.total_us);
        println!("=========================================\n");
    }
}

impl Default for PerfStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}
