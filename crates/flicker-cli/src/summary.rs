use std::time::Duration;

use console::Style;
use flicker_core::config::{AcquisitionMode, SessionConfig};
use flicker_core::processing::{FrameKind, ProcessedFrame};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
        }
    }
}

pub fn print_session_summary(config: &SessionConfig, device_name: &str) {
    let s = Styles::new();
    let acq = &config.acquisition;
    let proc = &config.processing;

    println!();
    println!("  {}", s.title.apply_to("Flicker Session"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Device"),
        s.method.apply_to(device_name)
    );
    println!();

    println!("  {}", s.header.apply_to("Acquisition"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Mode"),
        s.method.apply_to(acq.mode)
    );
    if acq.mode == AcquisitionMode::Difference {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Trigger"),
            s.value.apply_to("external")
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Exposure"),
        s.value.apply_to(format!("{:.1} ms", acq.exposure_time * 1000.0))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Binning"),
        s.value.apply_to(format!("{0}x{0}", acq.binning))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bit depth"),
        s.value.apply_to(acq.bit_depth)
    );
    println!();

    println!("  {}", s.header.apply_to("Processing"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Enhance"),
        s.method.apply_to(proc.enhancement)
    );
    if proc.averaging_enabled() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Averaging"),
            s.value.apply_to(format!("{} frames", proc.averaging))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Averaging"),
            s.disabled.apply_to("disabled")
        );
    }
    if proc.roi.is_enabled() {
        let r = proc.roi;
        println!(
            "    {:<12}{}",
            s.label.apply_to("ROI"),
            s.value.apply_to(format!("{}x{} at ({}, {})", r.width, r.height, r.x, r.y))
        );
    }
    println!();
}

/// What a finished `run` reports.
pub struct RunReport<'a> {
    pub elapsed: Duration,
    pub received: u64,
    pub processed: u64,
    pub dropped: u64,
    pub history: Vec<f64>,
    pub latest: Option<&'a ProcessedFrame>,
}

pub fn print_run_report(report: &RunReport<'_>) {
    let s = Styles::new();
    let secs = report.elapsed.as_secs_f64().max(f64::EPSILON);

    println!("  {}", s.header.apply_to("Results"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Processed"),
        s.value.apply_to(format!(
            "{} ({:.1}/s)",
            report.processed,
            report.processed as f64 / secs
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Events"),
        s.value.apply_to(report.received)
    );
    if report.dropped > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Dropped"),
            s.disabled.apply_to(report.dropped)
        );
    }
    if !report.history.is_empty() {
        let mean = report.history.iter().sum::<f64>() / report.history.len() as f64;
        println!(
            "    {:<12}{}",
            s.label.apply_to("Intensity"),
            s.value.apply_to(format!(
                "{mean:.1} over last {} frames",
                report.history.len()
            ))
        );
    }

    let Some(frame) = report.latest else {
        return;
    };
    let m = &frame.measurements;
    let kind = match frame.kind {
        FrameKind::Single => "single",
        FrameKind::Difference => "difference",
    };
    println!(
        "    {:<12}{}",
        s.label.apply_to("Last frame"),
        s.value.apply_to(format!("#{} ({kind})", frame.index))
    );
    if let Some((a, b)) = m.pair_means {
        println!(
            "    {:<12}{}",
            s.label.apply_to("A / B"),
            s.value.apply_to(format!("{a:.1} / {b:.1}"))
        );
    }
    if let Some(roi) = m.roi_mean {
        println!(
            "    {:<12}{}",
            s.label.apply_to("ROI mean"),
            s.value.apply_to(format!("{roi:.1}"))
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Proc time"),
        s.value.apply_to(format!("{:.2} ms", m.processing_time.as_secs_f64() * 1000.0))
    );
}
