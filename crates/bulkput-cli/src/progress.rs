//! Terminal progress display and run summary

use bulkput_core::{Outcome, ProgressSink, RunEvent, RunReport};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

/// Create a spinner for operations without known size
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar for counting items
pub fn create_counter(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

#[derive(Default)]
struct Bars {
    spinner: Option<ProgressBar>,
    counter: Option<ProgressBar>,
}

/// Renders run events with indicatif bars.
pub struct ConsoleProgress {
    bucket: String,
    dry_run: bool,
    bars: Mutex<Bars>,
}

impl ConsoleProgress {
    pub fn new(bucket: impl Into<String>, dry_run: bool) -> Self {
        Self {
            bucket: bucket.into(),
            dry_run,
            bars: Mutex::new(Bars::default()),
        }
    }

    fn println(bars: &Bars, line: String) {
        match bars.counter.as_ref().or(bars.spinner.as_ref()) {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn upload_label(&self) -> String {
        if self.dry_run {
            format!("(dryrun) {}", "upload".green())
        } else {
            "upload".green().to_string()
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: &RunEvent) {
        let mut bars = self.bars.lock();

        match event {
            RunEvent::ScanStarted => {
                bars.spinner = Some(create_spinner("Scanning folders..."));
            }
            RunEvent::FolderSkipped { name } => {
                Self::println(&bars, format!("{}: folder '{}' not found", "skip".yellow(), name));
            }
            RunEvent::ScanCompleted { count } => {
                if let Some(spinner) = bars.spinner.take() {
                    spinner.finish_with_message(format!("Found {} files", count));
                }
                if *count > 0 {
                    bars.counter = Some(create_counter(*count as u64, "uploading"));
                }
            }
            RunEvent::BatchStarted { index, size } => {
                if let Some(pb) = &bars.counter {
                    pb.set_message(format!("batch {} ({} files)", index + 1, size));
                }
            }
            RunEvent::ItemCompleted { key, outcome } => {
                let line = match outcome {
                    Outcome::Success { bytes } => format!(
                        "{}: {} -> s3://{}/{} ({})",
                        self.upload_label(),
                        key,
                        self.bucket,
                        key,
                        format_bytes(*bytes)
                    ),
                    Outcome::Failure(reason) => {
                        format!("{}: {} ({})", "failed".red(), key, reason)
                    }
                };
                Self::println(&bars, line);
                if let Some(pb) = &bars.counter {
                    pb.inc(1);
                }
            }
            RunEvent::RunCompleted(_) => {
                if let Some(pb) = bars.counter.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }
}

/// Print the end-of-run summary with a few public URLs.
pub fn print_summary(report: &RunReport, urls: &[String]) {
    println!();
    if report.total == 0 {
        println!("{}", "No files found to upload".yellow());
        return;
    }

    println!("{}", "Upload summary".bold());
    println!("  Files:      {}", report.total);
    println!("  Uploaded:   {}", report.uploaded.to_string().green());
    if report.has_failures() {
        println!("  Failed:     {}", report.failed.to_string().red());
    } else {
        println!("  Failed:     0");
    }
    println!("  Size:       {}", format_bytes(report.bytes_uploaded));
    println!("  Duration:   {}", format_duration(report.duration_secs));
    println!("  Throughput: {:.2} files/s", report.throughput);

    if !urls.is_empty() {
        println!();
        println!("Example URLs:");
        for url in urls {
            println!("  {}", url.cyan());
        }
    }

    if report.has_failures() {
        println!();
        println!(
            "{}",
            format!("{} file(s) failed to upload, see messages above", report.failed).red()
        );
    }
}

/// Format bytes as human readable string
pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Format duration as human readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        return format!("{:.2}s", secs);
    }

    let whole = secs.round() as u64;
    if whole < 3600 {
        format!("{}m {}s", whole / 60, whole % 60)
    } else {
        format!("{}h {}m {}s", whole / 3600, (whole % 3600) / 60, whole % 60)
    }
}
