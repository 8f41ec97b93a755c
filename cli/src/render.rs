/*!
# Render Module

Terminal output for previews
*/

use anyhow::Result;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use crystalball_core::catalog::Catalog;
use crystalball_core::fit::{FitResult, GpuUsage, Usage};
use crystalball_core::units::TimeSpan;
use crystalball_core::{JobRequest, PreviewResult, SlotType};
use serde::Serialize;

fn table(headers: &[&str], header_color: Color) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(header_color)),
        );
    table
}

fn heading(title: &str) {
    println!("{}", format!("---------------------- {} ----------------------", title).dimmed());
}

fn slot_color(slot_type: SlotType) -> Color {
    match slot_type {
        SlotType::Static => Color::DarkBlue,
        SlotType::Gpu => Color::DarkMagenta,
        SlotType::Partitionable => Color::DarkRed,
    }
}

/// Slot count column: static allocations read as `1..N`
fn slots_label(slot_type: SlotType, count: u32) -> String {
    if slot_type == SlotType::Static || count != 1 {
        format!("1..{}", count)
    } else {
        count.to_string()
    }
}

pub fn print_inputs(request: &JobRequest) {
    let mut table = table(&["Parameter", "Input Value"], Color::Blue);
    let rows = [
        ("CPUS", request.cores.to_string()),
        ("RAM", format!("{:.2} GiB", request.memory_gib)),
        ("STORAGE", format!("{:.2} GiB", request.disk_gib)),
        ("GPUS", request.gpus.to_string()),
        ("JOBS", request.jobs.to_string()),
        ("JOB DURATION", format!("{:.2} min", request.duration_minutes)),
        ("MAXIMUM NODES", request.max_nodes.to_string()),
    ];
    for (name, value) in rows {
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Dim),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }

    heading("INPUT");
    println!("{}", table);
}

pub fn print_nodes(catalog: &Catalog) {
    let mut table = table(&["Node", "Slots", "Cores", "GPUs", "RAM", "DISK"], Color::Magenta);

    for (node, slot) in catalog.iter() {
        let color = slot_color(slot.slot_type);
        let count = slot.declared_slots.unwrap_or(slot.repetition);
        let gpus = match slot.slot_type {
            SlotType::Gpu => slot.gpus.to_string(),
            _ => "------".to_string(),
        };
        table.add_row(
            [
                node.to_string(),
                slots_label(slot.slot_type, count),
                slot.cores.to_string(),
                gpus,
                format!("{} GiB", slot.memory_gib),
                format!("{} GiB", slot.disk_gib),
            ]
            .into_iter()
            .map(|value| Cell::new(value).fg(color)),
        );
    }

    heading("NODES");
    println!("{}", table);
}

fn fraction(usage: &Usage) -> String {
    format!("{}/{}", usage.used, usage.total)
}

fn percent(usage: &Usage) -> String {
    match usage.percent() {
        Some(percent) => format!("{}%", percent),
        None => "------".to_string(),
    }
}

fn gpu_cell(gpus: &GpuUsage) -> String {
    match gpus {
        GpuUsage::NotApplicable => "------".to_string(),
        GpuUsage::NoGpuResource => "No GPU resource".to_string(),
        GpuUsage::Used(usage) => percent(usage),
    }
}

fn preview_row(entry: &FitResult) -> Vec<Cell> {
    let color = if entry.fits { Color::Green } else { Color::Red };
    let wall_time = if entry.wall_time_on_idle > 0.0 {
        TimeSpan::from_minutes(entry.wall_time_on_idle).to_string()
    } else {
        "------".to_string()
    };

    [
        entry.concurrent_pool_wide.to_string(),
        entry.node.clone(),
        slots_label(entry.slot_type, entry.repetition),
        format!("{} Cores", fraction(&entry.usage.cores)),
        percent(&entry.usage.memory),
        gpu_cell(&entry.usage.gpus),
        wall_time,
    ]
    .into_iter()
    .map(|value| Cell::new(value).fg(color))
    .collect()
}

pub fn print_preview(result: &PreviewResult) {
    let mut table = table(
        &["Jobs", "Node", "Slot", "Slot usage", "RAM usage", "GPU usage", "Wall time"],
        Color::Cyan,
    );
    for entry in &result.entries {
        table.add_row(preview_row(entry));
    }

    heading("PREVIEW");
    println!("{}", table);
}

/// Closing summary of a preview
pub fn summary_lines(result: &PreviewResult, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();

    if verbose {
        lines.push(format!("TOTAL MATCHES: {}", result.total_concurrent_jobs));
        lines.push(String::new());
    }

    if !result.fits_anywhere() {
        lines.push(
            "Job size does not fit any compute slots. Use --verbose for details and a per-slot-config analysis."
                .to_string(),
        );
        return lines;
    }

    if !verbose {
        lines.push(format!(
            "{} jobs of this size can run on this pool.",
            result.total_concurrent_jobs
        ));
        lines.push(String::new());
    }

    if result.request.max_nodes > 0 {
        lines.push("We suggest using the following nodes:".to_string());
        lines.extend(result.suggested_nodes().into_iter().map(str::to_string));
        lines.push(String::new());
    }

    match result.estimate() {
        Some(estimate) => lines.push(format!(
            "A total of {} core-hour(s) will be used and will complete in about {}.",
            estimate.core_hours, estimate.wall_time
        )),
        None => lines.push(
            "No --time specified. No duration estimate will be given.".to_string(),
        ),
    }

    lines.push(String::new());
    lines.push("The above number(s) are for an idle pool.".to_string());
    lines
}

pub fn print_summary(result: &PreviewResult, verbose: bool) {
    for line in summary_lines(result, verbose) {
        if result.fits_anywhere() {
            println!("{}", line);
        } else {
            println!("{}", line.red());
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystalball_core::{preview, SlotConfiguration};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(
            "cpu3",
            SlotConfiguration::new(SlotType::Partitionable, 10, 100.0, 100.0),
        );
        catalog
    }

    #[test]
    fn fitting_summary_reports_capacity_and_estimate() {
        let request = JobRequest::new(1, 1.0)
            .with_jobs(128)
            .with_duration_minutes(15.0);
        let result = preview(&catalog(), &request).unwrap();
        let lines = summary_lines(&result, false);

        assert_eq!(lines[0], "10 jobs of this size can run on this pool.");
        assert!(lines.contains(
            &"A total of 32 core-hour(s) will be used and will complete in about 3 h.".to_string()
        ));
        assert_eq!(lines.last().unwrap(), "The above number(s) are for an idle pool.");
    }

    #[test]
    fn verbose_summary_starts_with_total() {
        let result = preview(&catalog(), &JobRequest::new(1, 1.0)).unwrap();
        let lines = summary_lines(&result, true);
        assert_eq!(lines[0], "TOTAL MATCHES: 10");
        assert!(lines.contains(
            &"No --time specified. No duration estimate will be given.".to_string()
        ));
    }

    #[test]
    fn no_fit_summary_points_to_verbose() {
        let result = preview(&catalog(), &JobRequest::new(64, 1.0)).unwrap();
        let lines = summary_lines(&result, false);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Job size does not fit any compute slots."));
    }

    #[test]
    fn max_nodes_lists_suggested_nodes() {
        let request = JobRequest::new(1, 1.0).with_max_nodes(1);
        let result = preview(&catalog(), &request).unwrap();
        let lines = summary_lines(&result, false);
        let at = lines
            .iter()
            .position(|line| line == "We suggest using the following nodes:")
            .unwrap();
        assert_eq!(lines[at + 1], "cpu3");
    }

    #[test]
    fn static_slot_counts_read_as_ranges() {
        assert_eq!(slots_label(SlotType::Static, 12), "1..12");
        assert_eq!(slots_label(SlotType::Partitionable, 1), "1");
        assert_eq!(slots_label(SlotType::Partitionable, 3), "1..3");
    }
}
