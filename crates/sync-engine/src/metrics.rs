use metrics::{counter, gauge, histogram};

use common::Watermark;

pub fn record_rows_fetched(table: &'static str, count: usize) {
    counter!("sync_rows_fetched_total", "table" => table).increment(count as u64);
}

pub fn record_rows_written(table: &'static str, count: usize) {
    counter!("sync_rows_written_total", "table" => table).increment(count as u64);
}

pub fn record_write_failures(table: &'static str, count: usize) {
    counter!("sync_write_failures_total", "table" => table).increment(count as u64);
}

pub fn record_table_error(table: &'static str, kind: &'static str) {
    counter!("sync_table_errors_total", "table" => table, "kind" => kind).increment(1);
}

pub fn record_cycle(duration_secs: f64, watermark: Watermark) {
    counter!("sync_cycles_total").increment(1);
    histogram!("sync_cycle_duration_seconds").record(duration_secs);
    if let Some(instant) = watermark.get() {
        gauge!("sync_watermark_seconds").set(instant.timestamp() as f64);
    }
}

pub fn record_aborted_cycle() {
    counter!("sync_cycles_aborted_total").increment(1);
}

pub fn set_dead_letters(count: usize) {
    gauge!("sync_dead_letters").set(count as f64);
}
