// Throughput formatting

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format a byte rate in the largest binary unit that keeps the value
/// below 1024, truncating to a whole number.
///
/// 500 → "500 B/s", 2100 → "2 KB/s", 3 MiB → "3 MB/s"
pub fn format_bps(bytes_per_second: u64) -> String {
    if bytes_per_second < KB {
        format!("{} B/s", bytes_per_second)
    } else if bytes_per_second < MB {
        format!("{} KB/s", bytes_per_second / KB)
    } else if bytes_per_second < GB {
        format!("{} MB/s", bytes_per_second / MB)
    } else {
        format!("{} GB/s", bytes_per_second / GB)
    }
}
