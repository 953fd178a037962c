//! Terminal rendering of timing and size reports.
//!
//! Every `render_*` function returns the text so it can be tested; the
//! `print_*` functions write it to stdout.

use std::fmt::Write;
use std::time::Duration;

use colored::*;
use hyper::header::LAST_MODIFIED;

use crate::fetch::ResponseInfo;
use crate::resources::{ResourceMap, SizeReport};
use crate::trace::TimingRecord;
use crate::utils::{ConnectionPhase, RequestPhase, TimingReport};

const LABEL_WIDTH: usize = 20;

/// Right-aligned label column.
fn label(text: &str) -> ColoredString {
    format!("{text:>LABEL_WIDTH$}").bright_green()
}

/// Two decimals in the largest unit that keeps the value at least 1.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0.00s".to_string()
    } else if nanos < 1_000 {
        format!("{nanos}.00ns")
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1e3)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1e6)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// Bytes below 1 KB, then KB, MB and GB in steps of 1024.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match size {
        s if s < KB => format!("{s} B"),
        s if s < MB => format!("{:.2} KB", s as f64 / KB as f64),
        s if s < GB => format!("{:.2} MB", s as f64 / MB as f64),
        s => format!("{:.2} GB", s as f64 / GB as f64),
    }
}

/// One hop: URL, status, Last-Modified, size, connection, optional headers.
pub fn render_response_info(info: &ResponseInfo, reused: bool, show_headers: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{} {}", "URL:".magenta(), info.url.as_str().cyan());
    let _ = writeln!(
        out,
        "{} {}",
        "Response status:".green(),
        info.status.to_string().blue()
    );
    match info
        .headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
    {
        Some(last_modified) => {
            let _ = writeln!(out, "{} {}", "Last Modified:".green(), last_modified.blue());
        }
        None => {
            let _ = writeln!(out, "{}", "Last Modified header not present".yellow());
        }
    }
    let _ = writeln!(
        out,
        "{} {}",
        label("Content size:"),
        format_size(info.content_size).blue()
    );
    let connection = if reused {
        "Reused existing connection for this request"
    } else {
        "New connection established for this request"
    };
    let _ = writeln!(out, "{}", connection.green());

    if show_headers {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "Response headers:".green());
        for (name, value) in &info.headers {
            let value = String::from_utf8_lossy(value.as_bytes());
            let _ = writeln!(out, "{} {}", format!("{name}:").green(), value.blue());
        }
    }
    out
}

/// Phase timings and connection facts of one hop.
pub fn render_connection_timing(number: usize, record: &TimingRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("Connection #{number}").green());

    let connection = if record.connection_reused { "Reused" } else { "New" };
    let _ = writeln!(out, "{} {}", label("Connection"), connection.blue());

    if record.local_addr.is_some() || record.remote_addr.is_some() {
        let _ = writeln!(
            out,
            "{} {}",
            label("Local address"),
            record.local_addr.as_deref().unwrap_or_default().blue()
        );
        let _ = writeln!(
            out,
            "{} {}",
            label("Remote address"),
            record.remote_addr.as_deref().unwrap_or_default().blue()
        );
    }

    for phase in [ConnectionPhase::Dns, ConnectionPhase::TcpConnect] {
        let _ = writeln!(
            out,
            "{} {}",
            label(&phase.to_string()),
            format_duration(phase.duration(record))
        );
    }

    if !record.tls_handshake_time.is_zero() || record.tls_version.is_some() {
        let _ = writeln!(
            out,
            "{} {}",
            label("TLS Handshake"),
            format_duration(record.tls_handshake_time)
        );
        if let Some(version) = &record.tls_version {
            let _ = writeln!(out, "{} {}", label("TLS version"), version.blue());
        }
        if let Some(cipher) = &record.tls_cipher_suite {
            let _ = writeln!(out, "{} {}", label("TLS cipher"), cipher.blue());
        }
        let _ = writeln!(
            out,
            "{} {}",
            label("TLS resumption"),
            record.tls_resumption.to_string().blue()
        );
    }

    if !record.waiting_for_server_time.is_zero() {
        let _ = writeln!(
            out,
            "{} {}",
            label("Waiting for server"),
            format_duration(record.waiting_for_server_time)
        );
    }
    let _ = writeln!(
        out,
        "{} {}",
        label(&ConnectionPhase::TimeToFirstByte.to_string()),
        format_duration(record.ttfb)
    );

    if !record.protocol.is_empty() {
        let _ = writeln!(
            out,
            "{} {}",
            format!("{:>LABEL_WIDTH$}", "Protocol").yellow(),
            record.protocol.blue()
        );
    }
    if !record.http_version.is_empty() {
        let _ = writeln!(
            out,
            "{} {}",
            format!("{:>LABEL_WIDTH$}", "HTTP version").yellow(),
            record.http_version.blue()
        );
    }
    let _ = writeln!(out);
    out
}

/// Headline durations of the first hop.
pub fn render_request_summary(report: &TimingReport) -> String {
    use strum::IntoEnumIterator;

    let mut out = String::new();
    let _ = writeln!(out, "{}", "Request".green());
    for phase in RequestPhase::iter() {
        let _ = writeln!(
            out,
            "{} {}",
            label(&phase.to_string()),
            format_duration(phase.duration(report))
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} {}",
        label("Total Request"),
        format_duration(report.total_request_time)
    );
    out
}

/// Resources per content type with subtotals and a grand total.
pub fn render_resource_sizes(resources: &ResourceMap) -> String {
    let mut out = String::new();
    for (content_type, items) in resources.iter() {
        let shown = if content_type.is_empty() { "(none)" } else { content_type };
        let _ = writeln!(out, "{} {}", "Type:".green(), shown.blue());
        for resource in items {
            let _ = writeln!(
                out,
                "{} {}",
                resource.url.green(),
                format_size(resource.size).blue()
            );
        }
        let _ = writeln!(
            out,
            "{} {}",
            "Total size for this type:".green(),
            format_size(resources.type_total(content_type)).blue()
        );
        let _ = writeln!(out);
    }
    let _ = writeln!(
        out,
        "{} {}",
        "Total size for all resources:".green(),
        format_size(resources.total_size()).blue()
    );
    out
}

/// Prints every hop followed by the headline summary.
pub fn print_timing_report(report: &TimingReport, responses: &[ResponseInfo], show_headers: bool) {
    for (number, (info, record)) in responses.iter().zip(&report.records).enumerate() {
        print!(
            "{}",
            render_response_info(info, record.connection_reused, show_headers)
        );
        println!();
        print!("{}", render_connection_timing(number + 1, record));
    }
    print!("{}", render_request_summary(report));
}

/// Prints the size table and a count of resources that failed.
pub fn print_size_report(report: &SizeReport) {
    print!("{}", render_resource_sizes(&report.resources));
    if !report.warnings.is_empty() {
        println!(
            "{}",
            format!(
                "{} resource(s) could not be measured, see warnings above",
                report.warnings.len()
            )
            .yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Resource;
    use hyper::header::{HeaderMap, HeaderValue};
    use hyper::{StatusCode, Version};

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(Duration::ZERO), "0.00s");
        assert_eq!(format_duration(Duration::from_nanos(750)), "750.00ns");
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "1.50µs");
        assert_eq!(format_duration(Duration::from_micros(123_456)), "123.46ms");
        assert_eq!(format_duration(Duration::from_millis(2_346)), "2.35s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90.00s");
    }

    #[test]
    fn test_format_size_steps() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    fn response(headers: HeaderMap) -> ResponseInfo {
        ResponseInfo {
            url: url::Url::parse("https://example.com/").expect("url"),
            status: StatusCode::MOVED_PERMANENTLY,
            version: Version::HTTP_11,
            headers,
            content_size: 2048,
            request_sending_time: Duration::from_millis(12),
            start_time: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_render_response_info() {
        let mut headers = HeaderMap::new();
        headers.insert(LAST_MODIFIED, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        headers.insert("x-served-by", HeaderValue::from_static("cache-1"));

        let out = render_response_info(&response(headers.clone()), false, false);
        assert!(out.contains("https://example.com/"));
        assert!(out.contains("301 Moved Permanently"));
        assert!(out.contains("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert!(out.contains("2.00 KB"));
        assert!(out.contains("New connection established"));
        assert!(!out.contains("cache-1"));

        let out = render_response_info(&response(headers), true, true);
        assert!(out.contains("Reused existing connection"));
        assert!(out.contains("Response headers:"));
        assert!(out.contains("cache-1"));
    }

    #[test]
    fn test_render_response_info_without_last_modified() {
        let out = render_response_info(&response(HeaderMap::new()), false, false);
        assert!(out.contains("Last Modified header not present"));
    }

    #[test]
    fn test_render_connection_timing() {
        let record = TimingRecord {
            dns_lookup_time: Duration::from_millis(5),
            tcp_conn_time: Duration::from_millis(10),
            tls_handshake_time: Duration::from_millis(20),
            tls_version: Some("TLS 1.3".to_string()),
            tls_cipher_suite: Some("TLS13-AES-128-GCM-SHA256".to_string()),
            ttfb: Duration::from_millis(42),
            remote_addr: Some("192.0.2.1:443".to_string()),
            protocol: "HTTPS".to_string(),
            http_version: "HTTP/1.1".to_string(),
            ..TimingRecord::default()
        };
        let out = render_connection_timing(2, &record);
        assert!(out.contains("Connection #2"));
        assert!(out.contains("DNS Lookup"));
        assert!(out.contains("5.00ms"));
        assert!(out.contains("TLS 1.3"));
        assert!(out.contains("TLS13-AES-128-GCM-SHA256"));
        assert!(out.contains("42.00ms"));
        assert!(out.contains("192.0.2.1:443"));
        assert!(out.contains("HTTP/1.1"));
        assert!(!out.contains("Waiting for server"));
    }

    #[test]
    fn test_render_connection_timing_plain_http_has_no_tls_block() {
        let out = render_connection_timing(1, &TimingRecord::default());
        assert!(!out.contains("TLS version"));
        assert!(!out.contains("Remote address"));
    }

    #[test]
    fn test_render_request_summary() {
        let report = TimingReport {
            request_sending_time: Duration::from_millis(100),
            server_processing_time: Duration::from_millis(50),
            total_request_time: Duration::from_millis(150),
            content_transfer_time: Duration::from_millis(7),
            ..TimingReport::default()
        };
        let out = render_request_summary(&report);
        assert!(out.contains("Request Sending"));
        assert!(out.contains("100.00ms"));
        assert!(out.contains("Server Processing"));
        assert!(out.contains("Content Transfer"));
        assert!(out.contains("7.00ms"));
        assert!(out.contains("150.00ms"));
    }

    #[test]
    fn test_render_resource_sizes() {
        let mut map = ResourceMap::default();
        for (url, size, content_type) in [
            ("https://e.com/a.css", 1024, "text/css"),
            ("https://e.com/b.css", 1024, "text/css"),
            ("https://e.com/x", 10, ""),
        ] {
            map.insert(Resource {
                url: url.to_string(),
                size,
                content_type: content_type.to_string(),
            });
        }
        let out = render_resource_sizes(&map);
        assert!(out.contains("text/css"));
        assert!(out.contains("(none)"));
        assert!(out.contains("2.00 KB"));
        assert!(out.contains("https://e.com/b.css"));
        assert!(out.contains("Total size for all resources:"));
        assert!(out.contains("2.01 KB"));
    }
}
