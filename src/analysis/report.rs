//! Report generation for flow statistics.
//!
//! Prints the per-flow console blocks and writes the JSON report.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};

use super::types::*;

/// Console block for one reported flow
pub fn format_flow_block(report: &FlowReport) -> String {
    let mut block = String::new();
    let _ = writeln!(
        block,
        "Flow ID: {} Src Addr {} Dst Addr {}",
        report.flow_id, report.tuple.source_address, report.tuple.destination_address
    );
    let _ = writeln!(block, "Tx Packets = {}", report.tx_packets);
    let _ = writeln!(block, "Rx Packets = {}", report.rx_packets);
    let _ = writeln!(block, "Throughput: {}", report.throughput);
    match (report.total_delay, report.time_last_rx) {
        (Some(delay), Some(last)) => {
            let _ = writeln!(block, "Total Delay: {}seconds", delay);
            let _ = writeln!(block, "Time-first packet: {}seconds", report.time_first_tx);
            let _ = writeln!(block, "Time-last packet: {}seconds", last);
        }
        _ => {
            let _ = writeln!(block, "Total Delay: n/a");
            let _ = writeln!(block, "Time-first packet: {}seconds", report.time_first_tx);
            let _ = writeln!(block, "Time-last packet: n/a");
        }
    }
    block
}

/// Print every reported flow to stdout, in order
pub fn print_flow_blocks(reports: &[FlowReport]) {
    for report in reports {
        print!("{}", format_flow_block(report));
    }
}

/// Generate JSON report
pub fn generate_json_report(reports: &[FlowReport], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(reports).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Load a flow snapshot written by the monitor
pub fn load_snapshot(path: &Path) -> Result<FlowSnapshot> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read flow snapshot {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse flow snapshot {}", path.display()))
}

/// Aggregate figures across the reported flows
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReportTotals {
    pub flows: usize,
    pub flows_without_data: usize,
    pub rx_bytes: u64,
    pub aggregate_kbps: f64,
}

pub fn totals(reports: &[FlowReport]) -> ReportTotals {
    reports.iter().fold(ReportTotals::default(), |mut acc, r| {
        acc.flows += 1;
        acc.rx_bytes += r.rx_bytes;
        match r.throughput.kbps() {
            Some(kbps) => acc.aggregate_kbps += kbps,
            None => acc.flows_without_data += 1,
        }
        acc
    })
}

/// Print a summary to stdout
pub fn print_summary(reports: &[FlowReport]) {
    let totals = totals(reports);
    println!("\n=== FLOW STATISTICS SUMMARY ===\n");
    println!("Flows reported: {}", totals.flows);
    if totals.flows_without_data > 0 {
        println!("  without data: {}", totals.flows_without_data);
    }
    println!("Bytes received: {}", totals.rx_bytes);
    println!("Aggregate throughput: {:.2} Kbps", totals.aggregate_kbps);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn report(flow_id: FlowId, throughput: Throughput, last_rx: Option<f64>) -> FlowReport {
        FlowReport {
            flow_id,
            tuple: FiveTuple::tcp((Ipv4Addr::new(10, 1, 3, 1), 49153), (Ipv4Addr::new(10, 1, 2, 1), 20)),
            tx_packets: 1224,
            rx_packets: if last_rx.is_some() { 1224 } else { 0 },
            rx_bytes: if last_rx.is_some() { 704_320 } else { 0 },
            time_first_tx: 2.0,
            time_last_rx: last_rx,
            total_delay: last_rx.map(|t| t - 2.0),
            throughput,
            mean_delay: None,
        }
    }

    #[test]
    fn test_flow_block_format() {
        let block = format_flow_block(&report(1, Throughput::Kbps(5502.5), Some(3.0)));
        let lines: Vec<_> = block.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Flow ID: 1 Src Addr 10.1.3.1 Dst Addr 10.1.2.1",
                "Tx Packets = 1224",
                "Rx Packets = 1224",
                "Throughput: 5502.50 Kbps",
                "Total Delay: 1seconds",
                "Time-first packet: 2seconds",
                "Time-last packet: 3seconds",
            ]
        );
    }

    #[test]
    fn test_flow_block_without_data() {
        let block = format_flow_block(&report(3, Throughput::NoData, None));
        assert!(block.contains("Throughput: n/a (no data received)"));
        assert!(block.contains("Time-last packet: n/a"));
    }

    #[test]
    fn test_json_report_and_totals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow_report.json");
        let reports = vec![
            report(1, Throughput::Kbps(100.0), Some(3.0)),
            report(3, Throughput::NoData, None),
        ];
        generate_json_report(&reports, &path).unwrap();

        let parsed: Vec<FlowReport> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, reports);

        let totals = totals(&reports);
        assert_eq!(totals.flows, 2);
        assert_eq!(totals.flows_without_data, 1);
        assert_eq!(totals.aggregate_kbps, 100.0);
    }
}
