//! Ascii packet trace.
//!
//! One line per event, in the order events happen:
//!
//! ```text
//! + 2.000000000 /NodeList/3/DeviceList/0 10.1.3.1:49153 > 10.1.2.1:20 SYN len 40
//! r 2.000101264 /NodeList/0/DeviceList/1 10.1.3.1:49153 > 10.1.2.1:20 SYN len 40
//! d 10.000000000 /NodeList/0/DeviceList/0 10.1.3.1:49153 > 10.1.2.1:20 DATA len 576
//! ```
//!
//! `+` is a packet handed to a device, `r` a packet received by a device and
//! `d` a packet still on the wire when the run stopped.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::time::SimTime;
use crate::analysis::types::FiveTuple;
use crate::topology::NodeId;

/// Trace event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    Enqueue,
    Receive,
    Drop,
}

impl TraceOp {
    fn symbol(&self) -> char {
        match self {
            TraceOp::Enqueue => '+',
            TraceOp::Receive => 'r',
            TraceOp::Drop => 'd',
        }
    }
}

/// Buffered writer for the ascii trace file
#[derive(Debug)]
pub struct AsciiTracer {
    path: PathBuf,
    out: BufWriter<File>,
    lines: u64,
}

impl AsciiTracer {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(AsciiTracer {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            lines: 0,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        op: TraceOp,
        time: SimTime,
        node: NodeId,
        device_index: usize,
        tuple: &FiveTuple,
        kind: &str,
        bytes: u32,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} /NodeList/{}/DeviceList/{} {}:{} > {}:{} {} len {}",
            op.symbol(),
            time,
            node,
            device_index,
            tuple.source_address,
            tuple.source_port,
            tuple.destination_address,
            tuple.destination_port,
            kind,
            bytes
        )?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.out.flush()?;
        Ok(self.path)
    }
}
