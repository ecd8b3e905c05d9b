//! Trace ingestion: the two formats `spec.md` §6 names, kept out of
//! `lfd-core` per §1's explicit exclusion. Grounded in
//! `original_source/main/evaluator.go`'s `caida.LoadPCAPFile` call site and
//! `original_source/caida` (pcap + nanosecond sidecar), generalized to a
//! `TraceSource` trait so the evaluator doesn't care which format fed it.

use crate::error::{LfdError, Result, TraceError};
use lfd_core::types::{FlowKey, Nanos};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// One packet observation as read off the wire format, before hashing.
pub struct RawPacket {
    pub flow_key: FlowKey,
    pub size: u32,
    pub ts: Nanos,
}

pub trait TraceSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>>;
}

/// `flow_id packet_size timestamp_seconds`, one packet per line.
pub struct TextTraceSource {
    lines: std::io::Lines<BufReader<File>>,
    line_no: usize,
}

impl TextTraceSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| LfdError::Trace(TraceError::Read { path: path.display().to_string(), source: e }))?;
        Ok(Self { lines: BufReader::new(file).lines(), line_no: 0 })
    }
}

impl TraceSource for TextTraceSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        let Some(line) = self.lines.next() else {
            return Ok(None);
        };
        self.line_no += 1;
        let line = line?;
        if line.trim().is_empty() {
            return self.next_packet();
        }
        let mut fields = line.split_whitespace();
        let flow_id: u64 = fields
            .next()
            .ok_or_else(|| malformed(self.line_no, "missing flow_id"))?
            .parse()
            .map_err(|_| malformed(self.line_no, "flow_id is not an integer"))?;
        let size: u32 = fields
            .next()
            .ok_or_else(|| malformed(self.line_no, "missing packet_size"))?
            .parse()
            .map_err(|_| malformed(self.line_no, "packet_size is not an integer"))?;
        let ts_secs: f64 = fields
            .next()
            .ok_or_else(|| malformed(self.line_no, "missing timestamp_seconds"))?
            .parse()
            .map_err(|_| malformed(self.line_no, "timestamp_seconds is not a number"))?;

        let mut flow_key = [0u8; 16];
        flow_key[..8].copy_from_slice(&flow_id.to_be_bytes());
        let ts = (ts_secs * 1_000_000_000.0) as Nanos;

        Ok(Some(RawPacket { flow_key, size, ts }))
    }
}

fn malformed(line: usize, reason: &str) -> LfdError {
    LfdError::Trace(TraceError::MalformedTextLine { line, reason: reason.to_string() })
}

const PCAP_GLOBAL_HEADER_LEN: usize = 24;
const PCAP_RECORD_HEADER_LEN: usize = 16;
const PCAP_MAGIC_LE: u32 = 0xA1B2_C3D4;
const PCAP_MAGIC_BE: u32 = 0xD4C3_B2A1;

/// Minimal classic (non-nanosecond) libpcap reader paired with a sidecar
/// nanosecond-timestamp file, per `spec.md` §6: "pcap + sidecar
/// nanosecond-timestamp file where line i gives the ns timestamp of packet
/// i". Only Ethernet/IPv4 framing is understood; anything else yields a
/// zeroed flow key rather than failing the whole trace.
pub struct PcapTraceSource {
    data: Vec<u8>,
    offset: usize,
    big_endian: bool,
    timestamps: Vec<Nanos>,
    packet_index: usize,
}

impl PcapTraceSource {
    pub fn open<P: AsRef<Path>>(pcap_path: P, time_path: P) -> Result<Self> {
        let pcap_path = pcap_path.as_ref();
        let mut data = Vec::new();
        File::open(pcap_path)
            .map_err(|e| LfdError::Trace(TraceError::Read { path: pcap_path.display().to_string(), source: e }))?
            .read_to_end(&mut data)
            .map_err(|e| LfdError::Trace(TraceError::Read { path: pcap_path.display().to_string(), source: e }))?;

        if data.len() < PCAP_GLOBAL_HEADER_LEN {
            return Err(LfdError::Trace(TraceError::MalformedPcapHeader));
        }
        let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let big_endian = match magic {
            PCAP_MAGIC_LE => false,
            PCAP_MAGIC_BE => true,
            _ => return Err(LfdError::Trace(TraceError::MalformedPcapHeader)),
        };

        let time_path = time_path.as_ref();
        let time_txt = std::fs::read_to_string(time_path)
            .map_err(|e| LfdError::Trace(TraceError::Read { path: time_path.display().to_string(), source: e }))?;
        let timestamps: Vec<Nanos> = time_txt
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().parse().unwrap_or(0))
            .collect();

        Ok(Self { data, offset: PCAP_GLOBAL_HEADER_LEN, big_endian, timestamps, packet_index: 0 })
    }

    fn read_u32(&self, at: usize) -> u32 {
        let bytes: [u8; 4] = self.data[at..at + 4].try_into().unwrap();
        if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }
}

impl TraceSource for PcapTraceSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        if self.offset + PCAP_RECORD_HEADER_LEN > self.data.len() {
            return Ok(None);
        }
        let caplen = self.read_u32(self.offset + 8) as usize;
        let record_start = self.offset + PCAP_RECORD_HEADER_LEN;
        if record_start + caplen > self.data.len() {
            return Err(LfdError::Trace(TraceError::MalformedPcapRecord { offset: self.offset }));
        }

        if self.packet_index >= self.timestamps.len() {
            return Err(LfdError::Trace(TraceError::SidecarTooShort {
                have: self.timestamps.len(),
                need: self.packet_index + 1,
            }));
        }
        let ts = self.timestamps[self.packet_index];

        let frame = &self.data[record_start..record_start + caplen];
        let flow_key = extract_flow_key(frame);
        let size = caplen as u32;

        self.offset = record_start + caplen;
        self.packet_index += 1;

        Ok(Some(RawPacket { flow_key, size, ts }))
    }
}

/// `srcIP | dstIP | proto | srcPort | dstPort`, the 13-byte tuple `spec.md`
/// §6 names, zero-padded to 16 bytes. Assumes a bare Ethernet+IPv4 frame (no
/// VLAN tag, no IPv6) — anything else returns an all-zero key rather than
/// failing ingestion, matching this component's reference-implementation
/// scope (`spec.md` §1 excludes trace ingestion from the core entirely).
fn extract_flow_key(frame: &[u8]) -> FlowKey {
    const ETH_HEADER_LEN: usize = 14;
    let mut key = [0u8; 16];
    if frame.len() < ETH_HEADER_LEN + 20 {
        return key;
    }
    let ip = &frame[ETH_HEADER_LEN..];
    if ip[0] >> 4 != 4 {
        return key;
    }
    let ihl = ((ip[0] & 0x0F) as usize) * 4;
    if ip.len() < ihl + 4 {
        return key;
    }
    key[0..4].copy_from_slice(&ip[12..16]); // src ip
    key[4..8].copy_from_slice(&ip[16..20]); // dst ip
    key[8] = ip[9]; // proto
    if ip.len() >= ihl + 4 {
        key[9..11].copy_from_slice(&ip[ihl..ihl + 2]); // src port
        key[11..13].copy_from_slice(&ip[ihl + 2..ihl + 4]); // dst port
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_whitespace_separated_lines() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "1 1500 0.000001").unwrap();
        writeln!(f, "2 500 0.000002").unwrap();
        let mut src = TextTraceSource::open(f.path()).unwrap();

        let p1 = src.next_packet().unwrap().unwrap();
        assert_eq!(p1.size, 1500);
        assert_eq!(p1.ts, 1000);

        let p2 = src.next_packet().unwrap().unwrap();
        assert_eq!(p2.size, 500);
        assert_eq!(p2.ts, 2000);

        assert!(src.next_packet().unwrap().is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "1 100 0.0").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "2 200 0.0").unwrap();
        let mut src = TextTraceSource::open(f.path()).unwrap();
        assert!(src.next_packet().unwrap().is_some());
        assert!(src.next_packet().unwrap().is_some());
        assert!(src.next_packet().unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_a_trace_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "not a valid line").unwrap();
        let mut src = TextTraceSource::open(f.path()).unwrap();
        assert!(src.next_packet().is_err());
    }

    #[test]
    fn missing_file_is_a_trace_error() {
        assert!(TextTraceSource::open("/nonexistent/path/trace.txt").is_err());
    }

    #[test]
    fn extract_flow_key_returns_zero_for_truncated_frame() {
        assert_eq!(extract_flow_key(&[0u8; 4]), [0u8; 16]);
    }
}
