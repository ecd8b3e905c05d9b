//! Shared types used across all detectors.

/// Nanosecond timestamp or duration, matching the original Go implementation's
/// use of `time.Duration` (int64 nanoseconds) but kept unsigned: detectors rely
/// on `ts` being non-decreasing, so there is no legitimate negative duration on
/// this hot path.
pub type Nanos = u64;

/// Raw flow key handed to a [`crate::hash::FlowHash`] implementation, e.g. the
/// 13-byte `srcIP | dstIP | proto | srcPort | dstPort` tuple zero-padded to 16
/// bytes. A plain byte array, never reinterpreted as anything else.
pub type FlowKey = [u8; 16];

/// The 32-bit flow identifier every detector operates on internally.
pub type FlowId = u32;
