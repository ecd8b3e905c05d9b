//! Derives EARDet's counter count and both RLFDs' epoch length from a
//! flow-spec-level configuration, per `spec.md` §4.7 and
//! `original_source/main/evaluator.go`'s parameter setup (lines 80-94).
//!
//! All rate-like inputs are bytes/second, matching the JSON config's units
//! (`spec.md` §6: "converted to bytes/nanosecond internally"); this module
//! does the conversion so [`crate::eardet::EARDetector`] and
//! [`crate::rlfd::RLFDetector`] never see anything but bytes/ns.

use crate::rlfd::DEFAULT_DEPTH;
use crate::types::Nanos;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// User-level inputs to parameter derivation, `spec.md` §4.7's
/// `(p, α, β_l, γ_l, t_l_factor, attacker_flow_factor, max_watchlist_size,
/// rd_β, rd_γ)` plus the desired high-bandwidth threshold `γ_h` that §4.7's
/// "choose N from the desired γ_h" presupposes as an input.
#[derive(Debug, Clone, Copy)]
pub struct FlowSpecParams {
    /// `p`: link capacity, bytes/second.
    pub link_capacity_bps: u64,
    /// `α`: max packet size, bytes.
    pub alpha: u32,
    /// `β_l`: flow-spec leak budget, bytes.
    pub beta_l: u32,
    /// `γ_l`: flow-spec leak rate, bytes/second.
    pub gamma_l_bps: u64,
    /// Desired EARDet high-bandwidth slope, bytes/second; determines `N`.
    pub gamma_h_bps: u64,
    /// RLFD's own `β`, bytes (distinct from the flow spec's `β_l`).
    pub rd_beta: u32,
    /// RLFD's own `γ`, bytes/second.
    pub rd_gamma_bps: u64,
    /// Scales `rlfd1.t_l` relative to the flow spec's `β_l/γ_l` ratio.
    pub t_l_factor: f64,
    /// Spreads `rlfd2`'s epoch length away from `rlfd1`'s so an attacker
    /// can't align its rate-limiting with a single epoch boundary.
    pub attacker_flow_factor: f64,
    pub max_watchlist_size: usize,
}

/// Output of [`derive`]: everything needed to construct EARDet and both
/// RLFDs for a [`crate::clef::CLEFDetector`].
#[derive(Debug, Clone, Copy)]
pub struct DerivedConfig {
    /// `N`, EARDet's counter count.
    pub num_counters: u32,
    /// Actual `γ_h = p / (N+1)`, recomputed from the chosen `N` (may differ
    /// slightly from the desired `gamma_h_bps` input due to flooring).
    pub gamma_h_bps: f64,
    pub beta_th: u32,
    pub beta_h: u32,
    pub max_virtual_packet_size: u32,
    pub rlfd1_t_l: Nanos,
    pub rlfd2_t_l: Nanos,
}

/// `spec.md` §4.7.
pub fn derive(p: &FlowSpecParams) -> DerivedConfig {
    let num_counters =
        (p.link_capacity_bps / p.gamma_h_bps).saturating_sub(1).max(1) as u32;

    let link_cap = p.link_capacity_bps as f64 / NANOS_PER_SEC;
    let gamma_h = link_cap / (num_counters as f64 + 1.0);
    let gamma_l = p.gamma_l_bps as f64 / NANOS_PER_SEC;

    let beta_th = (p.beta_l as f64 + (gamma_l * (p.alpha as f64 + p.beta_l as f64)) / (gamma_h - gamma_l))
        .floor() as u32
        + 1;
    let beta_h = 2 * beta_th + p.alpha;
    let max_virtual_packet_size = beta_th.saturating_sub(1);

    let flow_spec_ratio = p.beta_l as f64 / gamma_l;
    let rlfd1_t_l = (flow_spec_ratio * p.t_l_factor) as Nanos;

    let rd_gamma = p.rd_gamma_bps as f64 / NANOS_PER_SEC;
    let factor = ((2.0 * DEFAULT_DEPTH as f64 * gamma_h) / (p.attacker_flow_factor * rd_gamma)).floor()
        as Nanos;
    let rlfd2_t_l = factor * rlfd1_t_l;

    DerivedConfig {
        num_counters,
        gamma_h_bps: gamma_h * NANOS_PER_SEC,
        beta_th,
        beta_h,
        max_virtual_packet_size,
        rlfd1_t_l,
        rlfd2_t_l,
    }
}
