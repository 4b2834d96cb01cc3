//! The data-quality gate evaluated between staging and reconciliation.
//!
//! The gate is a pass/fail precondition, not row-level validation: it looks
//! only at staged row counts. Which counts it requires is policy, so the
//! default reproduces the minimal upstream behaviour (staged sales must be
//! non-empty) while a stricter deployment can also demand reference rows.

use serde::{Deserialize, Serialize};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Which staged relations must be non-empty for the gate to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
  pub require_staged_sales:     bool,
  pub require_staged_merchants: bool,
}

impl Default for GatePolicy {
  fn default() -> Self {
    Self {
      require_staged_sales:     true,
      require_staged_merchants: false,
    }
  }
}

impl GatePolicy {
  /// Evaluate the policy against observed staged row counts.
  pub fn evaluate(&self, staged_sales: u64, staged_merchants: u64) -> GateReport {
    let mut violations = Vec::new();
    if self.require_staged_sales && staged_sales == 0 {
      violations.push(GateViolation::EmptyStagedSales);
    }
    if self.require_staged_merchants && staged_merchants == 0 {
      violations.push(GateViolation::EmptyStagedMerchants);
    }
    GateReport { staged_sales, staged_merchants, violations }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateViolation {
  EmptyStagedSales,
  EmptyStagedMerchants,
}

impl std::fmt::Display for GateViolation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::EmptyStagedSales => write!(f, "staged sales relation is empty"),
      Self::EmptyStagedMerchants => write!(f, "staged merchants relation is empty"),
    }
  }
}

/// Observed counts plus any policy violations. Empty `violations` means the
/// gate passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
  pub staged_sales:     u64,
  pub staged_merchants: u64,
  pub violations:       Vec<GateViolation>,
}

impl GateReport {
  pub fn passed(&self) -> bool {
    self.violations.is_empty()
  }
}

impl std::fmt::Display for GateReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.passed() {
      return write!(
        f,
        "passed ({} staged sales, {} staged merchants)",
        self.staged_sales, self.staged_merchants
      );
    }
    let reasons: Vec<String> =
      self.violations.iter().map(ToString::to_string).collect();
    write!(f, "{}", reasons.join("; "))
  }
}
