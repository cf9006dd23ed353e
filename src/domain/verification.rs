use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::order::OrderLine;

/// Per-line unit counter maintained while an order is being packed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineVerification {
    pub line_id: Uuid,
    pub order_id: Uuid,
    pub required_scans: i32,
    pub scanned_count: i32,
    pub is_verified: bool,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

impl LineVerification {
    /// Fresh counter for `line`: nothing scanned yet.
    pub fn for_line(line: &OrderLine) -> Self {
        Self {
            line_id: line.id,
            order_id: line.order_id,
            required_scans: line.quantity,
            scanned_count: 0,
            is_verified: false,
            notes: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Restart counting against `quantity`, recording why in the notes.
    pub fn reset(&mut self, quantity: i32, note: &str) {
        self.required_scans = quantity;
        self.scanned_count = 0;
        self.is_verified = false;
        self.notes = append_note(&self.notes, note);
        self.updated_at = Utc::now();
    }

    /// Count one unit. Returns `false` without touching anything when every
    /// required unit has already been scanned.
    pub fn try_increment(&mut self) -> bool {
        if self.scanned_count >= self.required_scans {
            return false;
        }
        self.scanned_count += 1;
        self.is_verified = self.scanned_count == self.required_scans;
        self.updated_at = Utc::now();
        true
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            line_id: self.line_id,
            scanned_count: self.scanned_count,
            required_scans: self.required_scans,
            is_verified: self.is_verified,
        }
    }
}

/// Append an audit note, `|`-separated like the packing floor's existing notes.
pub fn append_note(existing: &str, note: &str) -> String {
    if existing.is_empty() {
        note.to_string()
    } else {
        format!("{existing} | {note}")
    }
}

/// Result of a counted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub line_id: Uuid,
    pub scanned_count: i32,
    pub required_scans: i32,
    pub is_verified: bool,
}

/// A line together with its counter, if packaging has created one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineProgress {
    pub line: OrderLine,
    pub verification: Option<LineVerification>,
}

impl LineProgress {
    /// The counter no longer matches the line's quantity, so its scans say
    /// nothing about the units actually packed.
    pub fn is_drifted(&self) -> bool {
        self.verification
            .as_ref()
            .is_some_and(|v| v.required_scans != self.line.quantity)
    }

    pub fn is_verified(&self) -> bool {
        !self.is_drifted() && self.verification.as_ref().is_some_and(|v| v.is_verified)
    }
}

/// A line blocking packaging completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnverifiedLine {
    pub line_id: Uuid,
    pub description: String,
    pub scanned_count: i32,
    pub required_scans: i32,
}

/// Lines that keep an order from leaving packaging. Drifted counters are
/// reported against the current quantity with zero scans.
pub fn unverified_lines(lines: &[LineProgress]) -> Vec<UnverifiedLine> {
    lines
        .iter()
        .filter(|p| !p.is_verified())
        .map(|p| UnverifiedLine {
            line_id: p.line.id,
            description: p.line.description.clone(),
            scanned_count: match &p.verification {
                Some(v) if !p.is_drifted() => v.scanned_count,
                _ => 0,
            },
            required_scans: p.line.quantity,
        })
        .collect()
}

/// Aggregate verification completeness of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub order_id: Uuid,
    pub total_lines: i64,
    pub verified_lines: i64,
}

impl VerificationSummary {
    pub fn is_complete(&self) -> bool {
        self.total_lines > 0 && self.verified_lines == self.total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_code: "ABC".to_string(),
            description: "Liquipops 350g".to_string(),
            quantity,
        }
    }

    #[test]
    fn exactly_quantity_increments_verify_the_line() {
        let l = line(3);
        let mut v = LineVerification::for_line(&l);

        assert!(v.try_increment());
        assert!(v.try_increment());
        assert!(!v.is_verified, "N-1 scans must not verify");
        assert!(v.try_increment());
        assert!(v.is_verified);
        assert_eq!(v.scanned_count, 3);
    }

    #[test]
    fn increment_past_required_is_refused_without_change() {
        let l = line(1);
        let mut v = LineVerification::for_line(&l);
        assert!(v.try_increment());

        let before = v.clone();
        assert!(!v.try_increment());
        assert_eq!(v.scanned_count, before.scanned_count);
        assert!(v.is_verified);
    }

    #[test]
    fn reset_rederives_required_and_appends_note() {
        let l = line(2);
        let mut v = LineVerification::for_line(&l);
        v.try_increment();
        v.try_increment();

        v.reset(5, "quantity changed to 5");
        assert_eq!(v.required_scans, 5);
        assert_eq!(v.scanned_count, 0);
        assert!(!v.is_verified);
        assert_eq!(v.notes, "quantity changed to 5");

        v.reset(5, "manual reset");
        assert_eq!(v.notes, "quantity changed to 5 | manual reset");
    }

    #[test]
    fn drifted_counter_is_never_verified() {
        let mut l = line(2);
        let mut v = LineVerification::for_line(&l);
        v.try_increment();
        v.try_increment();
        l.quantity = 4;

        let progress = LineProgress { line: l, verification: Some(v) };
        assert!(progress.is_drifted());
        assert!(!progress.is_verified());

        let pending = unverified_lines(std::slice::from_ref(&progress));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scanned_count, 0);
        assert_eq!(pending[0].required_scans, 4);
    }

    #[test]
    fn missing_counter_counts_as_unverified() {
        let progress = LineProgress { line: line(1), verification: None };
        assert!(!progress.is_drifted());
        assert_eq!(unverified_lines(&[progress]).len(), 1);
    }

    #[test]
    fn summary_of_empty_order_is_not_complete() {
        let summary = VerificationSummary {
            order_id: Uuid::new_v4(),
            total_lines: 0,
            verified_lines: 0,
        };
        assert!(!summary.is_complete());
    }
}
