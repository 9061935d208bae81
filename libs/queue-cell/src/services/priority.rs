use crate::models::{PriorityFlag, PriorityFlagKind, PriorityLevel};

/// Derives a ticket's priority bucket from the patient's active flags at
/// creation time. Strict precedence, first match wins; flags are never
/// combined or weighted. Later flag changes do not touch issued tickets.
pub struct PriorityClassifier;

impl PriorityClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, flags: &[PriorityFlag]) -> PriorityLevel {
        let has = |kind: PriorityFlagKind| flags.iter().any(|f| f.is_active && f.flag == kind);

        if has(PriorityFlagKind::Emergency) {
            PriorityLevel::Emergency
        } else if has(PriorityFlagKind::Senior) || has(PriorityFlagKind::Pwd) {
            PriorityLevel::SeniorPwd
        } else if has(PriorityFlagKind::Philhealth) {
            PriorityLevel::Philhealth
        } else {
            PriorityLevel::Regular
        }
    }
}

impl Default for PriorityClassifier {
    fn default() -> Self {
        Self::new()
    }
}
