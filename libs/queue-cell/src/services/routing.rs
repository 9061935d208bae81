use crate::models::{FlowStep, FlowStepState, PriorityLevel, StationType, VisitType};

/// Computes the ordered list of station types a ticket must pass through for
/// a visit, and classifies each step's progress for display.
pub struct RoutingEngine;

impl RoutingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Base flow is checkin -> triage -> consultation. Extended visits
    /// continue with billing, lab, pharmacy and document release; billing is
    /// omitted entirely when PhilHealth coverage makes it a zero-cost no-op.
    pub fn station_flow(
        &self,
        visit_type: &VisitType,
        priority_level: &PriorityLevel,
    ) -> Vec<StationType> {
        let mut flow = vec![
            StationType::Checkin,
            StationType::Triage,
            StationType::Consultation,
        ];

        if *visit_type == VisitType::ConsultationOnly {
            return flow;
        }

        if *priority_level != PriorityLevel::Philhealth {
            flow.push(StationType::Billing);
        }
        flow.push(StationType::Lab);
        flow.push(StationType::Pharmacy);
        flow.push(StationType::Document);

        flow
    }

    /// The station type immediately after `current` in the flow, if any.
    pub fn next_station_type(
        &self,
        flow: &[StationType],
        current: StationType,
    ) -> Option<StationType> {
        let idx = flow.iter().position(|s| *s == current)?;
        flow.get(idx + 1).copied()
    }

    /// Three-way progress partition over the flow: everything before the
    /// current station type is completed, exactly one step is current, the
    /// rest are pending.
    pub fn flow_status(&self, flow: &[StationType], current: StationType) -> Vec<FlowStep> {
        let current_idx = flow.iter().position(|s| *s == current);

        flow.iter()
            .enumerate()
            .map(|(i, station_type)| {
                let state = match current_idx {
                    Some(c) if i < c => FlowStepState::Completed,
                    Some(c) if i == c => FlowStepState::Current,
                    _ => FlowStepState::Pending,
                };
                FlowStep {
                    station_type: *station_type,
                    state,
                }
            })
            .collect()
    }
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}
