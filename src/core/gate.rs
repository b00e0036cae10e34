//! Agenda state machine.
//!
//! Scores reported by the voting engine open review gates; only a reviewer
//! decision moves a proposal past a review level. The legal moves are the
//! explicit table in [`next_level`]; everything else is an invalid state.

use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::core::actor::Actor;
use crate::core::state::{
    AgendaLevel, DepartmentAction, FacilityAction, GateDecision, GateDecisionRecord, Proposal,
    ReviewGate, VoteCount,
};
use crate::error::{AgendaError, Result};

/// The transition table: (current level, decision) → next level.
///
/// Returns `None` for every pair that is not a legal move.
pub fn next_level(level: AgendaLevel, decision: GateDecision) -> Option<AgendaLevel> {
    use AgendaLevel::*;

    match (level, decision) {
        (DeptReview, GateDecision::Department(DepartmentAction::ApproveAsDeptAgenda)) => {
            Some(DeptAgenda)
        }
        (DeptReview, GateDecision::Department(DepartmentAction::EscalateToFacility)) => {
            Some(FacilityAgenda)
        }
        (DeptReview, GateDecision::Department(DepartmentAction::Reject)) => Some(Rejected),
        (
            DeptAgenda | FacilityAgenda,
            GateDecision::Facility(FacilityAction::ApproveForCommittee),
        ) => Some(FacilityAgenda),
        (DeptAgenda | FacilityAgenda, GateDecision::Facility(FacilityAction::Reject)) => {
            Some(Rejected)
        }
        _ => None,
    }
}

/// Validate a decision reason and return it trimmed.
///
/// Length is counted in characters, not bytes, so Japanese reasons are
/// measured the way reviewers read them.
pub fn validate_reason(reason: Option<&str>, min_chars: usize) -> Result<String> {
    let trimmed = reason.map(str::trim).unwrap_or_default();
    if trimmed.chars().count() < min_chars {
        return Err(AgendaError::validation(format!(
            "reason must be at least {} characters",
            min_chars
        )));
    }
    Ok(trimmed.to_string())
}

/// The gate currently awaiting a decision on a proposal, if any.
///
/// The facility gate stays closed while the department gate is undecided,
/// even if the score already exceeds the facility threshold.
pub fn open_gate(proposal: &Proposal, config: &Config) -> Option<ReviewGate> {
    [ReviewGate::Department, ReviewGate::Facility]
        .into_iter()
        .find(|gate| check_gate(proposal, config, *gate).is_ok())
}

/// Explain why a gate is closed, or succeed if it is open.
pub fn check_gate(proposal: &Proposal, config: &Config, gate: ReviewGate) -> Result<()> {
    if proposal.decision_for(gate).is_some() {
        return Err(AgendaError::conflict(format!(
            "{} gate decision already recorded for proposal {}",
            gate, proposal.id
        )));
    }

    let level = proposal.agenda_level;
    let score = proposal.agenda_score;
    let gates = &config.gates;

    match gate {
        ReviewGate::Department => {
            if level == AgendaLevel::Pending {
                return Err(AgendaError::invalid_state(format!(
                    "score {} is below the department threshold {}",
                    score, gates.department_score
                )));
            }
            if level != AgendaLevel::DeptReview {
                return Err(AgendaError::invalid_state(format!(
                    "department gate is not open at level {}",
                    level
                )));
            }
        }
        ReviewGate::Facility => {
            if !matches!(level, AgendaLevel::DeptAgenda | AgendaLevel::FacilityAgenda) {
                return Err(AgendaError::invalid_state(format!(
                    "facility gate is not open at level {}",
                    level
                )));
            }
            if score < gates.facility_score {
                return Err(AgendaError::invalid_state(format!(
                    "score {} is below the facility threshold {}",
                    score, gates.facility_score
                )));
            }
        }
    }

    Ok(())
}

/// Outcome of an applied gate decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    /// The gate that decided.
    pub gate: ReviewGate,
    /// The decision applied.
    pub decision: GateDecision,
    /// Level before.
    pub from: AgendaLevel,
    /// Level after.
    pub to: AgendaLevel,
    /// Whether the proposal's document is now cleared for committee submission.
    pub committee_eligible: bool,
}

/// Agenda state machine over a single proposal.
///
/// All level mutations go through this struct.
#[derive(Debug)]
pub struct AgendaStateMachine<'a> {
    proposal: &'a mut Proposal,
    config: &'a Config,
}

impl<'a> AgendaStateMachine<'a> {
    /// Create a state machine over the given proposal.
    pub fn new(proposal: &'a mut Proposal, config: &'a Config) -> Self {
        Self { proposal, config }
    }

    /// Current agenda level.
    pub fn level(&self) -> AgendaLevel {
        self.proposal.agenda_level
    }

    /// The gate currently awaiting a decision, if any.
    pub fn open_gate(&self) -> Option<ReviewGate> {
        open_gate(&*self.proposal, self.config)
    }

    /// Check whether a gate accepts a decision right now.
    pub fn is_gate_open(&self, gate: ReviewGate) -> bool {
        check_gate(&*self.proposal, self.config, gate).is_ok()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Record a score and vote tally from the voting engine.
    ///
    /// Moves `PENDING → DEPT_REVIEW` once the department threshold is reached.
    /// Returns the new level when the level changed.
    pub fn record_score(&mut self, score: u32, votes: VoteCount) -> Result<Option<AgendaLevel>> {
        if score < self.proposal.agenda_score {
            return Err(AgendaError::validation(format!(
                "agenda score cannot decrease (current {}, reported {})",
                self.proposal.agenda_score, score
            )));
        }

        self.proposal.agenda_score = score;
        self.proposal.vote_count = votes;
        self.proposal.touch();

        if self.proposal.agenda_level == AgendaLevel::Pending
            && score >= self.config.gates.department_score
        {
            self.proposal.agenda_level = AgendaLevel::DeptReview;
            return Ok(Some(AgendaLevel::DeptReview));
        }

        Ok(None)
    }

    /// Apply a reviewer decision.
    ///
    /// Fails with `Validation` for a short reason, `Conflict` when the gate
    /// already has a recorded decision, and `InvalidState` when the gate is
    /// not open. Permission is checked by the caller's policy before this.
    pub fn decide(
        &mut self,
        decision: GateDecision,
        reason: Option<&str>,
        comment: Option<&str>,
        actor: &Actor,
    ) -> Result<Transition> {
        let reason = validate_reason(reason, self.config.validation.min_reason_chars)?;
        let gate = decision.gate();

        check_gate(&*self.proposal, self.config, gate)?;

        let from = self.proposal.agenda_level;
        let to = next_level(from, decision).ok_or_else(|| {
            AgendaError::invalid_state(format!(
                "{} is not allowed from {}",
                decision.action_name(),
                from
            ))
        })?;

        let now = Utc::now();
        self.proposal.decisions.push(GateDecisionRecord {
            decision,
            reason: reason.clone(),
            comment: comment
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from),
            decided_by: actor.clone(),
            decided_at: now,
            from_level: from,
            to_level: to,
            score_at_decision: self.proposal.agenda_score,
        });
        self.proposal.agenda_level = to;
        self.proposal.agenda_decision_reason = Some(reason);
        self.proposal.agenda_decision_by = Some(actor.id.clone());
        self.proposal.agenda_decision_at = Some(now);
        self.proposal.updated_at = now;

        Ok(Transition {
            gate,
            decision,
            from,
            to,
            committee_eligible: decision
                == GateDecision::Facility(FacilityAction::ApproveForCommittee),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::NewProposal;

    fn proposal() -> Proposal {
        Proposal::new(NewProposal {
            id: "P1".to_string(),
            content: "休憩室の空調を更新する".to_string(),
            author_id: "u-1".to_string(),
            author_name: "Suzuki".to_string(),
            department: "Facilities".to_string(),
            facility: "North Campus".to_string(),
        })
    }

    fn reviewer(level: u32) -> Actor {
        Actor::new(format!("r-{}", level), "Reviewer", level)
    }

    const DEPT_APPROVE: GateDecision =
        GateDecision::Department(DepartmentAction::ApproveAsDeptAgenda);
    const DEPT_ESCALATE: GateDecision =
        GateDecision::Department(DepartmentAction::EscalateToFacility);
    const DEPT_REJECT: GateDecision = GateDecision::Department(DepartmentAction::Reject);
    const FAC_APPROVE: GateDecision = GateDecision::Facility(FacilityAction::ApproveForCommittee);
    const FAC_REJECT: GateDecision = GateDecision::Facility(FacilityAction::Reject);

    const REASON: &str = "十分な支持が確認できたため";

    // =========================================================================
    // Transition table
    // =========================================================================

    #[test]
    fn test_table_department_gate() {
        assert_eq!(
            next_level(AgendaLevel::DeptReview, DEPT_APPROVE),
            Some(AgendaLevel::DeptAgenda)
        );
        assert_eq!(
            next_level(AgendaLevel::DeptReview, DEPT_ESCALATE),
            Some(AgendaLevel::FacilityAgenda)
        );
        assert_eq!(
            next_level(AgendaLevel::DeptReview, DEPT_REJECT),
            Some(AgendaLevel::Rejected)
        );
        assert_eq!(next_level(AgendaLevel::Pending, DEPT_APPROVE), None);
        assert_eq!(next_level(AgendaLevel::DeptAgenda, DEPT_APPROVE), None);
    }

    #[test]
    fn test_table_facility_gate() {
        assert_eq!(
            next_level(AgendaLevel::DeptAgenda, FAC_APPROVE),
            Some(AgendaLevel::FacilityAgenda)
        );
        assert_eq!(
            next_level(AgendaLevel::FacilityAgenda, FAC_APPROVE),
            Some(AgendaLevel::FacilityAgenda)
        );
        assert_eq!(
            next_level(AgendaLevel::FacilityAgenda, FAC_REJECT),
            Some(AgendaLevel::Rejected)
        );
        assert_eq!(next_level(AgendaLevel::DeptReview, FAC_APPROVE), None);
        assert_eq!(next_level(AgendaLevel::Rejected, FAC_APPROVE), None);
        assert_eq!(next_level(AgendaLevel::CorpReview, FAC_APPROVE), None);
    }

    // =========================================================================
    // Scores
    // =========================================================================

    #[test]
    fn test_score_below_threshold_stays_pending() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);

        assert_eq!(sm.record_score(49, VoteCount::new(40, 5, 4)).unwrap(), None);
        assert_eq!(sm.level(), AgendaLevel::Pending);
        assert_eq!(sm.open_gate(), None);
    }

    #[test]
    fn test_score_at_threshold_enters_review() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);

        let changed = sm.record_score(50, VoteCount::new(45, 3, 2)).unwrap();
        assert_eq!(changed, Some(AgendaLevel::DeptReview));
        assert_eq!(sm.open_gate(), Some(ReviewGate::Department));
        assert_eq!(p.vote_count.approve, 45);
    }

    #[test]
    fn test_score_cannot_decrease() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);

        sm.record_score(60, VoteCount::default()).unwrap();
        let err = sm.record_score(59, VoteCount::default()).unwrap_err();
        assert!(matches!(err, AgendaError::Validation { .. }));
        assert_eq!(p.agenda_score, 60);
    }

    #[test]
    fn test_score_does_not_skip_review_levels() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);

        sm.record_score(150, VoteCount::default()).unwrap();
        assert_eq!(sm.level(), AgendaLevel::DeptReview);
        // Facility gate waits for the department decision
        assert_eq!(sm.open_gate(), Some(ReviewGate::Department));
        assert!(!sm.is_gate_open(ReviewGate::Facility));
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    #[test]
    fn test_department_approve() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(52, VoteCount::default()).unwrap();

        let t = sm
            .decide(DEPT_APPROVE, Some(REASON), None, &reviewer(6))
            .unwrap();

        assert_eq!(t.from, AgendaLevel::DeptReview);
        assert_eq!(t.to, AgendaLevel::DeptAgenda);
        assert!(!t.committee_eligible);
        assert_eq!(p.agenda_level, AgendaLevel::DeptAgenda);
        assert_eq!(p.agenda_decision_reason.as_deref(), Some(REASON));
        assert_eq!(p.agenda_decision_by.as_deref(), Some("r-6"));
        assert!(p.agenda_decision_at.is_some());
        assert_eq!(p.decisions.len(), 1);
        assert_eq!(p.decisions[0].score_at_decision, 52);
    }

    #[test]
    fn test_department_escalate_then_facility_approve() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(70, VoteCount::default()).unwrap();
        sm.decide(DEPT_ESCALATE, Some(REASON), None, &reviewer(6))
            .unwrap();
        assert_eq!(sm.level(), AgendaLevel::FacilityAgenda);
        assert!(!sm.is_gate_open(ReviewGate::Facility));

        sm.record_score(100, VoteCount::default()).unwrap();
        assert_eq!(sm.open_gate(), Some(ReviewGate::Facility));

        let t = sm
            .decide(FAC_APPROVE, Some("施設全体の課題として重要"), None, &reviewer(8))
            .unwrap();
        assert_eq!(t.to, AgendaLevel::FacilityAgenda);
        assert!(t.committee_eligible);
        assert_eq!(p.decisions.len(), 2);
    }

    #[test]
    fn test_short_reason_rejected() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(52, VoteCount::default()).unwrap();

        let err = sm
            .decide(DEPT_APPROVE, Some("too short"), None, &reviewer(6))
            .unwrap_err();
        assert!(matches!(err, AgendaError::Validation { .. }));
        assert_eq!(err.to_string(), "validation error: reason must be at least 10 characters");

        let err = sm.decide(DEPT_APPROVE, None, None, &reviewer(6)).unwrap_err();
        assert!(matches!(err, AgendaError::Validation { .. }));

        assert_eq!(p.agenda_level, AgendaLevel::DeptReview);
        assert!(p.decisions.is_empty());
    }

    #[test]
    fn test_reason_counts_characters_not_bytes() {
        // 10 kanji = 30 bytes but exactly 10 characters
        assert!(validate_reason(Some("一二三四五六七八九十"), 10).is_ok());
        assert!(validate_reason(Some("一二三四五六七八九"), 10).is_err());
        // Surrounding whitespace does not count
        assert!(validate_reason(Some("   abcdefghi   "), 10).is_err());
    }

    #[test]
    fn test_replayed_decision_conflicts() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(52, VoteCount::default()).unwrap();
        sm.decide(DEPT_APPROVE, Some(REASON), None, &reviewer(6))
            .unwrap();

        let err = sm
            .decide(DEPT_APPROVE, Some(REASON), None, &reviewer(6))
            .unwrap_err();
        assert!(matches!(err, AgendaError::Conflict { .. }));
        assert_eq!(p.decisions.len(), 1);
    }

    #[test]
    fn test_department_decision_below_threshold_is_invalid_state() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(30, VoteCount::default()).unwrap();

        let err = sm
            .decide(DEPT_APPROVE, Some(REASON), None, &reviewer(9))
            .unwrap_err();
        assert!(matches!(err, AgendaError::InvalidState { .. }));
        assert_eq!(p.agenda_level, AgendaLevel::Pending);
    }

    #[test]
    fn test_facility_decision_below_threshold_is_invalid_state() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(60, VoteCount::default()).unwrap();
        sm.decide(DEPT_APPROVE, Some(REASON), None, &reviewer(6))
            .unwrap();

        let err = sm
            .decide(FAC_APPROVE, Some(REASON), None, &reviewer(8))
            .unwrap_err();
        assert!(matches!(err, AgendaError::InvalidState { .. }));
        assert!(err.to_string().contains("facility threshold 100"));
    }

    #[test]
    fn test_rejected_proposal_is_closed() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(120, VoteCount::default()).unwrap();
        sm.decide(DEPT_REJECT, Some(REASON), None, &reviewer(6))
            .unwrap();

        assert_eq!(sm.level(), AgendaLevel::Rejected);
        assert_eq!(sm.open_gate(), None);

        // Scores still accrue, but nothing reopens
        assert_eq!(sm.record_score(130, VoteCount::default()).unwrap(), None);
        let err = sm
            .decide(FAC_APPROVE, Some(REASON), None, &reviewer(8))
            .unwrap_err();
        assert!(matches!(err, AgendaError::InvalidState { .. }));
    }

    #[test]
    fn test_comment_is_trimmed_and_blank_dropped() {
        let mut p = proposal();
        let config = Config::default();
        let mut sm = AgendaStateMachine::new(&mut p, &config);
        sm.record_score(52, VoteCount::default()).unwrap();
        sm.decide(DEPT_APPROVE, Some(REASON), Some("   "), &reviewer(6))
            .unwrap();
        assert!(p.decisions[0].comment.is_none());
    }

    #[test]
    fn test_custom_thresholds() {
        let mut p = proposal();
        let mut config = Config::default();
        config.gates.department_score = 10;
        config.gates.facility_score = 20;
        let mut sm = AgendaStateMachine::new(&mut p, &config);

        sm.record_score(25, VoteCount::default()).unwrap();
        sm.decide(DEPT_APPROVE, Some(REASON), None, &reviewer(6))
            .unwrap();
        assert_eq!(sm.open_gate(), Some(ReviewGate::Facility));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_level() -> impl Strategy<Value = AgendaLevel> {
            prop_oneof![
                Just(AgendaLevel::Pending),
                Just(AgendaLevel::DeptReview),
                Just(AgendaLevel::DeptAgenda),
                Just(AgendaLevel::FacilityAgenda),
                Just(AgendaLevel::CorpReview),
                Just(AgendaLevel::CorpAgenda),
                Just(AgendaLevel::Rejected),
            ]
        }

        fn arb_decision() -> impl Strategy<Value = GateDecision> {
            prop_oneof![
                Just(DEPT_APPROVE),
                Just(DEPT_ESCALATE),
                Just(DEPT_REJECT),
                Just(FAC_APPROVE),
                Just(FAC_REJECT),
            ]
        }

        proptest! {
            // Property: terminal levels have no outgoing transitions
            #[test]
            fn prop_terminal_levels_are_final(level in arb_level(), decision in arb_decision()) {
                if level.is_terminal() {
                    prop_assert_eq!(next_level(level, decision), None);
                }
            }

            // Property: a legal transition never moves backwards in the pipeline
            #[test]
            fn prop_transitions_never_regress(level in arb_level(), decision in arb_decision()) {
                if let Some(to) = next_level(level, decision) {
                    if let (Some(from_rank), Some(to_rank)) = (level.rank(), to.rank()) {
                        prop_assert!(to_rank >= from_rank);
                    } else {
                        prop_assert_eq!(to, AgendaLevel::Rejected);
                    }
                }
            }

            // Property: rejections always land on REJECTED
            #[test]
            fn prop_reject_lands_on_rejected(level in arb_level(), decision in arb_decision()) {
                if let Some(to) = next_level(level, decision) {
                    prop_assert_eq!(to == AgendaLevel::Rejected, !decision.is_approval());
                }
            }

            // Property: below the department threshold nothing leaves PENDING
            #[test]
            fn prop_below_threshold_stays_pending(
                score in 0u32..50,
                decision in arb_decision(),
                level in 0u32..20,
            ) {
                let mut p = proposal();
                let config = Config::default();
                let mut sm = AgendaStateMachine::new(&mut p, &config);
                sm.record_score(score, VoteCount::default()).unwrap();
                let result = sm.decide(decision, Some(REASON), None, &reviewer(level));

                prop_assert!(result.is_err());
                prop_assert_eq!(p.agenda_level, AgendaLevel::Pending);
            }

            // Property: short reasons never change the level
            #[test]
            fn prop_short_reason_never_applies(reason in "[a-z]{0,9}", score in 50u32..200) {
                let mut p = proposal();
                let config = Config::default();
                let mut sm = AgendaStateMachine::new(&mut p, &config);
                sm.record_score(score, VoteCount::default()).unwrap();
                let result = sm.decide(DEPT_APPROVE, Some(&reason), None, &reviewer(9));

                prop_assert!(
                    matches!(result, Err(AgendaError::Validation { .. })),
                    "expected a validation error"
                );
                prop_assert_eq!(p.agenda_level, AgendaLevel::DeptReview);
            }
        }
    }
}
