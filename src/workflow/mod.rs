//! The agenda workflow: review gates, documents, and committee submission.
//!
//! [`Workflow`] wires the three components over one shared repository.

pub mod documents;
pub mod policy;
pub mod review;
pub mod submissions;

pub use documents::ProposalDocumentStore;
pub use policy::{Operation, PermissionPolicy, PolicyDecision};
pub use review::{DecisionInput, DecisionOutcome, ReviewGateHandlers};
pub use submissions::CommitteeSubmissionCoordinator;

use crate::config::Config;
use crate::storage::Repository;

/// All workflow components over one repository.
#[derive(Debug, Clone)]
pub struct Workflow<R: Repository + Clone> {
    pub review: ReviewGateHandlers<R>,
    pub documents: ProposalDocumentStore<R>,
    pub submissions: CommitteeSubmissionCoordinator<R>,
}

impl<R: Repository + Clone> Workflow<R> {
    /// Build the workflow over a repository.
    pub fn new(repo: R, config: Config) -> Self {
        let documents = ProposalDocumentStore::new(repo.clone(), &config);
        Self {
            submissions: CommitteeSubmissionCoordinator::new(documents.clone(), &config),
            documents,
            review: ReviewGateHandlers::new(repo, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Actor, AgendaLevel, AuditAction, DepartmentAction, DocumentStatus, FacilityAction,
        ManagerAnnotation, NewProposal, RecommendationLevel, SubmissionStatus, VoteCount,
    };
    use crate::error::AgendaError;
    use crate::storage::{FileRepository, MemoryRepository};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    const COMMITTEE: &str = "運営委員会";

    fn new_proposal(id: &str) -> NewProposal {
        NewProposal {
            id: id.to_string(),
            content: "送迎車の朝便を一本増やす\n朝の送迎が定員超過している".to_string(),
            author_id: "u-100".to_string(),
            author_name: "Yamada".to_string(),
            department: "Day Care".to_string(),
            facility: "North".to_string(),
        }
    }

    /// Drive a proposal to a ready, committee-eligible document.
    fn ready_document<R: Repository + Clone>(wf: &Workflow<R>, id: &str) -> String {
        wf.review.register_proposal(new_proposal(id)).unwrap();
        wf.review
            .record_score(id, 101, VoteCount::new(85, 10, 6))
            .unwrap();
        wf.review
            .decide_department(
                id,
                DecisionInput::new(
                    DepartmentAction::ApproveAsDeptAgenda,
                    "部署として優先的に取り組む",
                ),
                &Actor::new("chief", "Chief", 6),
            )
            .unwrap();
        let outcome = wf
            .review
            .decide_facility(
                id,
                DecisionInput::new(
                    FacilityAction::ApproveForCommittee,
                    "施設全体の送迎計画に関わるため",
                ),
                &Actor::new("director", "Director", 8),
            )
            .unwrap();
        let doc_id = outcome.document.unwrap().id;
        wf.documents
            .mark_ready(&doc_id, &Actor::new("chief", "Chief", 6))
            .unwrap();
        doc_id
    }

    #[test]
    fn test_scenario_p1_end_to_end() {
        let wf = Workflow::new(Arc::new(MemoryRepository::new()), Config::default());
        let dept_head = Actor::new("dept-head", "Dept Head", 6);
        let director = Actor::new("director", "Director", 8);
        let preparer = Actor::new("preparer", "Preparer", 7);

        wf.review.register_proposal(new_proposal("P1")).unwrap();

        // Score 52 opens gate 1
        let p = wf
            .review
            .record_score("P1", 52, VoteCount::new(45, 4, 3))
            .unwrap();
        assert_eq!(p.agenda_level, AgendaLevel::DeptReview);

        let outcome = wf
            .review
            .decide_department(
                "P1",
                DecisionInput::new(
                    DepartmentAction::ApproveAsDeptAgenda,
                    "利用者満足度の向上が見込めるため",
                ),
                &dept_head,
            )
            .unwrap();
        assert_eq!(outcome.proposal.agenda_level, AgendaLevel::DeptAgenda);
        let doc_id = outcome.document.unwrap().id;

        // Score 101 opens gate 2
        wf.review
            .record_score("P1", 101, VoteCount::new(85, 10, 6))
            .unwrap();
        let outcome = wf
            .review
            .decide_facility(
                "P1",
                DecisionInput::new(
                    FacilityAction::ApproveForCommittee,
                    "施設全体の送迎計画に関わるため",
                ),
                &director,
            )
            .unwrap();
        assert_eq!(outcome.proposal.agenda_level, AgendaLevel::FacilityAgenda);

        wf.documents
            .annotate(
                &doc_id,
                ManagerAnnotation {
                    manager_notes: Some("車両リース費用は既存予算内".to_string()),
                    recommendation_level: Some(RecommendationLevel::Recommend),
                    ..Default::default()
                },
                &dept_head,
            )
            .unwrap();
        wf.documents.mark_ready(&doc_id, &dept_head).unwrap();

        let request = wf
            .submissions
            .create_request(&doc_id, COMMITTEE, &preparer)
            .unwrap();
        let approved = wf
            .submissions
            .approve(&request.id, &director, None)
            .unwrap();
        assert_eq!(approved.status, SubmissionStatus::Approved);

        let doc = wf.documents.get(&doc_id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Submitted);
        assert_eq!(doc.target_committee.as_deref(), Some(COMMITTEE));

        let actions: Vec<AuditAction> = wf
            .documents
            .audit_log(&doc_id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::DocumentCreated,
                AuditAction::CommitteeEligible,
                AuditAction::Annotated,
                AuditAction::MarkedReady,
                AuditAction::SubmissionRequested,
                AuditAction::Submitted,
            ]
        );
    }

    #[test]
    fn test_scenario_double_request_conflicts() {
        let wf = Workflow::new(Arc::new(MemoryRepository::new()), Config::default());
        let doc_id = ready_document(&wf, "P1");
        let preparer = Actor::new("preparer", "Preparer", 7);

        wf.submissions
            .create_request(&doc_id, COMMITTEE, &preparer)
            .unwrap();
        let err = wf
            .submissions
            .create_request(&doc_id, COMMITTEE, &preparer)
            .unwrap_err();
        assert!(matches!(err, AgendaError::Conflict { .. }));
        assert_eq!(err.status_code(), 409);
        assert_eq!(wf.submissions.pending_requests().unwrap().len(), 1);
    }

    #[test]
    fn test_audit_log_only_grows() {
        let wf = Workflow::new(Arc::new(MemoryRepository::new()), Config::default());
        let doc_id = ready_document(&wf, "P1");
        let preparer = Actor::new("preparer", "Preparer", 7);
        let approver = Actor::new("approver", "Approver", 8);

        let snapshot = wf.documents.audit_log(&doc_id).unwrap();
        let request = wf
            .submissions
            .create_request(&doc_id, COMMITTEE, &preparer)
            .unwrap();
        // Failed operations append nothing
        assert!(wf
            .submissions
            .create_request(&doc_id, COMMITTEE, &preparer)
            .is_err());
        assert!(wf.submissions.reject(&request.id, &approver, " ").is_err());
        wf.submissions
            .reject(&request.id, &approver, "審議資料が不足")
            .unwrap();

        let log = wf.documents.audit_log(&doc_id).unwrap();
        assert_eq!(log.len(), snapshot.len() + 2);
        assert_eq!(&log[..snapshot.len()], &snapshot[..]);
        assert!(log.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
        assert!(log.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_concurrent_create_request_has_one_winner() {
        let repo = Arc::new(MemoryRepository::new());
        let wf = Workflow::new(repo, Config::default());
        let doc_id = ready_document(&wf, "P1");

        const CALLERS: usize = 8;
        let barrier = Arc::new(Barrier::new(CALLERS));
        let handles: Vec<_> = (0..CALLERS)
            .map(|i| {
                let wf = wf.clone();
                let doc_id = doc_id.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let preparer = Actor::new(format!("preparer-{}", i), "Preparer", 7);
                    barrier.wait();
                    wf.submissions.create_request(&doc_id, COMMITTEE, &preparer)
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for result in results.iter().filter(|r| r.is_err()) {
            match result {
                Err(AgendaError::Conflict { .. }) => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(wf.submissions.pending_requests().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_approve_and_reject_have_one_winner() {
        let wf = Workflow::new(Arc::new(MemoryRepository::new()), Config::default());
        let doc_id = ready_document(&wf, "P1");
        let request = wf
            .submissions
            .create_request(&doc_id, COMMITTEE, &Actor::new("p", "Preparer", 7))
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let approve = {
            let wf = wf.clone();
            let id = request.id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                wf.submissions
                    .approve(&id, &Actor::new("a", "Approver", 8), None)
                    .map(|r| r.status)
            })
        };
        let reject = {
            let wf = wf.clone();
            let id = request.id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                wf.submissions
                    .reject(&id, &Actor::new("b", "Approver", 9), "別委員会で扱う")
                    .map(|r| r.status)
            })
        };

        let outcomes = [approve.join().unwrap(), reject.join().unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        for outcome in &outcomes {
            if let Err(err) = outcome {
                // Lost the race at commit, or arrived after the winner committed
                assert!(matches!(
                    err,
                    AgendaError::Conflict { .. } | AgendaError::InvalidState { .. }
                ));
            }
        }

        let stored = wf.submissions.get(&request.id).unwrap();
        let doc = wf.documents.get(&doc_id).unwrap();
        match stored.status {
            SubmissionStatus::Approved => assert_eq!(doc.status, DocumentStatus::Submitted),
            SubmissionStatus::Rejected => assert_eq!(doc.status, DocumentStatus::Ready),
            SubmissionStatus::Pending => panic!("request left pending"),
        }
    }

    #[test]
    fn test_separate_file_repositories_race_to_one_winner() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let setup = Workflow::new(FileRepository::with_path(&path).unwrap(), Config::default());

        for round in 0..10 {
            let doc_id = ready_document(&setup, &format!("P{}", round));
            let request = setup
                .submissions
                .create_request(&doc_id, COMMITTEE, &Actor::new("p", "Preparer", 7))
                .unwrap();

            // Each caller opens its own repository, as two CLI processes would
            let barrier = Arc::new(Barrier::new(2));
            let approve = {
                let wf = Workflow::new(FileRepository::with_path(&path).unwrap(), Config::default());
                let id = request.id.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    wf.submissions
                        .approve(&id, &Actor::new("a", "Approver", 8), None)
                        .map(|r| r.status)
                })
            };
            let reject = {
                let wf = Workflow::new(FileRepository::with_path(&path).unwrap(), Config::default());
                let id = request.id.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    wf.submissions
                        .reject(&id, &Actor::new("b", "Approver", 9), "別委員会で扱う")
                        .map(|r| r.status)
                })
            };

            let outcomes = [approve.join().unwrap(), reject.join().unwrap()];
            let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
            assert_eq!(winners.len(), 1, "round {}: {:?}", round, outcomes);
            for outcome in &outcomes {
                if let Err(err) = outcome {
                    assert_eq!(err.status_code(), 409, "round {}: {:?}", round, err);
                }
            }

            // The stored state is the decision the winner was told about
            let stored = setup.submissions.get(&request.id).unwrap();
            let doc = setup.documents.get(&doc_id).unwrap();
            assert_eq!(&stored.status, winners[0]);
            match stored.status {
                SubmissionStatus::Approved => assert_eq!(doc.status, DocumentStatus::Submitted),
                SubmissionStatus::Rejected => assert_eq!(doc.status, DocumentStatus::Ready),
                SubmissionStatus::Pending => panic!("request left pending"),
            }
        }
    }

    #[test]
    fn test_workflow_over_file_repository() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::with_path(dir.path().join("state.json")).unwrap();
        let wf = Workflow::new(repo.clone(), Config::default());
        let doc_id = ready_document(&wf, "P1");

        // A fresh workflow over the same file sees the same state
        let reopened = Workflow::new(
            FileRepository::with_path(repo.path()).unwrap(),
            Config::default(),
        );
        assert_eq!(
            reopened.documents.get(&doc_id).unwrap().status,
            DocumentStatus::Ready
        );
        assert_eq!(reopened.documents.audit_log(&doc_id).unwrap().len(), 3);
    }
}
