//! Lifecycle of one analysis request.
//!
//! `Idle -> Submitting -> {Success, Error}`, and back to `Idle` only through
//! [`RequestOrchestrator::reset`]. `submit` borrows the orchestrator mutably
//! for the whole outbound call, so a second submission cannot start while one
//! is in flight; a submission attempted outside `Idle` is rejected before any
//! request is built.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::entities::report::AnalysisReport;
use crate::entities::request::{AnalysisRequest, DrugSelection, GenomeFile};
use crate::error::PharmaGuardError;
use crate::sources::analysis::AnalysisService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Success,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Submitting => "submitting",
            Phase::Success => "complete",
            Phase::Error => "failed",
        })
    }
}

/// Identifies the in-flight submission an outcome belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    ticket: u64,
    pub file_name: String,
    pub drugs: String,
}

/// Why the last submission failed, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    /// HTTP status when the service answered; `None` when no response arrived.
    pub status: Option<u16>,
}

#[derive(Debug)]
pub enum RequestState {
    Idle,
    Submitting(Submission),
    Success(AnalysisReport),
    Error(Failure),
}

impl RequestState {
    pub fn phase(&self) -> Phase {
        match self {
            RequestState::Idle => Phase::Idle,
            RequestState::Submitting(_) => Phase::Submitting,
            RequestState::Success(_) => Phase::Success,
            RequestState::Error(_) => Phase::Error,
        }
    }
}

pub struct RequestOrchestrator<S> {
    service: S,
    state: RequestState,
    issued: u64,
}

impl<S: AnalysisService> RequestOrchestrator<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: RequestState::Idle,
            issued: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn can_submit(&self) -> bool {
        self.phase() == Phase::Idle
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match &self.state {
            RequestState::Success(report) => Some(report),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.state {
            RequestState::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// Checks preconditions and enters `Submitting`.
    ///
    /// # Errors
    ///
    /// [`PharmaGuardError::InvalidTransition`] outside `Idle`, and
    /// [`PharmaGuardError::Validation`] when the file or drugs are missing. The
    /// state is unchanged in both cases.
    pub fn begin(
        &mut self,
        genome_file: Option<&GenomeFile>,
        drugs: &DrugSelection,
    ) -> Result<(Submission, AnalysisRequest), PharmaGuardError> {
        let phase = self.phase();
        if phase != Phase::Idle {
            return Err(PharmaGuardError::InvalidTransition {
                action: "submit",
                phase,
            });
        }
        let request = AnalysisRequest::build(genome_file, drugs)?;

        self.issued += 1;
        let submission = Submission {
            ticket: self.issued,
            file_name: request.genome_file.name().to_string(),
            drugs: request.drugs.joined(),
        };
        info!(
            ticket = submission.ticket,
            file = %submission.file_name,
            drugs = %submission.drugs,
            "analysis submitting"
        );
        self.state = RequestState::Submitting(submission.clone());
        Ok((submission, request))
    }

    /// Applies the outcome of `submission`. Outcomes for anything other than
    /// the current in-flight submission are discarded.
    pub fn resolve(
        &mut self,
        submission: &Submission,
        outcome: Result<Value, PharmaGuardError>,
    ) -> Phase {
        match &self.state {
            RequestState::Submitting(current) if current.ticket == submission.ticket => {}
            _ => {
                debug!(
                    ticket = submission.ticket,
                    phase = %self.phase(),
                    "discarding outcome for a submission that is no longer pending"
                );
                return self.phase();
            }
        }

        self.state = match outcome.and_then(AnalysisReport::from_value) {
            Ok(report) => {
                info!(
                    ticket = submission.ticket,
                    analyses = report.analyses().len(),
                    multi_drug = report.is_multi_drug(),
                    patient = report.patient_id(),
                    "analysis complete"
                );
                RequestState::Success(report)
            }
            Err(err) => {
                let status = match &err {
                    PharmaGuardError::Service { status, .. } => Some(*status),
                    _ => None,
                };
                warn!(ticket = submission.ticket, status = ?status, "analysis failed: {err}");
                RequestState::Error(Failure {
                    message: err.to_string(),
                    status,
                })
            }
        };
        self.phase()
    }

    /// Validates, issues the single outbound call, and settles in `Success`
    /// or `Error`.
    pub async fn submit(
        &mut self,
        genome_file: Option<&GenomeFile>,
        drugs: &DrugSelection,
    ) -> Result<Phase, PharmaGuardError> {
        let (submission, request) = self.begin(genome_file, drugs)?;
        let outcome = self.service.analyze(&request).await;
        Ok(self.resolve(&submission, outcome))
    }

    /// Drops the held result or error and returns to `Idle`.
    pub fn reset(&mut self) -> Result<(), PharmaGuardError> {
        match self.phase() {
            Phase::Success | Phase::Error => {
                self.state = RequestState::Idle;
                debug!("analysis reset");
                Ok(())
            }
            phase => Err(PharmaGuardError::InvalidTransition {
                action: "reset",
                phase,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::entities::report::RiskLabel;

    /// Answers every call with a fixed outcome and counts calls.
    #[derive(Clone)]
    pub(crate) struct FakeService {
        pub calls: Arc<AtomicUsize>,
        pub last_drugs: Arc<std::sync::Mutex<Option<String>>>,
        outcome: Arc<dyn Fn() -> Result<Value, PharmaGuardError> + Send + Sync>,
    }

    impl FakeService {
        pub(crate) fn ok(value: Value) -> Self {
            Self::with(move || Ok(value.clone()))
        }

        pub(crate) fn with(
            outcome: impl Fn() -> Result<Value, PharmaGuardError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                last_drugs: Arc::new(std::sync::Mutex::new(None)),
                outcome: Arc::new(outcome),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisService for FakeService {
        async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, PharmaGuardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_drugs.lock() {
                *last = Some(request.drugs.joined());
            }
            (self.outcome)()
        }
    }

    pub(crate) fn single(drug: &str, label: &str, severity: &str, score: f64) -> Value {
        json!({
            "patient_id": "PATIENT_001",
            "drug": drug,
            "risk_assessment": {"risk_label": label, "severity": severity, "confidence_score": score},
            "pharmacogenomic_profile": {
                "primary_gene": "CYP2C9",
                "diplotype": "*1/*1",
                "phenotype": "NM",
                "detected_variants": []
            },
            "clinical_recommendation": {"action": "Standard dosing", "cpic_guideline": "CPIC"},
            "quality_metrics": {"vcf_parsing_success": true, "total_variants_in_vcf": 2}
        })
    }

    pub(crate) fn vcf() -> GenomeFile {
        GenomeFile::new("patient.vcf", b"##fileformat=VCFv4.2\n".to_vec()).unwrap()
    }

    fn drugs(csv: &str) -> DrugSelection {
        DrugSelection::from_csv(csv).unwrap()
    }

    #[tokio::test]
    async fn success_carries_report() {
        let service = FakeService::ok(single("WARFARIN", "Safe", "none", 0.97));
        let mut orchestrator = RequestOrchestrator::new(service.clone());

        let phase = orchestrator
            .submit(Some(&vcf()), &drugs("WARFARIN"))
            .await
            .unwrap();
        assert_eq!(phase, Phase::Success);
        assert_eq!(service.call_count(), 1);
        let report = orchestrator.report().expect("report");
        assert_eq!(
            report.analyses()[0].risk_assessment.risk_label,
            RiskLabel::Safe
        );
        assert!(!orchestrator.can_submit());
    }

    #[tokio::test]
    async fn service_error_carries_detail_and_reset_allows_resubmit() {
        let service = FakeService::with(|| {
            Err(PharmaGuardError::Service {
                status: 500,
                message: "Malformed VCF header".into(),
            })
        });
        let mut orchestrator = RequestOrchestrator::new(service.clone());

        let phase = orchestrator
            .submit(Some(&vcf()), &drugs("WARFARIN"))
            .await
            .unwrap();
        assert_eq!(phase, Phase::Error);
        let failure = orchestrator.failure().expect("failure");
        assert_eq!(failure.message, "Malformed VCF header");
        assert_eq!(failure.status, Some(500));

        orchestrator.reset().unwrap();
        assert!(orchestrator.can_submit());
        assert!(orchestrator.failure().is_none());
    }

    #[tokio::test]
    async fn transport_error_has_no_status() {
        let service =
            FakeService::with(|| Err(PharmaGuardError::Transport("connection refused".into())));
        let mut orchestrator = RequestOrchestrator::new(service);
        orchestrator
            .submit(Some(&vcf()), &drugs("WARFARIN"))
            .await
            .unwrap();
        let failure = orchestrator.failure().expect("failure");
        assert_eq!(failure.message, "connection refused");
        assert_eq!(failure.status, None);
    }

    #[tokio::test]
    async fn missing_file_fails_validation_without_call() {
        let service = FakeService::ok(single("WARFARIN", "Safe", "none", 0.97));
        let mut orchestrator = RequestOrchestrator::new(service.clone());

        let err = orchestrator
            .submit(None, &drugs("WARFARIN"))
            .await
            .expect_err("no file");
        assert!(matches!(err, PharmaGuardError::Validation(_)));
        assert_eq!(service.call_count(), 0);
        assert_eq!(orchestrator.phase(), Phase::Idle);

        let err = orchestrator
            .submit(Some(&vcf()), &DrugSelection::new())
            .await
            .expect_err("no drugs");
        assert!(matches!(err, PharmaGuardError::Validation(_)));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn submit_while_submitting_is_rejected_without_call() {
        let service = FakeService::ok(single("WARFARIN", "Safe", "none", 0.97));
        let mut orchestrator = RequestOrchestrator::new(service.clone());

        let (pending, _request) = orchestrator.begin(Some(&vcf()), &drugs("WARFARIN")).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Submitting);

        let err = orchestrator
            .submit(Some(&vcf()), &drugs("CODEINE"))
            .await
            .expect_err("second submit");
        assert!(matches!(
            err,
            PharmaGuardError::InvalidTransition {
                action: "submit",
                phase: Phase::Submitting
            }
        ));
        assert_eq!(service.call_count(), 0);

        let phase = orchestrator.resolve(&pending, Ok(single("WARFARIN", "Safe", "none", 0.9)));
        assert_eq!(phase, Phase::Success);
    }

    #[tokio::test]
    async fn submit_from_success_requires_reset() {
        let service = FakeService::ok(single("WARFARIN", "Safe", "none", 0.97));
        let mut orchestrator = RequestOrchestrator::new(service.clone());
        orchestrator
            .submit(Some(&vcf()), &drugs("WARFARIN"))
            .await
            .unwrap();

        let err = orchestrator
            .submit(Some(&vcf()), &drugs("WARFARIN"))
            .await
            .expect_err("needs reset");
        assert!(err.to_string().contains("Cannot submit"));
        assert_eq!(service.call_count(), 1);
    }

    #[test]
    fn reset_is_only_valid_after_completion() {
        let service = FakeService::ok(json!({}));
        let mut orchestrator = RequestOrchestrator::new(service);
        let err = orchestrator.reset().expect_err("idle reset");
        assert!(matches!(
            err,
            PharmaGuardError::InvalidTransition {
                action: "reset",
                phase: Phase::Idle
            }
        ));

        orchestrator.begin(Some(&vcf()), &drugs("WARFARIN")).unwrap();
        assert!(orchestrator.reset().is_err());
        assert_eq!(orchestrator.phase(), Phase::Submitting);
    }

    #[test]
    fn stale_outcome_is_discarded() {
        let service = FakeService::ok(json!({}));
        let mut orchestrator = RequestOrchestrator::new(service);
        let (first, _) = orchestrator.begin(Some(&vcf()), &drugs("WARFARIN")).unwrap();
        orchestrator.resolve(
            &first,
            Err(PharmaGuardError::Transport("timed out".into())),
        );
        orchestrator.reset().unwrap();

        let (second, _) = orchestrator.begin(Some(&vcf()), &drugs("CODEINE")).unwrap();
        assert_eq!(
            orchestrator.resolve(&first, Ok(single("WARFARIN", "Toxic", "high", 0.9))),
            Phase::Submitting
        );
        assert_eq!(
            orchestrator.resolve(&second, Ok(single("CODEINE", "Safe", "none", 0.9))),
            Phase::Success
        );
    }

    #[tokio::test]
    async fn drugs_are_sent_comma_joined() {
        let service = FakeService::ok(single("WARFARIN", "Safe", "none", 0.97));
        let mut orchestrator = RequestOrchestrator::new(service.clone());
        orchestrator
            .submit(Some(&vcf()), &drugs("warfarin,codeine"))
            .await
            .unwrap();
        let sent = service.last_drugs.lock().unwrap().clone();
        assert_eq!(sent.as_deref(), Some("WARFARIN,CODEINE"));
    }
}
