//! The analysis page: a form until a submission succeeds, then the result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::AnalysisService;
use crate::domain::report::AnalysisReport;
use crate::domain::request::AnalysisRequest;
use crate::form::{AnalysisForm, SubmitError, Submission};
use crate::subscription::Subscription;
use crate::view::report::ReportView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    pub fn as_str(self) -> &'static str {
        match self {
            Feedback::Positive => "positive",
            Feedback::Negative => "negative",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CompletedAnalysis {
    pub request: AnalysisRequest,
    pub report: AnalysisReport,
    pub generated_on: NaiveDate,
    pub feedback: Option<Feedback>,
}

impl CompletedAnalysis {
    pub fn view(&self) -> ReportView {
        ReportView::build(&self.request, &self.report, self.generated_on, self.feedback)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisPage {
    pub form: AnalysisForm,
    result: Option<CompletedAnalysis>,
    notice: Option<String>,
}

impl AnalysisPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_showing_results(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&CompletedAnalysis> {
        self.result.as_ref()
    }

    /// One-shot message from the last action; cleared when read.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn show_result(&mut self, submission: Submission, generated_on: NaiveDate) {
        self.notice = None;
        self.result = Some(CompletedAnalysis {
            request: submission.request,
            report: submission.report,
            generated_on,
            feedback: None,
        });
    }

    pub async fn submit(
        &mut self,
        subscription: &Subscription,
        service: &dyn AnalysisService,
        generated_on: NaiveDate,
    ) -> Result<(), SubmitError> {
        let submission = self.form.submit(subscription, service).await?;
        self.show_result(submission, generated_on);
        Ok(())
    }

    /// Back to the form; the previous request is forgotten.
    pub fn new_analysis(&mut self) {
        self.result = None;
        self.notice = None;
    }

    /// Records feedback on the shown result. Returns `None` on the form view.
    pub fn feedback(&mut self, choice: Feedback) -> Option<String> {
        let result = self.result.as_mut()?;
        result.feedback = Some(choice);
        let message = format!("Thank you for your {choice} feedback!");
        self.notice = Some(message.clone());
        Some(message)
    }

    pub fn download(&mut self) -> Option<String> {
        self.result.as_ref()?;
        let message = "Downloading analysis report...".to_string();
        self.notice = Some(message.clone());
        Some(message)
    }

    pub fn share(&mut self) -> Option<String> {
        self.result.as_ref()?;
        let message = "Sharing analysis...".to_string();
        self.notice = Some(message.clone());
        Some(message)
    }
}
