//! Case Library
//!
//! Supplies the opening context handed to the lead's first turn. A case is
//! either a built-in clinical scenario or free text supplied by the caller.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const BRCA2_CASE_ID: &str = "brca2_case";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CaseError {
    #[error("Unknown case id: {0}")]
    UnknownCase(String),
    #[error("Custom case text is empty")]
    EmptyCustomCase,
}

/// A structured clinical scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseScenario {
    pub case_id: String,
    pub title: String,
    pub patient_age: u32,
    pub diagnosis: String,
    pub stage: String,
    pub histology: String,
    pub grade: String,
    pub tumor_size: String,
    pub nodes: String,
    /// Ordered marker -> result pairs.
    pub biomarkers: Vec<(String, String)>,
    pub genomics: Vec<(String, String)>,
    pub comorbidities: Vec<String>,
    pub performance_status: String,
    pub additional_context: String,
}

impl CaseScenario {
    /// Renders the scenario as the clinical presentation the lead opens from.
    pub fn format_for_prompt(&self) -> String {
        let biomarkers = self
            .biomarkers
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        let genomics = if self.genomics.is_empty() {
            " Not yet performed".to_string()
        } else {
            self.genomics
                .iter()
                .fold(String::new(), |mut acc, (k, v)| {
                    let _ = write!(acc, "\n  - {k}: {v}");
                    acc
                })
        };
        let comorbidities = if self.comorbidities.is_empty() {
            "None".to_string()
        } else {
            self.comorbidities.join(", ")
        };

        format!(
            "PATIENT CASE PRESENTATION:\n\n\
             Age: {age} years old\n\
             Diagnosis: {diagnosis}\n\
             Stage: {stage}\n\n\
             PATHOLOGY:\n\
             - Histology: {histology}\n\
             - Grade: {grade}\n\
             - Tumor Size: {size}\n\
             - Lymph Nodes: {nodes}\n\n\
             BIOMARKERS:\n\
             - {biomarkers}\n\n\
             GENOMIC TESTING:{genomics}\n\n\
             MEDICAL HISTORY:\n\
             - Comorbidities: {comorbidities}\n\
             - Performance Status: {performance}\n\n\
             ADDITIONAL CONTEXT:\n\
             {context}",
            age = self.patient_age,
            diagnosis = self.diagnosis,
            stage = self.stage,
            histology = self.histology,
            grade = self.grade,
            size = self.tumor_size,
            nodes = self.nodes,
            performance = self.performance_status,
            context = self.additional_context.trim_end(),
        )
    }
}

/// Id and title of a selectable case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub case_id: String,
    pub title: String,
}

/// Source of selectable cases.
pub trait CaseProvider: Send + Sync {
    fn summaries(&self) -> Vec<CaseSummary>;
    fn get(&self, case_id: &str) -> Option<CaseScenario>;
}

/// The built-in scenarios.
#[derive(Debug, Clone)]
pub struct CaseLibrary {
    cases: Vec<CaseScenario>,
}

impl Default for CaseLibrary {
    fn default() -> Self {
        Self {
            cases: vec![brca2_case()],
        }
    }
}

impl CaseProvider for CaseLibrary {
    fn summaries(&self) -> Vec<CaseSummary> {
        self.cases
            .iter()
            .map(|c| CaseSummary {
                case_id: c.case_id.clone(),
                title: c.title.clone(),
            })
            .collect()
    }

    fn get(&self, case_id: &str) -> Option<CaseScenario> {
        self.cases.iter().find(|c| c.case_id == case_id).cloned()
    }
}

/// What the caller asked to open the conversation with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSelection {
    Library(String),
    Custom(String),
}

/// Opening text plus the title to record with the conversation, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCase {
    pub title: Option<String>,
    pub text: String,
}

impl CaseSelection {
    pub fn resolve(&self, provider: &dyn CaseProvider) -> Result<ResolvedCase, CaseError> {
        match self {
            CaseSelection::Library(id) => provider
                .get(id)
                .map(|case| ResolvedCase {
                    title: Some(case.title.clone()),
                    text: case.format_for_prompt(),
                })
                .ok_or_else(|| CaseError::UnknownCase(id.clone())),
            CaseSelection::Custom(text) if text.trim().is_empty() => {
                Err(CaseError::EmptyCustomCase)
            }
            CaseSelection::Custom(text) => Ok(ResolvedCase {
                title: None,
                text: text.trim().to_string(),
            }),
        }
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// BRCA2 carrier with ER+ breast cancer, discussing a comprehensive plan.
pub fn brca2_case() -> CaseScenario {
    CaseScenario {
        case_id: BRCA2_CASE_ID.to_string(),
        title: "BRCA2 Carrier: Comprehensive Treatment Planning".to_string(),
        patient_age: 40,
        diagnosis: "Invasive ductal carcinoma, left breast".to_string(),
        stage: "IIA (T2N0M0)".to_string(),
        histology: "Invasive ductal carcinoma (IDC)".to_string(),
        grade: "Grade 2 (moderately differentiated)".to_string(),
        tumor_size: "2.8 cm (by imaging and clinical exam)".to_string(),
        nodes: "Clinically node-negative (no palpable nodes, normal ultrasound)".to_string(),
        biomarkers: pairs(&[
            ("ER", "90% positive"),
            ("PR", "75% positive"),
            ("HER2", "Negative (IHC 1+)"),
            ("Ki-67", "22%"),
        ]),
        genomics: pairs(&[
            (
                "Oncotype DX",
                "Recurrence Score 26 (Intermediate-High, chemo benefit expected)",
            ),
            (
                "BRCA2",
                "Known germline mutation (diagnosed 3 years ago after mother's breast cancer)",
            ),
        ]),
        comorbidities: vec!["None".to_string()],
        performance_status: "ECOG 0 (fully active)".to_string(),
        additional_context: include_str!("../cases/brca2_context.md").to_string(),
    }
}
