//! Typed view of the analysis service's response.
//!
//! The service answers with either one analysis object, an object carrying
//! `multi_drug_analysis`, or a bare array of analyses. [`normalize`] turns all
//! three into an ordered, non-empty list of [`AnalysisResult`]s. The raw value
//! is kept alongside so exports stay byte-faithful to what was received.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PharmaGuardError;

const MULTI_DRUG_FIELD: &str = "multi_drug_analysis";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskLabel {
    Safe,
    AdjustDosage,
    Toxic,
    Ineffective,
    /// Anything the client does not know, kept verbatim for display.
    Unrecognized(String),
}

impl RiskLabel {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Safe" => Self::Safe,
            "Adjust Dosage" => Self::AdjustDosage,
            "Toxic" => Self::Toxic,
            "Ineffective" => Self::Ineffective,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl Default for RiskLabel {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl<'de> Deserialize<'de> for RiskLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::parse(&value_text(&value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
    Critical,
    Unrecognized(String),
}

impl Severity {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "low" => Self::Low,
            "moderate" => Self::Moderate,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Unrecognized(value.trim().to_string()),
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::parse(&value_text(&value)))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accepts numbers and numeric strings; anything else reads as absent.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(lenient_f64(deserializer)?
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => s.trim().parse::<bool>().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .map(|v| value_text(&v))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    #[serde(deserialize_with = "lenient_text")]
    pub patient_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub drug: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "lenient_object")]
    pub risk_assessment: RiskAssessment,
    #[serde(deserialize_with = "lenient_object")]
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    #[serde(deserialize_with = "lenient_object")]
    pub clinical_recommendation: ClinicalRecommendation,
    #[serde(deserialize_with = "lenient_explanation")]
    pub llm_generated_explanation: Option<LlmExplanation>,
    #[serde(deserialize_with = "lenient_object")]
    pub quality_metrics: QualityMetrics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    pub risk_label: RiskLabel,
    pub severity: Severity,
    #[serde(deserialize_with = "lenient_f64")]
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PharmacogenomicProfile {
    #[serde(deserialize_with = "lenient_text")]
    pub primary_gene: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub diplotype: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub phenotype: Option<String>,
    #[serde(deserialize_with = "lenient_variants")]
    pub detected_variants: Vec<DetectedVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectedVariant {
    #[serde(deserialize_with = "lenient_text")]
    pub rsid: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub star_allele: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub function_status: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub genotype: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClinicalRecommendation {
    #[serde(deserialize_with = "lenient_text")]
    pub action: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub cpic_guideline: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub mechanism: Option<String>,
}

/// Free-text explanation blocks. Any subset may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmExplanation {
    #[serde(deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub mechanism_explanation: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub patient_friendly: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub clinical_significance: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub monitoring_parameters: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub alternative_drugs: Option<String>,
}

impl LlmExplanation {
    /// Present blocks as `(heading, text)` in display order.
    pub fn blocks(&self) -> Vec<(&'static str, &str)> {
        [
            ("Summary", self.summary.as_deref()),
            ("Mechanism", self.mechanism_explanation.as_deref()),
            ("For Patient", self.patient_friendly.as_deref()),
            ("Clinical Significance", self.clinical_significance.as_deref()),
            ("Monitoring", self.monitoring_parameters.as_deref()),
            ("Alternatives", self.alternative_drugs.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, text)| text.map(|t| (label, t)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QualityMetrics {
    #[serde(deserialize_with = "lenient_bool")]
    pub vcf_parsing_success: Option<bool>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_variants_in_vcf: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub pharmacogenomic_variants_found: Option<u64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub processing_time_seconds: Option<f64>,
}

/// Nested objects that arrive as null or a non-object read as empty.
fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(T::default());
    }
    T::deserialize(value).map_err(serde::de::Error::custom)
}

fn lenient_explanation<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<LlmExplanation>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    LlmExplanation::deserialize(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn lenient_variants<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<DetectedVariant>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    items
        .into_iter()
        .filter(Value::is_object)
        .map(|item| DetectedVariant::deserialize(item).map_err(serde::de::Error::custom))
        .collect()
}

/// Returns the analysis records carried by `raw`, in the order received.
///
/// Object entries of `multi_drug_analysis` (or of a top-level array) are the
/// records, non-objects are skipped. With no such entries the value is
/// treated as a single record. The result is never empty.
pub fn normalize(raw: &Value) -> Result<Vec<AnalysisResult>, PharmaGuardError> {
    let mut records = raw
        .get(MULTI_DRUG_FIELD)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .map(object_entries)
        .unwrap_or_default();
    if records.is_empty() {
        records = raw
            .as_array()
            .map(Vec::as_slice)
            .map(object_entries)
            .unwrap_or_default();
    }
    if records.is_empty() {
        if raw.is_array() {
            return Ok(vec![AnalysisResult::default()]);
        }
        records.push(raw);
    }

    records
        .into_iter()
        .map(|record| {
            AnalysisResult::deserialize(record)
                .map_err(|err| PharmaGuardError::InvalidResponse(err.to_string()))
        })
        .collect()
}

fn object_entries(items: &[Value]) -> Vec<&Value> {
    items.iter().filter(|item| item.is_object()).collect()
}

/// A received result: the raw JSON plus its normalized records.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    raw: Value,
    analyses: Vec<AnalysisResult>,
}

impl AnalysisReport {
    pub fn from_value(raw: Value) -> Result<Self, PharmaGuardError> {
        let analyses = normalize(&raw)?;
        Ok(Self { raw, analyses })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn analyses(&self) -> &[AnalysisResult] {
        &self.analyses
    }

    pub fn is_multi_drug(&self) -> bool {
        self.analyses.len() > 1
    }

    pub fn patient_id(&self) -> &str {
        self.raw
            .get("patient_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.analyses
                    .iter()
                    .find_map(|a| a.patient_id.as_deref())
            })
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(drug: &str) -> Value {
        json!({
            "patient_id": "PATIENT_PM",
            "drug": drug,
            "risk_assessment": {"risk_label": "Adjust Dosage", "confidence_score": 0.93, "severity": "high"},
            "pharmacogenomic_profile": {
                "primary_gene": "CYP2C9",
                "diplotype": "*2/*3",
                "phenotype": "PM",
                "detected_variants": [
                    {"rsid": "rs1799853", "star_allele": "*2", "function_status": "decreased_function", "genotype": "0|1"}
                ]
            },
            "clinical_recommendation": {"action": "Reduce dose", "cpic_guideline": "CPIC Guideline for WARFARIN and CYP2C9"},
            "llm_generated_explanation": {"summary": "Slow clearance."},
            "quality_metrics": {
                "vcf_parsing_success": true,
                "total_variants_in_vcf": 2,
                "pharmacogenomic_variants_found": 1,
                "processing_time_seconds": 0.41
            }
        })
    }

    #[test]
    fn normalize_multi_drug_preserves_order() {
        let raw = json!({
            "patient_id": "PATIENT_PM",
            "multi_drug_analysis": [record("WARFARIN"), record("CODEINE"), record("WARFARIN")]
        });
        let out = normalize(&raw).unwrap();
        let drugs: Vec<_> = out.iter().map(|a| a.drug.as_deref().unwrap()).collect();
        assert_eq!(drugs, vec!["WARFARIN", "CODEINE", "WARFARIN"]);
    }

    #[test]
    fn normalize_single_record_yields_one() {
        let out = normalize(&record("WARFARIN")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].drug.as_deref(), Some("WARFARIN"));
        assert_eq!(out[0].risk_assessment.risk_label, RiskLabel::AdjustDosage);
        assert_eq!(out[0].risk_assessment.severity, Severity::High);
        assert_eq!(out[0].pharmacogenomic_profile.detected_variants.len(), 1);
    }

    #[test]
    fn normalize_accepts_bare_array() {
        let raw = json!([record("CODEINE"), record("WARFARIN")]);
        let out = normalize(&raw).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].drug.as_deref(), Some("WARFARIN"));
    }

    #[test]
    fn normalize_skips_non_object_entries() {
        let raw = json!({
            "patient_id": "PATIENT_PM",
            "multi_drug_analysis": [record("WARFARIN"), null, "oops", record("CODEINE")]
        });
        let out = normalize(&raw).unwrap();
        let drugs: Vec<_> = out.iter().map(|a| a.drug.as_deref().unwrap()).collect();
        assert_eq!(drugs, vec!["WARFARIN", "CODEINE"]);

        let out = normalize(&json!([record("CODEINE"), null])).unwrap();
        assert_eq!(out.len(), 1);

        let raw = json!({"patient_id": "P1", "multi_drug_analysis": [null]});
        let out = normalize(&raw).unwrap();
        assert_eq!(out[0].patient_id.as_deref(), Some("P1"));

        let out = normalize(&json!([null, 3])).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].drug.is_none());
    }

    #[test]
    fn empty_multi_drug_falls_back_to_single() {
        let raw = json!({"patient_id": "P1", "multi_drug_analysis": []});
        let out = normalize(&raw).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].patient_id.as_deref(), Some("P1"));
    }

    #[test]
    fn unknown_enums_and_missing_sections_do_not_fail() {
        let raw = json!({
            "drug": "ASPIRIN",
            "risk_assessment": {"risk_label": "Unknown-Value", "severity": 7, "confidence_score": "0.5"},
            "pharmacogenomic_profile": null,
            "llm_generated_explanation": "n/a",
            "quality_metrics": {"total_variants_in_vcf": "12"}
        });
        let out = normalize(&raw).unwrap();
        let analysis = &out[0];
        assert_eq!(
            analysis.risk_assessment.risk_label,
            RiskLabel::Unrecognized("Unknown-Value".into())
        );
        assert_eq!(
            analysis.risk_assessment.severity,
            Severity::Unrecognized("7".into())
        );
        assert_eq!(analysis.risk_assessment.confidence_score, Some(0.5));
        assert!(analysis.pharmacogenomic_profile.detected_variants.is_empty());
        assert!(analysis.llm_generated_explanation.is_none());
        assert_eq!(analysis.quality_metrics.total_variants_in_vcf, Some(12));
    }

    #[test]
    fn explanation_blocks_skip_absent_keys() {
        let explanation = LlmExplanation {
            summary: Some("S".into()),
            monitoring_parameters: Some("INR".into()),
            ..Default::default()
        };
        assert_eq!(
            explanation.blocks(),
            vec![("Summary", "S"), ("Monitoring", "INR")]
        );
    }

    #[test]
    fn report_patient_id_prefers_top_level() {
        let report = AnalysisReport::from_value(json!({
            "patient_id": "TOP",
            "multi_drug_analysis": [record("CODEINE")]
        }))
        .unwrap();
        assert_eq!(report.patient_id(), "TOP");

        let report = AnalysisReport::from_value(json!([record("CODEINE")])).unwrap();
        assert_eq!(report.patient_id(), "PATIENT_PM");
        assert!(!report.is_multi_drug());
    }
}
