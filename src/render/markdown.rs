//! Markdown report rendering.
//!
//! Cards are flattened into plain view structs here and laid out by the
//! `report.md` template. Colors, when enabled, are baked into the view
//! strings so the template stays presentation-agnostic.

use minijinja::Environment;
use serde::Serialize;

use crate::entities::report::{AnalysisReport, AnalysisResult, RiskLabel, Severity};
use crate::error::PharmaGuardError;
use crate::render::presentation::{confidence_percent, map_risk, map_severity, severity_bar};
use crate::session::orchestrator::Failure;
use crate::session::sections::{Section, SectionToggleStore};

const REPORT_TEMPLATE_NAME: &str = "report.md";
const REPORT_TEMPLATE: &str = include_str!("templates/report.md");
const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Emit ANSI colors for risk headlines, badges, and severity bars.
    pub color: bool,
}

#[derive(Serialize)]
struct ReportView {
    patient_id: String,
    cards: Vec<CardView>,
}

#[derive(Serialize)]
struct CardView {
    number: usize,
    title: String,
    drug: String,
    gene: String,
    patient_id: String,
    badge: String,
    severity_label: String,
    severity_bar: String,
    severity_width: u8,
    diplotype: String,
    phenotype: String,
    variant_count: usize,
    variants_toggle: Option<String>,
    variants: Vec<VariantRow>,
    action: String,
    guideline: Option<String>,
    explanation_toggle: Option<String>,
    explanation: Vec<ExplanationBlock>,
    quality: String,
}

#[derive(Serialize)]
struct VariantRow {
    rsid: String,
    star_allele: String,
    function_status: String,
    genotype: String,
}

#[derive(Serialize)]
struct ExplanationBlock {
    label: &'static str,
    text: String,
}

fn environment() -> Result<Environment<'static>, PharmaGuardError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)?;
    Ok(env)
}

/// Renders every analysis in `report` as a card, honoring the open/closed
/// state of each card's sections.
pub fn report_markdown(
    report: &AnalysisReport,
    sections: &SectionToggleStore,
    options: RenderOptions,
) -> Result<String, PharmaGuardError> {
    let view = ReportView {
        patient_id: report.patient_id().to_string(),
        cards: report
            .analyses()
            .iter()
            .enumerate()
            .map(|(index, analysis)| card_view(index, analysis, sections, options))
            .collect(),
    };

    let env = environment()?;
    let template = env.get_template(REPORT_TEMPLATE_NAME)?;
    let mut out = template.render(&view)?;
    out.push('\n');
    Ok(out)
}

fn card_view(
    index: usize,
    analysis: &AnalysisResult,
    sections: &SectionToggleStore,
    options: RenderOptions,
) -> CardView {
    let risk = &analysis.risk_assessment;
    let profile = &analysis.pharmacogenomic_profile;
    let recommendation = &analysis.clinical_recommendation;

    let risk_style = map_risk(&risk.risk_label);
    let mut title = risk_style
        .tone
        .paint(&format!("{} {}", risk_style.icon, risk_style.label), options.color);
    if let RiskLabel::Unrecognized(raw) = &risk.risk_label
        && !raw.is_empty()
    {
        title.push_str(&format!(" (reported: {raw})"));
    }

    let confidence = confidence_percent(risk.confidence_score);
    let badge = risk_style
        .tone
        .paint(&format!("Confidence: {confidence}%"), options.color);

    let severity_style = map_severity(&risk.severity);
    let severity_label = match &risk.severity {
        Severity::Unrecognized(raw) if !raw.is_empty() => capitalize_words(raw),
        _ => severity_style.label.to_string(),
    };

    let variant_count = profile.detected_variants.len();
    let variants_open = sections.is_open(index, Section::Variants);
    let variants_toggle = (variant_count > 0)
        .then(|| format!("{} Detected Variants ({variant_count})", marker(variants_open)));
    let variants = if variants_open {
        profile
            .detected_variants
            .iter()
            .map(|v| VariantRow {
                rsid: cell(v.rsid.as_deref()),
                star_allele: cell(v.star_allele.as_deref()),
                function_status: cell(
                    v.function_status
                        .as_deref()
                        .map(|s| capitalize_words(&s.replace('_', " ")))
                        .as_deref(),
                ),
                genotype: cell(v.genotype.as_deref()),
            })
            .collect()
    } else {
        Vec::new()
    };

    let explanation_open = sections.is_open(index, Section::Explanation);
    let explanation_toggle = analysis
        .llm_generated_explanation
        .as_ref()
        .map(|_| format!("{} AI Clinical Explanation", marker(explanation_open)));
    let explanation = match (&analysis.llm_generated_explanation, explanation_open) {
        (Some(llm), true) => llm
            .blocks()
            .into_iter()
            .map(|(label, text)| ExplanationBlock {
                label,
                text: text.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    CardView {
        number: index + 1,
        title,
        drug: text(analysis.drug.as_deref()),
        gene: text(profile.primary_gene.as_deref()),
        patient_id: text(analysis.patient_id.as_deref()),
        badge,
        severity_label,
        severity_bar: severity_style
            .tone
            .paint(&severity_bar(&severity_style), options.color),
        severity_width: severity_style.width_percent,
        diplotype: cell(profile.diplotype.as_deref()),
        phenotype: cell(profile.phenotype.as_deref()),
        variant_count,
        variants_toggle,
        variants,
        action: text(recommendation.action.as_deref()),
        guideline: recommendation.cpic_guideline.clone(),
        explanation_toggle,
        explanation,
        quality: quality_line(analysis),
    }
}

fn quality_line(analysis: &AnalysisResult) -> String {
    let q = &analysis.quality_metrics;
    let parse = match q.vcf_parsing_success {
        Some(true) => "✓",
        Some(false) => "✗",
        None => MISSING,
    };
    let count = |v: Option<u64>| v.map_or_else(|| MISSING.to_string(), |n| n.to_string());
    let time = q
        .processing_time_seconds
        .map_or_else(|| MISSING.to_string(), |t| format!("{t}s"));
    format!(
        "Parse: {parse} · Variants: {} · PGx Hits: {} · Time: {time}",
        count(q.total_variants_in_vcf),
        count(q.pharmacogenomic_variants_found),
    )
}

fn marker(open: bool) -> &'static str {
    if open { "▾" } else { "▸" }
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or(MISSING).to_string()
}

/// Table-safe cell text.
fn cell(value: Option<&str>) -> String {
    text(value).replace('|', "\\|").replace('\n', " ")
}

fn capitalize_words(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Banner for a failed submission.
pub fn failure_markdown(failure: &Failure) -> String {
    match failure.status {
        Some(status) => format!("⚠ {} (HTTP {status})\n", failure.message),
        None => format!("⚠ {}\n", failure.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn warfarin() -> serde_json::Value {
        json!({
            "patient_id": "PATIENT_PM",
            "drug": "WARFARIN",
            "risk_assessment": {"risk_label": "Adjust Dosage", "confidence_score": 0.925, "severity": "high"},
            "pharmacogenomic_profile": {
                "primary_gene": "CYP2C9",
                "diplotype": "*2/*3",
                "phenotype": "PM",
                "detected_variants": [
                    {"rsid": "rs1799853", "star_allele": "*2", "function_status": "decreased_function", "genotype": "0|1"}
                ]
            },
            "clinical_recommendation": {"action": "Reduce warfarin dose by 50-75%.", "cpic_guideline": "CPIC Guideline for WARFARIN and CYP2C9"},
            "llm_generated_explanation": {"summary": "Slow clearance.", "alternative_drugs": "Apixaban"},
            "quality_metrics": {"vcf_parsing_success": true, "total_variants_in_vcf": 2, "pharmacogenomic_variants_found": 1, "processing_time_seconds": 0.41}
        })
    }

    fn render(raw: serde_json::Value, sections: &SectionToggleStore) -> String {
        let report = AnalysisReport::from_value(raw).unwrap();
        report_markdown(&report, sections, RenderOptions::default()).unwrap()
    }

    #[test]
    fn closed_sections_show_only_toggles() {
        let out = render(warfarin(), &SectionToggleStore::new());
        assert!(out.contains("# Analysis Complete"));
        assert!(out.contains("Patient: PATIENT_PM · 1 drug(s) analyzed"));
        assert!(out.contains("## 1. ⚠️ Adjust Dosage"));
        assert!(out.contains("Confidence: 93%"));
        assert!(out.contains("Severity: High"));
        assert!(out.contains("▸ Detected Variants (1)"));
        assert!(!out.contains("| rsID |"));
        assert!(out.contains("▸ AI Clinical Explanation"));
        assert!(!out.contains("Slow clearance."));
        assert!(out.contains("Parse: ✓ · Variants: 2 · PGx Hits: 1 · Time: 0.41s"));
        assert!(out.contains("For research use only"));
    }

    #[test]
    fn open_sections_render_tables_and_blocks() {
        let mut sections = SectionToggleStore::new();
        sections.toggle(0, Section::Variants);
        sections.toggle(0, Section::Explanation);
        let out = render(warfarin(), &sections);
        assert!(out.contains("▾ Detected Variants (1)"));
        assert!(out.contains("| rs1799853 | *2 | Decreased Function | 0\\|1 |"));
        assert!(out.contains("**Summary**\nSlow clearance."));
        assert!(out.contains("**Alternatives**\nApixaban"));
        assert!(!out.contains("**Mechanism**"));
    }

    #[test]
    fn empty_variants_omit_section() {
        let mut raw = warfarin();
        raw["pharmacogenomic_profile"]["detected_variants"] = json!([]);
        let mut sections = SectionToggleStore::new();
        sections.toggle(0, Section::Variants);
        let out = render(raw, &sections);
        assert!(!out.contains("Detected Variants"));
    }

    #[test]
    fn missing_explanation_omits_section() {
        let mut raw = warfarin();
        raw.as_object_mut()
            .unwrap()
            .remove("llm_generated_explanation");
        let out = render(raw, &SectionToggleStore::new());
        assert!(!out.contains("AI Clinical Explanation"));
    }

    #[test]
    fn multi_drug_cards_toggle_independently() {
        let mut second = warfarin();
        second["drug"] = json!("CODEINE");
        let raw = json!({"patient_id": "PATIENT_PM", "multi_drug_analysis": [warfarin(), second]});
        let mut sections = SectionToggleStore::new();
        sections.toggle(1, Section::Explanation);
        let out = render(raw, &sections);
        assert!(out.contains("2 drug(s) analyzed"));
        let (first_card, second_card) = out.split_once("## 2.").unwrap();
        assert!(first_card.contains("▸ AI Clinical Explanation"));
        assert!(second_card.contains("▾ AI Clinical Explanation"));
        assert!(second_card.contains("**CODEINE**"));
    }

    #[test]
    fn unknown_label_renders_with_safe_fallback() {
        let mut raw = warfarin();
        raw["risk_assessment"]["risk_label"] = json!("Unknown-Value");
        raw["risk_assessment"]["severity"] = json!("critical");
        let out = render(raw, &SectionToggleStore::new());
        assert!(out.contains("## 1. ✅ Safe (reported: Unknown-Value)"));
        assert!(out.contains("████████████████████ 100%"));
    }

    #[test]
    fn sparse_record_renders_placeholders() {
        let out = render(json!({"drug": "ASPIRIN"}), &SectionToggleStore::new());
        assert!(out.contains("Patient: unknown · 1 drug(s) analyzed"));
        assert!(out.contains("Confidence: 0%"));
        assert!(out.contains("| - | - | 0 |"));
        assert!(out.contains("Parse: - · Variants: - · PGx Hits: - · Time: -"));
    }

    #[test]
    fn failure_banner_includes_status() {
        let banner = failure_markdown(&Failure {
            message: "Malformed VCF header".into(),
            status: Some(500),
        });
        assert_eq!(banner, "⚠ Malformed VCF header (HTTP 500)\n");
    }
}
