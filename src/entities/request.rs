use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::error::PharmaGuardError;

pub const GENOME_FILE_EXTENSION: &str = ".vcf";

/// A genome file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeFile {
    name: String,
    bytes: Vec<u8>,
}

impl GenomeFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, PharmaGuardError> {
        let name = name.into().trim().to_string();
        if !has_genome_extension(&name) {
            return Err(PharmaGuardError::Validation(format!(
                "Please upload a {GENOME_FILE_EXTENSION} file (got \"{name}\")"
            )));
        }
        Ok(Self { name, bytes })
    }

    pub async fn load(path: &Path) -> Result<Self, PharmaGuardError> {
        let name = path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();
        if !has_genome_extension(&name) {
            return Err(PharmaGuardError::Validation(format!(
                "Please upload a {GENOME_FILE_EXTENSION} file (got \"{}\")",
                path.display()
            )));
        }
        let bytes = tokio::fs::read(path).await?;
        Self::new(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn has_genome_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.len() > GENOME_FILE_EXTENSION.len() && lower.ends_with(GENOME_FILE_EXTENSION)
}

fn drug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]*$").expect("valid drug pattern"))
}

/// Ordered set of drug identifiers. Membership is flipped with [`toggle`](Self::toggle),
/// which keeps entries unique while preserving selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrugSelection {
    drugs: Vec<String>,
}

impl DrugSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list, dropping blanks and repeats.
    pub fn from_csv(value: &str) -> Result<Self, PharmaGuardError> {
        let mut out = Self::new();
        for raw in value.split(',') {
            if raw.trim().is_empty() {
                continue;
            }
            let drug = normalize_drug(raw)?;
            if !out.contains(&drug) {
                out.drugs.push(drug);
            }
        }
        Ok(out)
    }

    /// Adds the drug when absent, removes it when present. Returns whether
    /// the drug is selected afterwards.
    pub fn toggle(&mut self, drug: &str) -> Result<bool, PharmaGuardError> {
        let drug = normalize_drug(drug)?;
        if let Some(pos) = self.drugs.iter().position(|d| *d == drug) {
            self.drugs.remove(pos);
            return Ok(false);
        }
        if crate::entities::drug::find(&drug).is_none() {
            warn!(drug = %drug, "drug is not in the reference catalog; the service may not support it");
        }
        self.drugs.push(drug);
        Ok(true)
    }

    pub fn contains(&self, drug: &str) -> bool {
        let drug = drug.trim().to_ascii_uppercase();
        self.drugs.iter().any(|d| *d == drug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.drugs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }

    /// Wire form of the `drugs` field.
    pub fn joined(&self) -> String {
        self.drugs.join(",")
    }

    pub fn clear(&mut self) {
        self.drugs.clear();
    }
}

fn normalize_drug(raw: &str) -> Result<String, PharmaGuardError> {
    let drug = raw.trim().to_ascii_uppercase();
    if !drug_pattern().is_match(&drug) {
        return Err(PharmaGuardError::InvalidArgument(format!(
            "\"{}\" is not a drug identifier (letters, digits, '-' or '_')",
            raw.trim()
        )));
    }
    Ok(drug)
}

/// One submission's payload. Lives only until the request resolves.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub genome_file: GenomeFile,
    pub drugs: DrugSelection,
}

impl AnalysisRequest {
    /// Checks the submission preconditions: a genome file is present and at
    /// least one drug is selected.
    pub fn build(
        genome_file: Option<&GenomeFile>,
        drugs: &DrugSelection,
    ) -> Result<Self, PharmaGuardError> {
        let Some(genome_file) = genome_file else {
            return Err(PharmaGuardError::Validation(
                "Select a .vcf genome file before analyzing".into(),
            ));
        };
        if drugs.is_empty() {
            return Err(PharmaGuardError::Validation(
                "Select at least one drug to analyze".into(),
            ));
        }
        Ok(Self {
            genome_file: genome_file.clone(),
            drugs: drugs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vcf() -> GenomeFile {
        GenomeFile::new("patient.vcf", b"##fileformat=VCFv4.2\n".to_vec()).unwrap()
    }

    #[test]
    fn genome_file_requires_vcf_extension() {
        assert!(GenomeFile::new("PATIENT.VCF", Vec::new()).is_ok());
        let err = GenomeFile::new("patient.txt", Vec::new()).expect_err("txt should fail");
        assert!(matches!(err, PharmaGuardError::Validation(_)));
        assert!(GenomeFile::new(".vcf", Vec::new()).is_err());
    }

    #[test]
    fn toggle_flips_membership_and_keeps_order() {
        let mut drugs = DrugSelection::new();
        assert!(drugs.toggle("warfarin").unwrap());
        assert!(drugs.toggle("CODEINE").unwrap());
        assert!(drugs.toggle(" fluorouracil ").unwrap());
        assert!(!drugs.toggle("Codeine").unwrap());
        assert_eq!(drugs.joined(), "WARFARIN,FLUOROURACIL");
    }

    #[test]
    fn from_csv_dedupes_and_skips_blanks() {
        let drugs = DrugSelection::from_csv("codeine, ,WARFARIN,codeine,").unwrap();
        assert_eq!(drugs.iter().collect::<Vec<_>>(), vec!["CODEINE", "WARFARIN"]);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        let err = DrugSelection::from_csv("WARFARIN,drop table").expect_err("space should fail");
        assert!(err.to_string().contains("not a drug identifier"));
    }

    #[test]
    fn build_requires_file_and_drugs() {
        let drugs = DrugSelection::from_csv("WARFARIN").unwrap();
        let err = AnalysisRequest::build(None, &drugs).expect_err("no file");
        assert!(matches!(err, PharmaGuardError::Validation(_)));

        let err = AnalysisRequest::build(Some(&vcf()), &DrugSelection::new()).expect_err("no drug");
        assert!(err.to_string().contains("at least one drug"));

        let request = AnalysisRequest::build(Some(&vcf()), &drugs).unwrap();
        assert_eq!(request.genome_file.name(), "patient.vcf");
        assert_eq!(request.drugs.joined(), "WARFARIN");
    }
}
