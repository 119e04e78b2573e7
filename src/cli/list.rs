use crate::entities::drug::{CATALOG, CatalogDrug};
use crate::error::PharmaGuardError;

const RISK_LEGEND: &str = "\
## Risk labels

- ✅ Safe - standard dosing per CPIC guidance
- ⚠️ Adjust Dosage - genotype calls for a dose change
- ☠️ Toxic - high risk of adverse reaction
- 🚫 Ineffective - drug unlikely to work for this genotype
";

pub fn render(drug: Option<&str>) -> Result<String, PharmaGuardError> {
    match drug.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(list_all()),
        Some(raw) => match crate::entities::drug::find(raw) {
            Some(drug) => Ok(drug_page(drug)),
            None => {
                let valid = CATALOG
                    .iter()
                    .map(|d| format!("- {}", d.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                Err(PharmaGuardError::InvalidArgument(format!(
                    "Unknown drug: {raw}\n\nReference drugs:\n{valid}"
                )))
            }
        },
    }
}

fn list_all() -> String {
    let mut out = String::from("# PharmaGuard\n\n## Reference drugs\n\n");
    out.push_str("| Drug | Gene |\n|------|------|\n");
    for drug in CATALOG {
        out.push_str(&format!("| {} | {} |\n", drug.name, drug.gene));
    }
    out.push('\n');
    out.push_str(RISK_LEGEND);
    out.push_str(
        r#"
## Quickstart

- `pharmaguard analyze patient.vcf --drugs WARFARIN,CODEINE`
- `pharmaguard analyze patient.vcf --drugs WARFARIN --expand all --download`
- `pharmaguard render pharmaguard_PATIENT_001_1700000000000.json`
- `pharmaguard shell` - interactive session
- `pharmaguard drugs` - drugs supported by the running service
- `pharmaguard list <drug>` - details for one reference drug
"#,
    );
    out
}

fn drug_page(drug: &CatalogDrug) -> String {
    format!(
        "# {name}\n\nPrimary gene: {gene}\n\n{description}\n\n## Analyze\n\n- `pharmaguard analyze <file.vcf> --drugs {name}`\n",
        name = drug.name,
        gene = drug.gene,
        description = drug.description,
    )
}
