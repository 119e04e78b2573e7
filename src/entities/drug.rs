use serde::Serialize;

/// Drug with a CPIC gene-drug guideline known to the analysis service.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogDrug {
    pub name: &'static str,
    pub gene: &'static str,
    pub description: &'static str,
}

pub const CATALOG: &[CatalogDrug] = &[
    CatalogDrug {
        name: "CODEINE",
        gene: "CYP2D6",
        description: "Opioid analgesic. Poor metabolizers get no pain relief; ultrarapid metabolizers risk respiratory depression from excess morphine.",
    },
    CatalogDrug {
        name: "WARFARIN",
        gene: "CYP2C9",
        description: "Blood thinner. Poor metabolizers clear it slowly, leading to dangerous bleeding risk at standard doses.",
    },
    CatalogDrug {
        name: "CLOPIDOGREL",
        gene: "CYP2C19",
        description: "Anti-platelet drug. Poor metabolizers cannot activate this prodrug, leaving patients unprotected against heart attacks.",
    },
    CatalogDrug {
        name: "SIMVASTATIN",
        gene: "SLCO1B1",
        description: "Cholesterol drug. Poor transporters accumulate simvastatin in the blood, causing muscle damage (myopathy).",
    },
    CatalogDrug {
        name: "AZATHIOPRINE",
        gene: "TPMT",
        description: "Immunosuppressant. TPMT-deficient patients accumulate toxic metabolites with a risk of fatal bone marrow failure.",
    },
    CatalogDrug {
        name: "FLUOROURACIL",
        gene: "DPYD",
        description: "Chemotherapy. DPYD-deficient patients cannot break down the drug; standard doses cause life-threatening toxicity.",
    },
];

pub fn find(name: &str) -> Option<&'static CatalogDrug> {
    let name = name.trim();
    CATALOG.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}
