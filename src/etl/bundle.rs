//! Typed artifact bundles flowing between pipeline stages.
//!
//! Each bundle is owned exclusively by the running pipeline invocation;
//! downstream readers receive the final bundles as an immutable snapshot.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::json;

use crate::entities::{
    NormalizedGene, NormalizedPhenotype, NormalizedPublication, NormalizedVariant,
};
use crate::mappers::{
    GeneVariantLink, GeneVariantMapper, VariantPhenotypeLink, VariantPhenotypeMapper,
};
use crate::parsers::{ClinVarVariant, HpoTerm, PubMedPublication, UniProtEntry};

/// Container for parsed source records.
#[derive(Debug, Default)]
pub struct ParsedBundle {
    pub clinvar: Vec<ClinVarVariant>,
    pub pubmed: Vec<PubMedPublication>,
    pub hpo: Vec<HpoTerm>,
    pub uniprot: Vec<UniProtEntry>,
}

impl ParsedBundle {
    pub fn total_records(&self) -> usize {
        self.clinvar.len() + self.pubmed.len() + self.hpo.len() + self.uniprot.len()
    }

    /// Per-source record counts for reporting.
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "clinvar": self.clinvar.len(),
            "pubmed": self.pubmed.len(),
            "hpo": self.hpo.len(),
            "uniprot": self.uniprot.len(),
        })
    }
}

/// Container for normalized canonical entities.
#[derive(Debug, Default)]
pub struct NormalizedBundle {
    pub genes: Vec<NormalizedGene>,
    pub variants: Vec<NormalizedVariant>,
    pub phenotypes: Vec<NormalizedPhenotype>,
    pub publications: Vec<NormalizedPublication>,
    pub errors: Vec<String>,
}

impl NormalizedBundle {
    pub fn total_records(&self) -> usize {
        self.genes.len() + self.variants.len() + self.phenotypes.len() + self.publications.len()
    }

    pub fn summary(&self) -> serde_json::Value {
        json!({
            "genes": self.genes.len(),
            "variants": self.variants.len(),
            "phenotypes": self.phenotypes.len(),
            "publications": self.publications.len(),
        })
    }
}

/// Container for relationship mapping outputs. The mappers ride along so
/// the validation stage can reuse their link checks.
#[derive(Debug, Default)]
pub struct MappedBundle {
    pub gene_variant_links: Vec<GeneVariantLink>,
    pub variant_phenotype_links: Vec<VariantPhenotypeLink>,
    pub networks: HashMap<String, HashMap<String, Vec<String>>>,
    pub gene_variant_mapper: GeneVariantMapper,
    pub variant_phenotype_mapper: VariantPhenotypeMapper,
}

impl MappedBundle {
    pub fn relationship_count(&self) -> usize {
        self.gene_variant_links.len() + self.variant_phenotype_links.len()
    }

    pub fn summary(&self) -> serde_json::Value {
        json!({
            "gene_variant_links": self.gene_variant_links.len(),
            "variant_phenotype_links": self.variant_phenotype_links.len(),
            "networks": self.networks.len(),
        })
    }
}

/// Summary of validation outcomes.
#[derive(Debug, Default, Clone)]
pub struct ValidationSummary {
    pub passed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl ValidationSummary {
    pub fn record_success(&mut self) {
        self.passed += 1;
    }

    pub fn record_failure(&mut self, messages: Vec<String>) {
        self.failed += 1;
        self.errors.extend(messages);
    }

    pub fn summary(&self) -> serde_json::Value {
        json!({
            "passed": self.passed,
            "failed": self.failed,
            "errors": self.errors,
        })
    }
}

/// Files produced by the export stage.
#[derive(Debug, Default, Clone)]
pub struct ExportReport {
    pub files_created: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl ExportReport {
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "files_created": self
                .files_created
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
            "errors": self.errors,
        })
    }
}
