//! Stage runners encapsulating the five pipeline responsibilities.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;
use tracing::debug;

use crate::mappers::CrossReferenceMapper;
use crate::normalize::{
    GeneNormalizer, PhenotypeNormalizer, PublicationNormalizer, VariantNormalizer,
};
use crate::parsers::{ClinVarParser, HpoParser, PubMedParser, RawRecord, UniProtParser};

use super::bundle::{
    ExportReport, MappedBundle, NormalizedBundle, ParsedBundle, ValidationSummary,
};
use super::{StageResult, TransformationStage, TransformationStatus};

/// Raw source data keyed by source name.
pub type RawSourceData = BTreeMap<String, Vec<RawRecord>>;

fn status_for_errors(errors: &[String]) -> TransformationStatus {
    if errors.is_empty() {
        TransformationStatus::Completed
    } else {
        TransformationStatus::Partial
    }
}

/// Execute parsing across all configured sources.
#[derive(Default)]
pub struct ParsingStageRunner {
    clinvar: ClinVarParser,
    pubmed: PubMedParser,
    hpo: HpoParser,
    uniprot: UniProtParser,
}

impl ParsingStageRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, raw_data: &RawSourceData) -> (ParsedBundle, StageResult) {
        let start = Instant::now();
        let mut bundle = ParsedBundle::default();
        let mut errors: Vec<String> = Vec::new();
        let mut processed = 0usize;

        for (source_name, records) in raw_data {
            match source_name.as_str() {
                "clinvar" => {
                    let parsed = self.clinvar.parse_batch(records);
                    for record in &parsed {
                        errors.extend(self.clinvar.validate(record));
                    }
                    processed += parsed.len();
                    bundle.clinvar = parsed;
                }
                "pubmed" => {
                    let parsed = self.pubmed.parse_batch(records);
                    for record in &parsed {
                        errors.extend(self.pubmed.validate(record));
                    }
                    processed += parsed.len();
                    bundle.pubmed = parsed;
                }
                "hpo" => {
                    let parsed = self.hpo.parse_batch(records);
                    for record in &parsed {
                        errors.extend(self.hpo.validate(record));
                    }
                    processed += parsed.len();
                    bundle.hpo = parsed;
                }
                "uniprot" => {
                    let parsed = self.uniprot.parse_batch(records);
                    for record in &parsed {
                        errors.extend(self.uniprot.validate(record));
                    }
                    processed += parsed.len();
                    bundle.uniprot = parsed;
                }
                other => {
                    errors.push(format!("No parser available for source: {other}"));
                }
            }
        }

        let result = StageResult::new(
            TransformationStage::Parsing,
            status_for_errors(&errors),
            processed,
            errors.len(),
            bundle.summary(),
            errors,
            start.elapsed().as_secs_f64(),
        );
        (bundle, result)
    }
}

/// Normalize parsed records into canonical entities.
#[derive(Default)]
pub struct NormalizationStageRunner {
    genes: GeneNormalizer,
    variants: VariantNormalizer,
    phenotypes: PhenotypeNormalizer,
    publications: PublicationNormalizer,
}

impl NormalizationStageRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, parsed: &ParsedBundle) -> (NormalizedBundle, StageResult) {
        let start = Instant::now();
        let mut bundle = NormalizedBundle::default();
        let mut seen_genes: std::collections::HashSet<String> = std::collections::HashSet::new();

        // UniProt genes first, then ClinVar genes; the seen-gene set keeps
        // normalization idempotent across overlapping source contributions.
        for entry in &parsed.uniprot {
            for gene_index in 0..entry.genes.len() {
                match self.genes.normalize_uniprot(entry, gene_index) {
                    Some(gene) => {
                        if seen_genes.insert(gene.primary_id.clone()) {
                            bundle.genes.push(gene);
                        }
                    }
                    None => {
                        let identity = entry
                            .genes
                            .get(gene_index)
                            .and_then(|g| g.gene_name.as_ref())
                            .map(|v| v.value.clone())
                            .unwrap_or_default();
                        bundle
                            .errors
                            .push(format!("Failed to normalize UniProt gene: {identity}"));
                    }
                }
            }
        }

        for variant in &parsed.clinvar {
            match self.genes.normalize_clinvar(variant) {
                Some(gene) => {
                    if seen_genes.insert(gene.primary_id.clone()) {
                        bundle.genes.push(gene);
                    }
                }
                None => {
                    if let Some(symbol) = variant.gene_symbol.as_deref() {
                        bundle
                            .errors
                            .push(format!("Failed to normalize ClinVar gene: {symbol}"));
                    }
                }
            }
        }

        for variant in &parsed.clinvar {
            match self.variants.normalize_clinvar(variant) {
                Some(normalized) => bundle.variants.push(normalized),
                None => bundle.errors.push(format!(
                    "Failed to normalize ClinVar variant: {}",
                    variant.clinvar_id
                )),
            }
        }

        for variant in &parsed.clinvar {
            for phenotype_name in &variant.phenotypes {
                match self.phenotypes.normalize_clinvar(phenotype_name) {
                    Some(normalized) => bundle.phenotypes.push(normalized),
                    None => bundle.errors.push(format!(
                        "Failed to normalize ClinVar phenotype: {phenotype_name}"
                    )),
                }
            }
        }

        for term in &parsed.hpo {
            match self.phenotypes.normalize_hpo(term) {
                Some(normalized) => bundle.phenotypes.push(normalized),
                None => bundle
                    .errors
                    .push(format!("Failed to normalize HPO term: {}", term.hpo_id)),
            }
        }

        for publication in &parsed.pubmed {
            match self.publications.normalize_pubmed(publication) {
                Some(normalized) => bundle.publications.push(normalized),
                None => bundle.errors.push(format!(
                    "Failed to normalize PubMed publication: {}",
                    publication.pubmed_id
                )),
            }
        }

        // UniProt references without a usable citation are simply skipped.
        for entry in &parsed.uniprot {
            for reference in &entry.references {
                if let Some(normalized) = self.publications.normalize_uniprot(reference) {
                    bundle.publications.push(normalized);
                }
            }
        }

        let status = status_for_errors(&bundle.errors);
        let result = StageResult::new(
            TransformationStage::Normalization,
            status,
            bundle.total_records(),
            bundle.errors.len(),
            bundle.summary(),
            bundle.errors.clone(),
            start.elapsed().as_secs_f64(),
        );
        (bundle, result)
    }
}

/// Create cross-references between normalized entities.
#[derive(Default)]
pub struct MappingStageRunner;

impl MappingStageRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, normalized: &NormalizedBundle) -> (MappedBundle, StageResult) {
        let start = Instant::now();
        let mut bundle = MappedBundle::default();
        let mut cross_mapper = CrossReferenceMapper::new();
        let errors: Vec<String> = Vec::new();

        // Lookup by lowercased primary id and symbol.
        let mut gene_lookup: BTreeMap<String, &crate::entities::NormalizedGene> = BTreeMap::new();
        for gene in &normalized.genes {
            gene_lookup.insert(gene.primary_id.to_lowercase(), gene);
        }
        for gene in &normalized.genes {
            if let Some(symbol) = gene.symbol.as_deref() {
                gene_lookup.insert(symbol.to_lowercase(), gene);
            }
        }

        for variant in &normalized.variants {
            let Some(symbol) = variant.gene_symbol.as_deref() else {
                continue;
            };
            let Some(gene) = gene_lookup.get(&symbol.to_lowercase()) else {
                continue;
            };
            if let Some(location) = variant.genomic_location.as_ref() {
                if let Some(position) = location.position {
                    if !location.chromosome.is_empty() {
                        bundle.gene_variant_mapper.add_gene_coordinates(
                            &gene.primary_id,
                            &location.chromosome,
                            position,
                            position,
                        );
                    }
                }
            }
            if let Some(link) = bundle.gene_variant_mapper.map_relationship(gene, variant) {
                cross_mapper.add_reference(&gene.primary_id, &variant.primary_id);
                bundle.gene_variant_links.push(link);
            }
        }

        for variant in &normalized.variants {
            for phenotype in &normalized.phenotypes {
                if let Some(link) =
                    bundle
                        .variant_phenotype_mapper
                        .map_relationship(variant, phenotype, None)
                {
                    cross_mapper.add_reference(&variant.primary_id, &phenotype.primary_id);
                    bundle.variant_phenotype_links.push(link);
                }
            }
        }

        for gene in &normalized.genes {
            let network = cross_mapper.build_network(&gene.primary_id);
            bundle.networks.insert(gene.primary_id.clone(), network);
        }

        debug!(
            gene_variant = bundle.gene_variant_links.len(),
            variant_phenotype = bundle.variant_phenotype_links.len(),
            "mapping stage recorded links"
        );

        let result = StageResult::new(
            TransformationStage::Mapping,
            status_for_errors(&errors),
            bundle.relationship_count(),
            errors.len(),
            bundle.summary(),
            errors,
            start.elapsed().as_secs_f64(),
        );
        (bundle, result)
    }
}

/// Validate mapped relationships for structural quality.
#[derive(Default)]
pub struct ValidationStageRunner;

impl ValidationStageRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, mapped: &MappedBundle) -> (ValidationSummary, StageResult) {
        let start = Instant::now();
        let mut summary = ValidationSummary::default();

        for link in &mapped.gene_variant_links {
            let issues = mapped.gene_variant_mapper.validate_mapping(link);
            if issues.is_empty() {
                summary.record_success();
            } else {
                summary.record_failure(issues);
            }
        }

        for link in &mapped.variant_phenotype_links {
            let issues = mapped.variant_phenotype_mapper.validate_mapping(link);
            if issues.is_empty() {
                summary.record_success();
            } else {
                summary.record_failure(issues);
            }
        }

        let status = if summary.failed == 0 {
            TransformationStatus::Completed
        } else {
            TransformationStatus::Partial
        };
        let result = StageResult::new(
            TransformationStage::Validation,
            status,
            summary.passed + summary.failed,
            summary.failed,
            summary.summary(),
            summary.errors.clone(),
            start.elapsed().as_secs_f64(),
        );
        (summary, result)
    }
}

/// Export normalized entities and mapping summaries to disk.
pub struct ExportStageRunner {
    output_dir: PathBuf,
}

impl ExportStageRunner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn run(
        &self,
        normalized: &NormalizedBundle,
        mapped: &MappedBundle,
    ) -> (ExportReport, StageResult) {
        let start = Instant::now();
        let mut report = ExportReport::default();

        if let Err(err) = self.write_exports(normalized, mapped, &mut report) {
            report.errors.push(format!("Export failed: {err}"));
        }

        let status = if report.errors.is_empty() {
            TransformationStatus::Completed
        } else {
            TransformationStatus::Failed
        };
        let result = StageResult::new(
            TransformationStage::Export,
            status,
            report.files_created.len(),
            report.errors.len(),
            report.summary(),
            report.errors.clone(),
            start.elapsed().as_secs_f64(),
        );
        (report, result)
    }

    fn write_exports(
        &self,
        normalized: &NormalizedBundle,
        mapped: &MappedBundle,
        report: &mut ExportReport,
    ) -> Result<(), crate::error::HarvestError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let collections: [(&str, Vec<serde_json::Value>); 4] = [
            (
                "genes",
                normalized
                    .genes
                    .iter()
                    .map(|e| {
                        entity_row(&e.primary_id, e.display_name(), &e.source, e.confidence_score)
                    })
                    .collect(),
            ),
            (
                "variants",
                normalized
                    .variants
                    .iter()
                    .map(|e| {
                        entity_row(&e.primary_id, e.display_name(), &e.source, e.confidence_score)
                    })
                    .collect(),
            ),
            (
                "phenotypes",
                normalized
                    .phenotypes
                    .iter()
                    .map(|e| {
                        entity_row(&e.primary_id, e.display_name(), &e.source, e.confidence_score)
                    })
                    .collect(),
            ),
            (
                "publications",
                normalized
                    .publications
                    .iter()
                    .map(|e| {
                        entity_row(&e.primary_id, e.display_name(), &e.source, e.confidence_score)
                    })
                    .collect(),
            ),
        ];

        for (kind, rows) in collections {
            if rows.is_empty() {
                continue;
            }
            let path = self.output_dir.join(format!("{kind}_normalized.json"));
            let payload = serde_json::to_string_pretty(&rows)?;
            std::fs::write(&path, payload)?;
            report.files_created.push(path);
        }

        let mappings = json!({
            "gene_variant_count": mapped.gene_variant_links.len(),
            "variant_phenotype_count": mapped.variant_phenotype_links.len(),
            "networks_count": mapped.networks.len(),
        });
        let mappings_path = self.output_dir.join("entity_mappings.json");
        std::fs::write(&mappings_path, serde_json::to_string_pretty(&mappings)?)?;
        report.files_created.push(mappings_path);

        Ok(())
    }
}

fn entity_row(
    primary_id: &str,
    display_name: Option<&str>,
    source: &str,
    confidence_score: f64,
) -> serde_json::Value {
    json!({
        "primary_id": primary_id,
        "display_name": display_name,
        "source": source,
        "confidence_score": confidence_score,
    })
}
