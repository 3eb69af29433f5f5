//! Gene-variant relationship mapping via genomic coordinate arithmetic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{NormalizedGene, NormalizedVariant};

/// Basepairs of upstream padding considered part of a gene's neighborhood.
pub const UPSTREAM_PADDING_BP: i64 = 2000;
/// Basepairs of downstream padding considered part of a gene's neighborhood.
pub const DOWNSTREAM_PADDING_BP: i64 = 500;
/// Distance from a gene boundary classified as a splice-site position.
pub const SPLICE_BORDER_BP: i64 = 10;

/// Positional relationship between a variant and a gene.
///
/// `WithinGene` is reserved for future refinement; the classifier emits
/// only the other four variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneVariantRelationship {
    WithinGene,
    Upstream,
    Downstream,
    SpliceSite,
    Coding,
}

/// A directed link between a gene and a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneVariantLink {
    pub gene_id: String,
    pub variant_id: String,
    pub relationship_type: GeneVariantRelationship,
    pub confidence_score: f64,
    pub evidence_sources: Vec<String>,
    pub genomic_distance: Option<i64>,
    pub functional_impact: Option<String>,
}

/// Maps gene-variant relationships from registered gene coordinates.
#[derive(Debug, Default)]
pub struct GeneVariantMapper {
    gene_coordinates: HashMap<String, (String, i64, i64)>,
    links: Vec<GeneVariantLink>,
    gene_to_variants: HashMap<String, Vec<usize>>,
    variant_to_genes: HashMap<String, Vec<usize>>,
}

impl GeneVariantMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or widen the coordinate interval for a gene.
    pub fn add_gene_coordinates(
        &mut self,
        gene_id: &str,
        chromosome: &str,
        start_pos: i64,
        end_pos: i64,
    ) {
        self.gene_coordinates
            .entry(gene_id.to_string())
            .and_modify(|(chrom, start, end)| {
                if chrom == chromosome {
                    *start = (*start).min(start_pos);
                    *end = (*end).max(end_pos);
                }
            })
            .or_insert_with(|| (chromosome.to_string(), start_pos, end_pos));
    }

    /// Classify and record the relationship between a gene and a variant.
    ///
    /// Returns `None` when coordinates are missing, chromosomes differ, or
    /// the variant falls outside the padded gene neighborhood.
    pub fn map_relationship(
        &mut self,
        gene: &NormalizedGene,
        variant: &NormalizedVariant,
    ) -> Option<GeneVariantLink> {
        let (gene_chrom, gene_start, gene_end) =
            self.gene_coordinates.get(&gene.primary_id)?.clone();
        let location = variant.genomic_location.as_ref()?;
        let position = location.position?;

        if location.chromosome != gene_chrom {
            return None;
        }

        let relationship = classify_relationship(gene_start, gene_end, position)?;
        let source = if variant.source.is_empty() {
            "unknown".to_string()
        } else {
            variant.source.clone()
        };

        let link = GeneVariantLink {
            gene_id: gene.primary_id.clone(),
            variant_id: variant.primary_id.clone(),
            relationship_type: relationship,
            confidence_score: 0.8,
            evidence_sources: vec![source],
            genomic_distance: Some(genomic_distance(gene_start, gene_end, position)),
            functional_impact: None,
        };

        let index = self.links.len();
        self.links.push(link.clone());
        self.gene_to_variants
            .entry(link.gene_id.clone())
            .or_default()
            .push(index);
        self.variant_to_genes
            .entry(link.variant_id.clone())
            .or_default()
            .push(index);
        Some(link)
    }

    /// All links recorded for a gene.
    pub fn variants_for_gene(&self, gene_id: &str) -> Vec<&GeneVariantLink> {
        self.gene_to_variants
            .get(gene_id)
            .map(|indices| indices.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// All links recorded for a variant.
    pub fn genes_for_variant(&self, variant_id: &str) -> Vec<&GeneVariantLink> {
        self.variant_to_genes
            .get(variant_id)
            .map(|indices| indices.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// Structural validation issues for a link.
    pub fn validate_mapping(&self, link: &GeneVariantLink) -> Vec<String> {
        let mut errors = Vec::new();
        if link.gene_id.is_empty() {
            errors.push("Missing gene ID".to_string());
        }
        if link.variant_id.is_empty() {
            errors.push("Missing variant ID".to_string());
        }
        if !(0.0..=1.0).contains(&link.confidence_score) {
            errors.push("Invalid confidence score".to_string());
        }
        if link.genomic_distance.is_some_and(|d| d < 0) {
            errors.push("Invalid genomic distance".to_string());
        }
        errors
    }

    /// Serialize the recorded links grouped by gene id.
    pub fn export_mappings(&self) -> serde_json::Value {
        let mut grouped = serde_json::Map::new();
        for (gene_id, indices) in &self.gene_to_variants {
            let links: Vec<serde_json::Value> = indices
                .iter()
                .filter_map(|&i| serde_json::to_value(&self.links[i]).ok())
                .collect();
            grouped.insert(gene_id.clone(), serde_json::Value::Array(links));
        }
        serde_json::Value::Object(grouped)
    }
}

/// Classify a variant position against a gene interval with padding.
fn classify_relationship(
    gene_start: i64,
    gene_end: i64,
    variant_pos: i64,
) -> Option<GeneVariantRelationship> {
    let extended_start = gene_start - UPSTREAM_PADDING_BP;
    let extended_end = gene_end + DOWNSTREAM_PADDING_BP;

    if (gene_start..=gene_end).contains(&variant_pos) {
        if variant_pos - gene_start <= SPLICE_BORDER_BP || gene_end - variant_pos <= SPLICE_BORDER_BP
        {
            return Some(GeneVariantRelationship::SpliceSite);
        }
        return Some(GeneVariantRelationship::Coding);
    }
    if (extended_start..gene_start).contains(&variant_pos) {
        return Some(GeneVariantRelationship::Upstream);
    }
    if variant_pos > gene_end && variant_pos <= extended_end {
        return Some(GeneVariantRelationship::Downstream);
    }
    None
}

/// Distance from a position to the gene interval; zero inside the gene.
fn genomic_distance(gene_start: i64, gene_end: i64, variant_pos: i64) -> i64 {
    if (gene_start..=gene_end).contains(&variant_pos) {
        0
    } else if variant_pos < gene_start {
        gene_start - variant_pos
    } else {
        variant_pos - gene_end
    }
}
