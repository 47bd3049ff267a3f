use std::collections::BTreeMap;

use crate::model::DetectionRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesTally {
    pub counts: BTreeMap<String, usize>,
    pub species_count: usize,
    pub top_species: Option<String>,
}

impl SpeciesTally {
    /// Count one vote per image, using each image's best attribution only.
    ///
    /// The modal species wins by count; equal counts resolve to the
    /// lexicographically smallest species name.
    pub fn from_best<'a>(best: impl IntoIterator<Item = &'a DetectionRecord>) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in best {
            *counts.entry(record.species.clone()).or_default() += 1;
        }

        let mut top: Option<(&String, usize)> = None;
        // BTreeMap iterates in ascending key order, so `>` keeps the smallest name on ties.
        for (species, &count) in &counts {
            if top.map_or(true, |(_, max)| count > max) {
                top = Some((species, count));
            }
        }
        let top_species = top.map(|(species, _)| species.clone());

        Self {
            species_count: counts.len(),
            top_species,
            counts,
        }
    }
}
