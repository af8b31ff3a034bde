use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::SkillMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total_skills: usize,
    pub by_writer: BTreeMap<String, usize>,
    pub total_successes: u64,
    pub total_failures: u64,
}

impl CatalogStats {
    pub fn from_skills(skills: &SkillMap) -> Self {
        let mut stats = Self {
            total_skills: skills.len(),
            ..Self::default()
        };
        for record in skills.values() {
            *stats.by_writer.entry(record.created_by.clone()).or_default() += 1;
            stats.total_successes += record.success_count;
            stats.total_failures += record.fail_count;
        }
        stats
    }
}
