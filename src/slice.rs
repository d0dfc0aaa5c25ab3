// src/slice.rs
use std::collections::HashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::dataset::DatasetEntry;

static KEY_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static pattern"));

/// Parameter record bound to one invocation of a sliced task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceParams {
    pub order: usize,
    pub name: String,
}

/// Address of one slice: its position in the plan, the dataset display name,
/// a backend-safe step key and an isolated working sub-path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceKey {
    order: usize,
    name: String,
    step_key: String,
    sub_path: String,
}

impl SliceKey {
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_key(&self) -> &str {
        &self.step_key
    }

    /// Working directory of this slice, relative to the task root
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    pub fn params(&self) -> SliceParams {
        SliceParams {
            order: self.order,
            name: self.name.clone(),
        }
    }
}

/// Ordered slice keys; key `i` addresses dataset entry `i` for the whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlicePlan {
    keys: Vec<SliceKey>,
}

impl SlicePlan {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, order: usize) -> Option<&SliceKey> {
        self.keys.get(order)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SliceKey> {
        self.keys.iter()
    }

    /// Dataset display names in slice order
    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(|key| key.name.clone()).collect()
    }
}

/// Plan one slice per dataset entry, in entry order
pub fn plan(entries: &[DatasetEntry]) -> SlicePlan {
    let mut seen = HashSet::new();
    let keys = entries
        .iter()
        .enumerate()
        .map(|(order, entry)| {
            let base = format!("train-{}", slug(&entry.name));
            let mut step_key = base.clone();
            let mut attempt = 0;
            while !seen.insert(step_key.clone()) {
                // A suffixed key may itself be another dataset's slug
                step_key = match attempt {
                    0 => format!("{}-{}", base, order),
                    n => format!("{}-{}-{}", base, order, n),
                };
                attempt += 1;
            }
            SliceKey {
                order,
                name: entry.name.clone(),
                step_key,
                sub_path: format!("slice-{:05}", order),
            }
        })
        .collect();

    SlicePlan { keys }
}

fn slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let slug = KEY_UNSAFE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "dataset".to_string()
    } else {
        slug.to_string()
    }
}
