// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classification prompt

use std::collections::BTreeMap;

use super::CategorySet;

/// Build the single instruction sent with every image
///
/// Descriptions are included for labels present in both `categories` and
/// `descriptions`. The fallback label is always described as "none of the
/// above", listing the other labels.
pub fn build_prompt(categories: &CategorySet, descriptions: &BTreeMap<String, String>) -> String {
    let labels = categories.labels();
    let fallback = categories.fallback();

    let mut prompt = format!(
        "Look at this image and classify it into exactly one category: {}. ",
        labels.join(", ")
    );

    prompt.push_str("Category descriptions: ");
    for label in labels.iter().filter(|l| l.as_str() != fallback) {
        if let Some(desc) = descriptions.get(label) {
            prompt.push_str(&format!("[{}]: {} ", label, desc.trim()));
        }
    }

    let others: Vec<String> = labels
        .iter()
        .filter(|l| l.as_str() != fallback)
        .map(|l| format!("[{}]", l))
        .collect();
    if others.is_empty() {
        prompt.push_str(&format!("[{}]: Any image. ", fallback));
    } else {
        prompt.push_str(&format!(
            "[{}]: Images that can't be matched to any of the descriptions in {}. ",
            fallback,
            others.join(", ")
        ));
    }

    prompt.push_str("Base it on visible people, events, locations, or themes. ");
    prompt.push_str(&format!(
        "Respond with ONLY the category name (e.g., '{}'). Do not explain.",
        labels.first().map(String::as_str).unwrap_or(fallback)
    ));

    prompt
}
