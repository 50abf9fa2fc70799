// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vista::classify::{match_label, CategorySet};
use vista::detect::SignatureTable;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    header: &'a [u8],
    response: &'a str,
    labels: Vec<&'a str>,
}

fuzz_target!(|input: Input<'_>| {
    let _ = SignatureTable::default().detect(input.header);

    let categories = CategorySet::new(&input.labels, "other");
    if let Some(label) = match_label(input.response, &categories) {
        assert!(categories.contains(label));
    }
});
