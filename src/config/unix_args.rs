// SPDX-License-Identifier: MPL-2.0

//! This module contains utilities for manipulating common Unix command-line arguments.

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};

/// Split a string of Unix arguments into an array of key-value strings or switches.
/// Positional arguments are not supported.
pub fn split_to_kv_array(args: &str) -> Result<Vec<String>> {
    let target = shlex::split(args)
        .ok_or_else(|| Error::Usage(format!("Failed to parse unix args: {:?}", args)))?;

    // Join the key value arguments as a single element
    let mut joined = Vec::<String>::new();
    let mut last_has_value = false;
    for elem in target {
        if !elem.starts_with('-') && !last_has_value {
            if let Some(last) = joined.last_mut() {
                last.push(' ');
                last.push_str(&elem);
                last_has_value = true;
                continue;
            }
            return Err(Error::Usage(format!(
                "`{}` is a positional argument, which is not supported",
                elem
            )));
        }
        joined.push(elem);
        last_has_value = false;
    }

    Ok(joined)
}

/// Turn a flat argument vector into key-value strings, the inverse of
/// [`expand_kv_array`].
pub fn join_kv_array<S: AsRef<str>>(argv: &[S]) -> Vec<String> {
    let mut joined: Vec<String> = Vec::new();
    let mut last_has_value = true;
    for arg in argv.iter().map(AsRef::as_ref) {
        if !arg.starts_with('-') && !last_has_value {
            if let Some(last) = joined.last_mut() {
                last.push(' ');
                last.push_str(arg);
                last_has_value = true;
                continue;
            }
        }
        joined.push(arg.to_owned());
        last_has_value = false;
    }
    joined
}

/// Split key-value strings back into separate arguments. Only the first
/// separator splits, so values may contain spaces.
pub fn expand_kv_array(array: &[String]) -> Vec<String> {
    array
        .iter()
        .flat_map(|item| match item.split_once(' ') {
            Some((key, value)) => vec![key.to_owned(), value.to_owned()],
            None => vec![item.clone()],
        })
        .collect()
}

/// Apply key-value pairs to an array of strings.
///
/// The provided arguments will be appended to the array if the key is not already present or if the key is a multi-value key.
/// Otherwise, the value will be updated.
pub fn apply_kv_array(
    array: &mut Vec<String>,
    args: &[String],
    separator: &str,
    multi_value_keys: &[&str],
) {
    let multi_value_keys = {
        let mut inferred_keys = infer_multi_value_keys(array, separator);
        for key in multi_value_keys {
            inferred_keys.insert(key.to_string());
        }
        inferred_keys
    };

    debug!("multi value keys: {:?}", multi_value_keys);

    // We use IndexMap to keep key orders
    let mut key_strings = IndexMap::new();
    let mut multi_value_key_strings: IndexMap<String, Vec<String>> = IndexMap::new();
    for item in array.drain(..).chain(args.iter().cloned()) {
        // Each key-value string has two patterns:
        // 1. Separated by separator: key value / key=value
        if let Some(key) = get_key(&item, separator) {
            if multi_value_keys.contains(&key) {
                multi_value_key_strings.entry(key).or_default().push(item);
                continue;
            }

            key_strings.insert(key, item);
            continue;
        }
        // 2. Only key, no value
        key_strings.insert(item.clone(), item);
    }

    *array = key_strings.into_values().collect();

    for (_, mut values) in multi_value_key_strings {
        array.append(&mut values);
    }
}

fn infer_multi_value_keys(array: &[String], separator: &str) -> IndexSet<String> {
    let mut multi_val_keys = IndexSet::new();

    let mut occurred_keys = IndexSet::new();
    for item in array {
        let Some(key) = get_key(item, separator) else {
            continue;
        };

        if occurred_keys.contains(&key) {
            multi_val_keys.insert(key);
        } else {
            occurred_keys.insert(key);
        }
    }

    multi_val_keys
}

pub fn get_key(item: &str, separator: &str) -> Option<String> {
    item.split_once(separator).map(|(key, _)| key.to_string())
}
