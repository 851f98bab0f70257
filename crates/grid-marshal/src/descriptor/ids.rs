// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stable type and field identifiers.

/// Stable 32-bit id of a name: first four bytes (little-endian) of its MD5 digest.
///
/// Independent of declaration order, so adding or removing a field never
/// renumbers the others.
pub fn stable_id(name: &str) -> i32 {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    i32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Type id of a class name.
pub fn type_id(class_name: &str) -> i32 {
    stable_id(class_name)
}

/// Field id of a field name.
pub fn field_id(field_name: &str) -> i32 {
    stable_id(field_name)
}
