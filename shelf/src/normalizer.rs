//! Turns a pasteboard snapshot into `ClipData`.
//!
//! Only the types enabled in `StoreTypes` are read. RTF and RTFD share the
//! `rtf_data` slot; RTFD wins whenever both are declared.

use crate::interface::{ClipType, Pasteboard};
use crate::models::ClipData;
use crate::preferences::StoreTypes;

/// A declared pasteboard type that maps to a capturable `ClipType`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    pub identifier: String,
    pub clip_type: ClipType,
}

/// Recognised, enabled types in declared order, first occurrence only
pub fn capturable_types(declared: &[String], store_types: &StoreTypes) -> Vec<DeclaredType> {
    let mut seen: Vec<ClipType> = Vec::new();
    declared
        .iter()
        .filter_map(|identifier| {
            let clip_type = ClipType::from_pasteboard_type(identifier)?;
            if !store_types.is_enabled(clip_type) || seen.contains(&clip_type) {
                return None;
            }
            seen.push(clip_type);
            Some(DeclaredType {
                identifier: identifier.clone(),
                clip_type,
            })
        })
        .collect()
}

/// Read every capturable representation into one `ClipData`.
///
/// Returns an empty `ClipData` when nothing enabled is present; a declared
/// type whose payload cannot be read is dropped from `types`.
pub fn normalize(pasteboard: &dyn Pasteboard, declared: &[String], store_types: &StoreTypes) -> ClipData {
    let mut data = ClipData::default();
    let mut rtf_from_rtfd = false;

    for declared_type in capturable_types(declared, store_types) {
        let identifier = declared_type.identifier;
        let captured = match declared_type.clip_type {
            ClipType::String => match pasteboard.string_for_type(identifier) {
                Some(value) => {
                    data.string_value = value;
                    true
                }
                None => false,
            },
            ClipType::Rtfd => match pasteboard.data_for_type(identifier) {
                Some(bytes) => {
                    data.rtf_data = Some(bytes);
                    rtf_from_rtfd = true;
                    true
                }
                None => false,
            },
            ClipType::Rtf => {
                if rtf_from_rtfd || declared_has(declared, ClipType::Rtfd, store_types) {
                    // RTFD is (or will be) captured; keep RTF only as a tag
                    true
                } else {
                    match pasteboard.data_for_type(identifier) {
                        Some(bytes) => {
                            data.rtf_data = Some(bytes);
                            true
                        }
                        None => false,
                    }
                }
            }
            ClipType::Pdf => match pasteboard.data_for_type(identifier) {
                Some(bytes) => {
                    data.pdf = Some(bytes);
                    true
                }
                None => false,
            },
            ClipType::Filenames => match read_list(pasteboard, identifier) {
                Some(names) => {
                    data.file_names = names;
                    true
                }
                None => false,
            },
            ClipType::Url => match read_list(pasteboard, identifier) {
                Some(urls) => {
                    data.urls = urls.into_iter().filter(|u| url::Url::parse(u).is_ok()).collect();
                    !data.urls.is_empty()
                }
                None => false,
            },
            ClipType::Tiff => match pasteboard.data_for_type(identifier) {
                Some(bytes) if !bytes.is_empty() => {
                    data.image = Some(bytes);
                    true
                }
                _ => false,
            },
        };

        if captured {
            data.types.push(declared_type.clip_type);
        }
    }

    // A lone empty string carries nothing worth keeping
    if data.types == [ClipType::String] && data.string_value.is_empty() {
        return ClipData::default();
    }
    data
}

fn declared_has(declared: &[String], clip_type: ClipType, store_types: &StoreTypes) -> bool {
    store_types.is_enabled(clip_type)
        && declared
            .iter()
            .any(|identifier| ClipType::from_pasteboard_type(identifier) == Some(clip_type))
}

/// File-name and URL lists come either as property lists or, for the UTI
/// forms, as a single string
fn read_list(pasteboard: &dyn Pasteboard, identifier: String) -> Option<Vec<String>> {
    if let Some(list) = pasteboard.string_list_for_type(identifier.clone()) {
        return Some(list);
    }
    pasteboard
        .string_for_type(identifier)
        .map(|value| vec![value])
}
