//! OPF package document parser.
//!
//! Namespace-tolerant: elements and attributes are matched on their local
//! names, so `opf:item`, `item` and default-namespace documents all parse.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use bindery_shared::{BinderyError, Result};

use crate::{ManifestEntry, Package, PackageMetadata, SpineRef};

/// Metadata elements whose text content we keep.
const METADATA_FIELDS: &[&[u8]] = &[b"title", b"creator", b"language", b"publisher", b"date"];

/// Parse an OPF package document.
///
/// `origin` is the package path, used for error context and as the base
/// directory that manifest hrefs are relative to.
pub(crate) fn parse_package(xml: &str, origin: &Path) -> Result<Package> {
    // Text is trimmed per field instead of per event: entity references split
    // text into several events and their inner whitespace must survive.
    let mut reader = Reader::from_str(strip_bom(xml));
    reader.config_mut().trim_text(false);

    let mut metadata = PackageMetadata::default();
    let mut manifest: Vec<ManifestEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut spine: Vec<SpineRef> = Vec::new();

    let mut saw_package = false;
    let mut depth: usize = 0;
    let mut in_metadata = false;
    let mut capture: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            BinderyError::manifest(
                origin,
                format!("malformed markup at byte {}: {e}", reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(e) => {
                depth += 1;
                let local = e.local_name();
                match local.as_ref() {
                    b"package" => saw_package = true,
                    b"metadata" => in_metadata = true,
                    name if in_metadata && METADATA_FIELDS.contains(&name) => {
                        capture = Some(name.to_vec());
                        text.clear();
                    }
                    _ => handle_entry(&e, origin, &mut manifest, &mut index, &mut spine)?,
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"package" {
                    saw_package = true;
                }
                handle_entry(&e, origin, &mut manifest, &mut index, &mut spine)?;
            }
            Event::Text(e) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if capture.is_some() {
                    let char_ref = e.resolve_char_ref().map_err(|err| {
                        BinderyError::manifest(origin, format!("bad character reference: {err}"))
                    })?;
                    let entity = String::from_utf8_lossy(e.as_ref());
                    match (char_ref, resolve_predefined_entity(&entity)) {
                        (Some(c), _) => text.push(c),
                        (None, Some(resolved)) => text.push_str(resolved),
                        (None, None) => warn!(%entity, "unknown entity in metadata, dropping"),
                    }
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let local = e.local_name();
                if local.as_ref() == b"metadata" {
                    in_metadata = false;
                }
                if capture.as_deref() == Some(local.as_ref()) {
                    metadata.record(local.as_ref(), text.trim());
                    capture = None;
                    text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(BinderyError::manifest(
            origin,
            format!("document ended with {depth} unclosed element(s)"),
        ));
    }
    if !saw_package {
        return Err(BinderyError::manifest(origin, "no <package> root element"));
    }

    debug!(
        items = manifest.len(),
        spine = spine.len(),
        title = ?metadata.title,
        "package document parsed"
    );

    Ok(Package {
        base_dir: origin.parent().map(Path::to_path_buf).unwrap_or_default(),
        metadata,
        manifest,
        index,
        spine,
    })
}

/// Record `item` and `itemref` elements; everything else is ignored.
fn handle_entry(
    e: &BytesStart<'_>,
    origin: &Path,
    manifest: &mut Vec<ManifestEntry>,
    index: &mut HashMap<String, usize>,
    spine: &mut Vec<SpineRef>,
) -> Result<()> {
    match e.local_name().as_ref() {
        b"item" => {
            let id = attribute(e, b"id", origin)?;
            let href = attribute(e, b"href", origin)?;
            let media_type = attribute(e, b"media-type", origin)?.unwrap_or_default();

            let (Some(id), Some(href)) = (id, href) else {
                warn!("manifest item without id or href, ignoring");
                return Ok(());
            };

            if index.contains_key(&id) {
                warn!(%id, %href, "duplicate manifest id, keeping the first entry");
                return Ok(());
            }

            index.insert(id.clone(), manifest.len());
            manifest.push(ManifestEntry {
                id,
                href,
                media_type,
            });
        }
        b"itemref" => {
            let Some(idref) = attribute(e, b"idref", origin)? else {
                warn!("spine itemref without idref, ignoring");
                return Ok(());
            };
            let linear = attribute(e, b"linear", origin)?.is_none_or(|v| v != "no");
            spine.push(SpineRef { idref, linear });
        }
        _ => {}
    }
    Ok(())
}

/// Read one attribute by local name, resolving entity and character references.
fn attribute(e: &BytesStart<'_>, name: &[u8], origin: &Path) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name {
            let value = attr.unescape_value().map_err(|err| {
                BinderyError::manifest(origin, format!("bad attribute value: {err}"))
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn strip_bom(xml: &str) -> &str {
    xml.strip_prefix('\u{feff}').unwrap_or(xml)
}
