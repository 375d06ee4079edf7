//! OPC package layer: content types and relationship resolution.

use crate::container::{ZipLimits, ZipReader};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const ROOT_RELS_PART: &str = "_rels/.rels";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

/// Collection of relationships parsed from a .rels file.
///
/// Keeps document order so "first matching relationship" queries are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    items: Vec<Relationship>,
    by_id: HashMap<String, usize>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id).map(|&i| &self.items[i])
    }

    /// Iterate relationships in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Find the first relationship whose type URI contains the fragment.
    pub fn first_of_type(&self, fragment: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type.contains(fragment))
    }

    /// Add a relationship.
    pub fn add(&mut self, rel: Relationship) {
        self.by_id.insert(rel.id.clone(), self.items.len());
        self.items.push(rel);
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Content-type catalogue from `[Content_Types].xml`.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    /// Extension (lowercase, no dot) -> content type
    defaults: HashMap<String, String>,
    /// Part path (no leading slash) -> content type
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    /// Resolve the content type of a part path.
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        let part = part.trim_start_matches('/');
        if let Some(ct) = self.overrides.get(part) {
            return Some(ct);
        }
        let extension = Path::new(part).extension()?.to_str()?.to_lowercase();
        self.defaults.get(&extension).map(String::as_str)
    }

    /// All catalogued content types, overrides first.
    pub fn types(&self) -> Vec<&str> {
        self.overrides
            .values()
            .chain(self.defaults.values())
            .map(String::as_str)
            .collect()
    }
}

/// An opened OOXML package: the Zip container plus the parsed content-type
/// catalogue and root relationship set.
#[derive(Debug)]
pub struct OpcPackage {
    zip: ZipReader,
    content_types: ContentTypes,
    root_rels: Relationships,
}

impl OpcPackage {
    /// Open a package from a file path with default limits.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_zip(ZipReader::open(path)?)
    }

    /// Open a package from a file path.
    pub fn open_with_limits(path: impl AsRef<Path>, limits: ZipLimits) -> Result<Self> {
        Self::from_zip(ZipReader::open_with_limits(path, limits)?)
    }

    /// Open a package held in memory with default limits.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_zip(ZipReader::from_bytes(data)?)
    }

    /// Open a package held in memory.
    pub fn from_bytes_with_limits(data: Vec<u8>, limits: ZipLimits) -> Result<Self> {
        Self::from_zip(ZipReader::from_bytes_with_limits(data, limits)?)
    }

    /// Wrap an already-opened container.
    pub fn from_zip(zip: ZipReader) -> Result<Self> {
        if !zip.has(CONTENT_TYPES_PART)? {
            return Err(Error::MissingContentTypes);
        }
        let content_types = parse_content_types(&zip.read_xml(CONTENT_TYPES_PART)?)?;

        if !zip.has(ROOT_RELS_PART)? {
            return Err(Error::MissingRootRels);
        }
        let root_rels = parse_relationships(&zip.read_xml(ROOT_RELS_PART)?, ROOT_RELS_PART)?;

        Ok(Self {
            zip,
            content_types,
            root_rels,
        })
    }

    /// The path of the main workbook part.
    ///
    /// Found by scanning the root relationship set for the first type URI
    /// containing `officeDocument`.
    pub fn workbook_path(&self) -> Result<String> {
        self.root_rels
            .first_of_type("officeDocument")
            .map(|rel| rel.target.trim_start_matches('/').to_string())
            .ok_or(Error::WorkbookNotFound)
    }

    /// The parsed content-type catalogue.
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// The root relationship set.
    pub fn root_relationships(&self) -> &Relationships {
        &self.root_rels
    }

    /// The underlying Zip container.
    pub fn zip(&self) -> &ZipReader {
        &self.zip
    }

    /// Read an XML part as text.
    pub fn read_part(&self, path: &str) -> Result<String> {
        self.zip.read_xml(path)
    }

    /// Read and parse the relationships for a part.
    ///
    /// A part at `xl/workbook.xml` has its relationships at
    /// `xl/_rels/workbook.xml.rels`. A missing .rels file yields an empty
    /// collection.
    pub fn relationships_for(&self, part_path: &str) -> Result<Relationships> {
        let rels_path = rels_path_for(part_path);
        if !self.zip.has(&rels_path)? {
            return Ok(Relationships::new());
        }
        parse_relationships(&self.zip.read_xml(&rels_path)?, &rels_path)
    }
}

/// Build the .rels sibling path of a part.
fn rels_path_for(part_path: &str) -> String {
    if part_path.is_empty() || part_path == "/" {
        return ROOT_RELS_PART.to_string();
    }
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

/// Resolve a relative target against the path of the part that declared it.
pub fn resolve_path(base: &str, relative: &str) -> String {
    if let Some(absolute) = relative.strip_prefix('/') {
        return absolute.to_string();
    }

    let base_dir = match base.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            normal => segments.push(normal),
        }
    }

    segments.join("/")
}

fn parse_content_types(xml: &str) -> Result<ContentTypes> {
    let mut catalogue = ContentTypes::default();
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.name();
                let is_default = name.as_ref() == b"Default";
                let is_override = name.as_ref() == b"Override";
                if is_default || is_override {
                    let mut key = String::new();
                    let mut content_type = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Extension" if is_default => {
                                key = String::from_utf8_lossy(&attr.value).to_lowercase();
                            }
                            b"PartName" if is_override => {
                                key = String::from_utf8_lossy(&attr.value)
                                    .trim_start_matches('/')
                                    .to_string();
                            }
                            b"ContentType" => {
                                content_type = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            _ => {}
                        }
                    }

                    if !key.is_empty() && !content_type.is_empty() {
                        if is_default {
                            catalogue.defaults.insert(key, content_type);
                        } else {
                            catalogue.overrides.insert(key, content_type);
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidXml {
                    part: CONTENT_TYPES_PART.to_string(),
                    detail: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(catalogue)
}

/// Parse a relationships file.
pub(crate) fn parse_relationships(xml: &str, part: &str) -> Result<Relationships> {
    let mut rels = Relationships::new();
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"TargetMode" => {
                            external =
                                String::from_utf8_lossy(&attr.value).to_lowercase() == "external"
                        }
                        _ => {}
                    }
                }

                if !id.is_empty() {
                    rels.add(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(Error::InvalidXml {
                    part: part.to_string(),
                    detail: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}
