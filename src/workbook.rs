//! Workbook part parsing: sheet inventory and workbook properties.

use crate::error::{Error, Result};
use crate::model::{DateEpoch, SheetInfo, SheetVisibility};
use crate::package::{resolve_path, OpcPackage, Relationships};

/// The parsed workbook part.
///
/// Lists the workbook's sheets with their relationship targets resolved and
/// exposes the serial-date epoch declared in `workbookPr`.
#[derive(Debug)]
pub struct Workbook {
    path: String,
    sheets: Vec<SheetInfo>,
    epoch: DateEpoch,
    rels: Relationships,
}

impl Workbook {
    /// Parse the workbook part located through the package's root
    /// relationships, along with its own relationship set.
    pub fn parse(package: &OpcPackage) -> Result<Self> {
        let path = package.workbook_path()?;
        let xml = package.read_part(&path)?;
        let rels = package.relationships_for(&path)?;

        let (mut sheets, epoch) = parse_workbook_xml(&xml, &path)?;
        for sheet in &mut sheets {
            match rels.get(&sheet.rel_id) {
                Some(rel) => sheet.target = rel.target.clone(),
                None => {
                    return Err(Error::DanglingSheetRelationship {
                        sheet: sheet.name.clone(),
                        rel_id: sheet.rel_id.clone(),
                    })
                }
            }
        }

        Ok(Self {
            path,
            sheets,
            epoch,
            rels,
        })
    }

    /// All sheets in workbook order.
    pub fn sheets(&self) -> &[SheetInfo] {
        &self.sheets
    }

    /// Number of sheets.
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Sheets that are neither hidden nor very hidden.
    pub fn visible_sheets(&self) -> impl Iterator<Item = &SheetInfo> {
        self.sheets.iter().filter(|s| s.is_visible())
    }

    /// Find a sheet by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&SheetInfo> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Find a sheet by zero-based position.
    pub fn find_by_index(&self, index: usize) -> Option<&SheetInfo> {
        self.sheets.get(index)
    }

    /// The serial-date epoch declared by `workbookPr/@date1904`.
    pub fn date_epoch(&self) -> DateEpoch {
        self.epoch
    }

    /// Resolve a relationship id to its raw target, if present.
    pub fn resolve(&self, rel_id: &str) -> Option<&str> {
        self.rels.get(rel_id).map(|r| r.target.as_str())
    }

    /// Package path of the workbook part itself.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Package-absolute path of a sheet's worksheet part.
    ///
    /// Sheet targets are relative to the workbook part's directory.
    pub fn sheet_path(&self, sheet: &SheetInfo) -> String {
        resolve_path(&self.path, &sheet.target)
    }

    /// Package-absolute path of the styles part, if the workbook links one.
    pub fn styles_path(&self) -> Option<String> {
        self.part_of_type("/styles")
    }

    /// Package-absolute path of the shared-strings part, if linked.
    pub fn shared_strings_path(&self) -> Option<String> {
        self.part_of_type("/sharedStrings")
    }

    fn part_of_type(&self, type_suffix: &str) -> Option<String> {
        self.rels
            .iter()
            .find(|r| r.rel_type.ends_with(type_suffix))
            .map(|r| resolve_path(&self.path, &r.target))
    }
}

/// Parse sheets and workbook properties out of the workbook part.
fn parse_workbook_xml(xml: &str, part: &str) -> Result<(Vec<SheetInfo>, DateEpoch)> {
    let mut sheets = Vec::new();
    let mut epoch = DateEpoch::Epoch1900;

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e)) => {
                match e.name().as_ref() {
                    b"workbookPr" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"date1904" {
                                let value = String::from_utf8_lossy(&attr.value).to_lowercase();
                                epoch = if value == "1" || value == "true" {
                                    DateEpoch::Epoch1904
                                } else {
                                    DateEpoch::Epoch1900
                                };
                            }
                        }
                    }
                    b"sheet" => {
                        let mut name = String::new();
                        let mut sheet_id = 0u32;
                        let mut rel_id = String::new();
                        let mut visibility = SheetVisibility::Visible;

                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"name" => {
                                    name = String::from_utf8_lossy(&attr.value).to_string();
                                }
                                b"sheetId" => {
                                    sheet_id = String::from_utf8_lossy(&attr.value)
                                        .parse()
                                        .unwrap_or(0);
                                }
                                b"r:id" => {
                                    rel_id = String::from_utf8_lossy(&attr.value).to_string();
                                }
                                b"state" => {
                                    visibility = match attr.value.as_ref() {
                                        b"hidden" => SheetVisibility::Hidden,
                                        b"veryHidden" => SheetVisibility::VeryHidden,
                                        _ => SheetVisibility::Visible,
                                    };
                                }
                                _ => {}
                            }
                        }

                        if !name.is_empty() {
                            sheets.push(SheetInfo {
                                name,
                                sheet_id,
                                rel_id,
                                target: String::new(),
                                visibility,
                            });
                        }
                    }
                    _ => {}
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

    Ok((sheets, epoch))
}
