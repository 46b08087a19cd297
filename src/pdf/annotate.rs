use super::ExportError;
use super::geometry::{Link, SizedBox};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::path::Path;
use tracing::debug;

/// Upper bound on `/Parent` hops when looking up inherited page attributes
const MAX_INHERIT_DEPTH: usize = 32;

pub fn load(bytes: &[u8]) -> Result<Document, ExportError> {
    Ok(Document::load_mem(bytes)?)
}

/// The box links are laid out against: TrimBox, else CropBox, else MediaBox.
///
/// CropBox and MediaBox may be inherited from the page tree, TrimBox may not.
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<SizedBox, ExportError> {
    let page = doc.get_dictionary(page_id)?;
    read_box(doc, page, b"TrimBox")
        .or_else(|| inherited_box(doc, page_id, b"CropBox"))
        .or_else(|| inherited_box(doc, page_id, b"MediaBox"))
        .ok_or(ExportError::MissingPageBox)
}

/// Place each link (boxed relative to the page body) on page 1 as a URI link
/// annotation. Returns how many were written.
pub fn add_link_annotations(doc: &mut Document, links: &[Link]) -> Result<usize, ExportError> {
    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or(ExportError::EmptyPdf)?;
    let page = page_box(doc, page_id)?;
    debug!("Page box {:?}", page);

    let mut refs = Vec::with_capacity(links.len());
    for link in links {
        let rect = link.rect.to_absolute(&page).flip_y(&page);
        let annotation = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => rect.to_rect().iter().map(|v| Object::from(*v)).collect::<Vec<Object>>(),
            "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "A" => dictionary! {
                "S" => "URI",
                "URI" => Object::string_literal(link.uri.as_str())
            }
        };
        refs.push(Object::Reference(doc.add_object(annotation)));
    }

    let written = refs.len();
    append_annots(doc, page_id, refs)?;
    Ok(written)
}

/// Write the document, creating missing parent directories
pub fn save(doc: &mut Document, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    doc.save(path)?;
    Ok(())
}

fn append_annots(
    doc: &mut Document,
    page_id: ObjectId,
    mut refs: Vec<Object>,
) -> Result<(), ExportError> {
    let existing = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
    match existing {
        Some(Object::Reference(array_id)) => {
            doc.get_object_mut(array_id)?.as_array_mut()?.append(&mut refs);
        }
        Some(Object::Array(mut items)) => {
            items.append(&mut refs);
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .set("Annots", items);
        }
        _ => {
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .set("Annots", refs);
        }
    }
    Ok(())
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn read_box(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<SizedBox> {
    let items = resolve(doc, dict.get(key).ok()?)?.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut corners = [0.0; 4];
    for (slot, item) in corners.iter_mut().zip(items) {
        *slot = number(resolve(doc, item)?)?;
    }
    Some(SizedBox::from_corners(
        corners[0], corners[1], corners[2], corners[3],
    ))
}

fn inherited_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<SizedBox> {
    let mut current = Some(page_id);
    for _ in 0..MAX_INHERIT_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Some(found) = read_box(doc, dict, key) {
            return Some(found);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(page_extra: Dictionary, pages_extra: Dictionary, with_page: bool) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        if with_page {
            let mut page = dictionary! { "Type" => "Page", "Parent" => pages_id };
            for (k, v) in page_extra.iter() {
                page.set(k.clone(), v.clone());
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let count = kids.len() as i64;
        let mut pages = dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count };
        for (k, v) in pages_extra.iter() {
            pages.set(k.clone(), v.clone());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn rect(values: [i64; 4]) -> Object {
        Object::Array(values.iter().map(|v| Object::Integer(*v)).collect())
    }

    fn first_page(doc: &Document) -> ObjectId {
        *doc.get_pages().values().next().unwrap()
    }

    #[test]
    fn test_page_box_prefers_trim_box() {
        let doc = build(
            dictionary! { "TrimBox" => rect([10, 10, 210, 310]) },
            dictionary! { "MediaBox" => rect([0, 0, 595, 842]) },
            true,
        );
        let found = page_box(&doc, first_page(&doc)).unwrap();
        assert_eq!(found, SizedBox::new(10.0, 10.0, 200.0, 300.0));
    }

    #[test]
    fn test_page_box_inherits_media_box() {
        let doc = build(
            Dictionary::new(),
            dictionary! { "MediaBox" => rect([0, 0, 595, 842]) },
            true,
        );
        let found = page_box(&doc, first_page(&doc)).unwrap();
        assert_eq!(found, SizedBox::new(0.0, 0.0, 595.0, 842.0));
    }

    #[test]
    fn test_page_box_crop_box_beats_media_box() {
        let doc = build(
            dictionary! { "CropBox" => rect([0, 0, 500, 800]) },
            dictionary! { "MediaBox" => rect([0, 0, 595, 842]) },
            true,
        );
        let found = page_box(&doc, first_page(&doc)).unwrap();
        assert_eq!(found.width, 500.0);
    }

    #[test]
    fn test_annotations_land_in_pdf_coordinates() {
        let mut doc = build(
            Dictionary::new(),
            dictionary! { "MediaBox" => rect([0, 0, 200, 400]) },
            true,
        );
        let links = vec![Link {
            uri: "https://example.com/a".to_string(),
            rect: SizedBox::new(0.25, 0.5, 0.1, 0.05),
        }];

        assert_eq!(add_link_annotations(&mut doc, &links).unwrap(), 1);

        let page = doc.get_dictionary(first_page(&doc)).unwrap();
        let annots = page.get(b"Annots").unwrap().as_array().unwrap();
        assert_eq!(annots.len(), 1);
        let annot = doc
            .get_dictionary(annots[0].as_reference().unwrap())
            .unwrap();
        let rect: Vec<f64> = annot
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| number(o).unwrap())
            .collect();
        // x: 0.25*200, y: 400 - 0.5*200 - 0.05*200
        let expected = [50.0, 290.0, 70.0, 300.0];
        for (got, want) in rect.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-3, "{:?}", rect);
        }
        let action = annot.get(b"A").unwrap().as_dict().unwrap();
        assert_eq!(action.get(b"URI").unwrap().as_str().unwrap(), b"https://example.com/a");
    }

    #[test]
    fn test_existing_annotations_are_kept() {
        let mut doc = build(
            dictionary! { "Annots" => vec![Object::Null] },
            dictionary! { "MediaBox" => rect([0, 0, 200, 400]) },
            true,
        );
        let links = vec![Link {
            uri: "mailto:me@example.com".to_string(),
            rect: SizedBox::new(0.0, 0.0, 0.5, 0.1),
        }];
        add_link_annotations(&mut doc, &links).unwrap();

        let page = doc.get_dictionary(first_page(&doc)).unwrap();
        assert_eq!(page.get(b"Annots").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_no_pages_is_an_error() {
        let mut doc = build(
            Dictionary::new(),
            dictionary! { "MediaBox" => rect([0, 0, 200, 400]) },
            false,
        );
        assert!(matches!(
            add_link_annotations(&mut doc, &[]),
            Err(ExportError::EmptyPdf)
        ));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdf").join("acme").join("cv.pdf");
        let mut doc = build(
            Dictionary::new(),
            dictionary! { "MediaBox" => rect([0, 0, 200, 400]) },
            true,
        );
        save(&mut doc, &path).unwrap();
        assert!(path.exists());
        let reloaded = Document::load(&path).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }
}
