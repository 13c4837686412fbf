//! Helpers shared by unit tests.

use lopdf::{
    Document, Object, ObjectId, Stream,
    content::{Content, Operation},
    dictionary,
};

/// Build a PDF with `page_count` pages. Page `n` (1-based) draws the text
/// `Page n`. If `padding` is non-zero, a metadata stream of that many bytes is
/// attached to the catalog, which is a cheap way to make a large file.
pub fn make_pdf(page_count: usize, padding: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = vec![];
    for n in 1..=page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {n}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("test content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if padding > 0 {
        let padding_id: ObjectId = doc.add_object(Stream::new(
            dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
            vec![b' '; padding],
        ));
        catalog.set("Metadata", padding_id);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut bytes = vec![];
    doc.save_to(&mut bytes).expect("test PDF should save");
    bytes
}

/// Return the page labels (`Page n`) drawn on each page of a PDF, in order.
pub fn page_labels(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).expect("test PDF should load");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc
                .get_page_content(page_id)
                .expect("test page should have content");
            let content = String::from_utf8_lossy(&content);
            let start = content.find("(Page ").expect("page label should be present");
            let end = start + content[start..].find(')').expect("label should close");
            content[start + 1..end].to_owned()
        })
        .collect()
}
