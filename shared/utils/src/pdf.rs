//! Printable MRF form.
//!
//! A4 pages drawn with the standard Helvetica fonts: a navy header band with
//! the reference number and date, requester and work detail sections, the
//! materials table (continued on further pages when it overflows), remarks
//! and a page footer.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use mrf_models::{MaterialRequest, MaterialRequestLine};

use crate::error::{MrfError, MrfResult};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 40;
const BOTTOM_LIMIT: i64 = 70;
const ROW_HEIGHT: i64 = 16;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Materials table columns: title, x offset, max characters.
const TABLE_COLUMNS: [(&str, i64, usize); 6] = [
    ("No.", 44, 4),
    ("Description", 72, 38),
    ("OEM/Model", 290, 17),
    ("Part Number", 392, 16),
    ("Qty", 488, 8),
    ("Unit", 528, 7),
];

#[derive(Default)]
struct Page {
    ops: Vec<Operation>,
}

impl Page {
    fn fill_color(&mut self, r: f32, g: f32, b: f32) {
        self.ops.push(Operation::new(
            "rg",
            vec![Object::Real(r.into()), Object::Real(g.into()), Object::Real(b.into())],
        ));
    }

    fn rect(&mut self, x: i64, y: i64, w: i64, h: i64) {
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), w.into(), h.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn rule(&mut self, y: i64) {
        self.ops.push(Operation::new("w", vec![Object::Real(0.5f32.into())]));
        self.ops.push(Operation::new("m", vec![MARGIN.into(), y.into()]));
        self.ops.push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn text(&mut self, font: &str, size: i64, x: i64, y: i64, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(printable(text))],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn label_value(&mut self, x: i64, y: i64, label: &str, value: &str) {
        self.text(BOLD, 9, x, y, label);
        self.text(REGULAR, 9, x + 90, y, &truncate(value, 32));
    }
}

/// Lays out pages top to bottom, breaking before the bottom margin.
struct Layout {
    pages: Vec<Page>,
    y: i64,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Starts a new page unless `height` still fits on this one.
    fn reserve(&mut self, height: i64) -> bool {
        if self.y - height < BOTTOM_LIMIT {
            self.pages.push(Page::default());
            self.y = PAGE_HEIGHT - MARGIN;
            true
        } else {
            false
        }
    }

    fn section(&mut self, title: &str) {
        self.reserve(40);
        self.y -= 22;
        let y = self.y;
        let page = self.page();
        page.fill_color(0.0, 0.125, 0.357);
        page.text(BOLD, 11, MARGIN, y, title);
        page.fill_color(0.0, 0.0, 0.0);
        page.rule(y - 4);
        self.y -= 8;
    }

    fn line(&mut self, font: &str, size: i64, x: i64, text: &str) {
        self.reserve(ROW_HEIGHT);
        self.y -= ROW_HEIGHT;
        let y = self.y;
        self.page().text(font, size, x, y, text);
    }
}

pub fn render_request_pdf(
    request: &MaterialRequest,
    lines: &[MaterialRequestLine],
    generated_on: NaiveDate,
) -> MrfResult<Vec<u8>> {
    let mut layout = Layout::new();

    draw_header_band(&mut layout, request);
    draw_requester(&mut layout, request);
    draw_work_details(&mut layout, request);
    draw_materials(&mut layout, lines);

    if let Some(remarks) = request.remarks.as_deref().filter(|r| !r.trim().is_empty()) {
        layout.section("REMARKS");
        for chunk in wrap(remarks, 95) {
            layout.line(REGULAR, 9, MARGIN, &chunk);
        }
    }

    let total = layout.pages.len();
    for (index, page) in layout.pages.iter_mut().enumerate() {
        page.rule(50);
        page.text(
            REGULAR,
            8,
            MARGIN,
            36,
            &format!(
                "{} - generated {} - page {} of {}",
                request.mrf_number,
                generated_on.format("%d/%m/%Y"),
                index + 1,
                total
            ),
        );
    }

    build_document(layout.pages)
}

fn draw_header_band(layout: &mut Layout, request: &MaterialRequest) {
    let page = layout.page();
    page.fill_color(0.0, 0.125, 0.357);
    page.rect(0, PAGE_HEIGHT - 80, PAGE_WIDTH, 80);
    page.fill_color(1.0, 1.0, 1.0);
    page.text(BOLD, 18, MARGIN, PAGE_HEIGHT - 38, "MATERIAL REQUEST FORM");
    page.text(BOLD, 11, MARGIN, PAGE_HEIGHT - 62, &format!("MRF No: {}", request.mrf_number));
    page.text(
        REGULAR,
        11,
        PAGE_WIDTH - 190,
        PAGE_HEIGHT - 62,
        &format!("Date: {}", request.request_date.format("%d/%m/%Y")),
    );
    page.fill_color(0.0, 0.0, 0.0);
    layout.y = PAGE_HEIGHT - 90;
}

fn draw_requester(layout: &mut Layout, request: &MaterialRequest) {
    layout.section("REQUESTER INFORMATION");
    let rows = [
        ("Name:", request.requester_name(), "User ID:", request.user_code.clone()),
        (
            "Designation:",
            request.designation.clone(),
            "Extension:",
            request.office_extension.clone(),
        ),
    ];
    for (left_label, left, right_label, right) in rows {
        layout.reserve(ROW_HEIGHT);
        layout.y -= ROW_HEIGHT;
        let y = layout.y;
        let page = layout.page();
        page.label_value(MARGIN, y, left_label, &left);
        page.label_value(310, y, right_label, &right);
    }
}

fn draw_work_details(layout: &mut Layout, request: &MaterialRequest) {
    layout.section("WORK DETAILS");
    let rows = [
        ("Location:", request.asset.clone(), "Unit Tag:", request.unit_tag.clone()),
        (
            "Discipline:",
            request.discipline.clone(),
            "Category:",
            request.material_category.clone(),
        ),
        (
            "Criticality:",
            request.criticality.to_string(),
            "Work Order:",
            request.work_order_no.clone(),
        ),
        (
            "Order Type:",
            request.work_order_type.clone(),
            "Type:",
            request.service_material.clone(),
        ),
    ];
    for (left_label, left, right_label, right) in rows {
        layout.reserve(ROW_HEIGHT);
        layout.y -= ROW_HEIGHT;
        let y = layout.y;
        let page = layout.page();
        page.label_value(MARGIN, y, left_label, &left);
        page.label_value(310, y, right_label, &right);
    }

    layout.line(BOLD, 9, MARGIN, "Reason for Request:");
    for chunk in wrap(&request.reason, 95) {
        layout.line(REGULAR, 9, MARGIN, &chunk);
    }
}

fn draw_table_header(layout: &mut Layout) {
    layout.y -= ROW_HEIGHT + 2;
    let y = layout.y;
    let page = layout.page();
    page.fill_color(0.85, 0.87, 0.91);
    page.rect(MARGIN, y - 4, PAGE_WIDTH - 2 * MARGIN, ROW_HEIGHT);
    page.fill_color(0.0, 0.0, 0.0);
    for (title, x, _) in TABLE_COLUMNS {
        page.text(BOLD, 9, x, y, title);
    }
}

fn draw_materials(layout: &mut Layout, lines: &[MaterialRequestLine]) {
    layout.section("MATERIALS");
    layout.reserve(ROW_HEIGHT * 2);
    draw_table_header(layout);

    for line in lines {
        if layout.reserve(ROW_HEIGHT) {
            draw_table_header(layout);
        }
        layout.y -= ROW_HEIGHT;
        let y = layout.y;
        let cells = [
            line.line_no.to_string(),
            line.material_description.clone(),
            line.oem_model.clone(),
            line.part_number.clone(),
            format_quantity(line.quantity),
            line.quantity_unit.clone(),
        ];
        let page = layout.page();
        for ((_, x, width), value) in TABLE_COLUMNS.iter().zip(cells.iter()) {
            page.text(REGULAR, 9, *x, y, &truncate(value, *width));
        }
    }
}

fn build_document(pages: Vec<Page>) -> MrfResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content { operations: page.ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| MrfError::export(format!("Failed to write PDF: {}", e)))?;
    Ok(buffer)
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{:.2}", quantity)
    }
}

/// Standard Type1 fonts only cover ASCII reliably.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars.saturating_sub(2)).collect();
        cut.push_str("..");
        cut
    }
}

fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mrf_models::{Criticality, QuotationStatus, RequestStatus, WorkflowStage};
    use uuid::Uuid;

    fn request() -> MaterialRequest {
        let now = Utc::now();
        MaterialRequest {
            id: Uuid::new_v4(),
            mrf_number: "LAR-MTCE-007-2025".into(),
            request_date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            user_id: None,
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            user_code: "OB1234".into(),
            designation: "Technician".into(),
            office_extension: "2210".into(),
            asset: "Ebocha".into(),
            unit_tag: "P-101".into(),
            discipline: "MECHANICAL".into(),
            material_category: "Spares".into(),
            criticality: Criticality::High,
            work_order_no: "WO-88".into(),
            work_order_type: "Corrective".into(),
            reason: "Pump seal leaking at the discharge end, replacement required".into(),
            service_material: "Material".into(),
            remarks: Some("Deliver to Ebocha store".into()),
            status: RequestStatus::Pending,
            status_notes: None,
            internal_reference: None,
            action_pending: None,
            vendor_name: None,
            blanket_order_number: None,
            call_off_number: None,
            purchase_order_no: None,
            quotation_reference: None,
            quotation_status: QuotationStatus::NotSubmitted,
            quotation_approval_date: None,
            quotation_amount_usd: None,
            quotation_amount_eur: None,
            quotation_amount_ngn: None,
            estimated_delivery_date: None,
            actual_delivery_date: None,
            notes: None,
            other: None,
            workflow_stage: WorkflowStage::MrfCreated,
            approved_by_supervisor: None,
            approved_date_supervisor: None,
            supervisor_comments: None,
            approved_by_manager: None,
            approved_date_manager: None,
            manager_comments: None,
            approved_by_area_manager: None,
            approved_date_area_manager: None,
            area_manager_comments: None,
            has_blanket_order: false,
            blanket_order_ref: None,
            proforma_ref: None,
            proforma_amount_usd: None,
            proforma_amount_ngn: None,
            proforma_date: None,
            compliance_status: None,
            compliance_notes: None,
            rejection_reason: None,
            rejection_stage: None,
            rescheduled_date: None,
            reschedule_reason: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn lines(request_id: Uuid, count: usize) -> Vec<MaterialRequestLine> {
        (0..count)
            .map(|i| MaterialRequestLine {
                id: Uuid::new_v4(),
                request_id,
                line_no: i as i32 + 1,
                material_description: format!("Mechanical seal kit {}", i + 1),
                oem_model: "Flowserve".into(),
                part_number: format!("FS-{:04}", i),
                quantity: 2.0,
                quantity_unit: "pcs".into(),
                received_quantity: 0.0,
            })
            .collect()
    }

    fn page_text(doc: &Document) -> String {
        doc.get_pages()
            .values()
            .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn test_single_page_form() {
        let request = request();
        let bytes = render_request_pdf(
            &request,
            &lines(request.id, 3),
            NaiveDate::from_ymd_opt(2025, 4, 3).unwrap(),
        )
        .unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let text = page_text(&doc);
        assert!(text.contains("MRF No: LAR-MTCE-007-2025"));
        assert!(text.contains("Date: 02/04/2025"));
        assert!(text.contains("Mechanical seal kit 3"));
        assert!(text.contains("Deliver to Ebocha store"));
        assert!(text.contains("page 1 of 1"));
    }

    #[test]
    fn test_long_material_list_continues_on_next_page() {
        let request = request();
        let bytes = render_request_pdf(
            &request,
            &lines(request.id, 80),
            NaiveDate::from_ymd_opt(2025, 4, 3).unwrap(),
        )
        .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages().len();
        assert!(pages >= 2);
        let text = page_text(&doc);
        assert!(text.contains("Mechanical seal kit 80"));
        assert!(text.contains(&format!("page {} of {}", pages, pages)));
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert!(wrap("   ", 10).is_empty());
        assert_eq!(truncate("abcdefgh", 6), "abcd..");
        assert_eq!(truncate("abc", 6), "abc");
        assert_eq!(printable("Caf\u{e9} 5\u{b0}C"), "Caf? 5?C");
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(2.5), "2.50");
    }
}
