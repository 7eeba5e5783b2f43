use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rect, Rgb,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use super::layout::{Borders, DrawOp, Page, PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::{ReportError, ReportResult};

const LAYER_NAME: &str = "Layer 1";
const BORDER_THICKNESS: f32 = 0.6;

/// Render laid-out pages into PDF bytes.
///
/// `font_path` selects a TrueType font; the builtin Helvetica is used when it
/// is `None`. A configured font that cannot be read fails the whole render.
pub fn render_pdf(title: &str, pages: &[Page], font_path: Option<&Path>) -> ReportResult<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
    let font = load_font(&doc, font_path)?;

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) =
                doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
            doc.get_page(page_index).get_layer(layer_index)
        };
        for op in &page.ops {
            draw(&layer, &font, op);
        }
    }

    let bytes = doc.save_to_bytes().map_err(|e| ReportError::Render {
        message: e.to_string(),
    })?;
    info!(pages = pages.len(), bytes = bytes.len(), "Report rendered");
    Ok(bytes)
}

fn load_font(doc: &PdfDocumentReference, font_path: Option<&Path>) -> ReportResult<IndirectFontRef> {
    let Some(path) = font_path else {
        return doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Render {
                message: e.to_string(),
            });
    };

    let unavailable = |message: String| ReportError::ResourceUnavailable {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
    let font = doc
        .add_external_font(BufReader::new(file))
        .map_err(|e| unavailable(e.to_string()))?;
    debug!(path = %path.display(), "Loaded report font");
    Ok(font)
}

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

/// Layout `y` grows downwards from the top; PDF `y` grows upwards.
fn flip(y: f32) -> Mm {
    Mm(PAGE_HEIGHT - y)
}

fn segment(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x1), flip(y1)), false),
            (Point::new(Mm(x2), flip(y2)), false),
        ],
        is_closed: false,
    });
}

fn draw(layer: &PdfLayerReference, font: &IndirectFontRef, op: &DrawOp) {
    match op {
        DrawOp::Text { x, y, size, text } => {
            layer.set_fill_color(rgb([0, 0, 0]));
            layer.use_text(text.as_str(), *size, Mm(*x), flip(*y), font);
        }
        DrawOp::Cell {
            x,
            y,
            width,
            height,
            fill,
            borders,
        } => {
            if let Some(color) = fill {
                layer.set_fill_color(rgb(*color));
                layer.add_rect(
                    Rect::new(Mm(*x), flip(y + height), Mm(x + width), flip(*y))
                        .with_mode(PaintMode::Fill),
                );
            }
            draw_borders(layer, *x, *y, *width, *height, *borders);
        }
        DrawOp::Rule { x1, x2, y } => {
            layer.set_outline_color(rgb([0, 0, 0]));
            layer.set_outline_thickness(BORDER_THICKNESS);
            segment(layer, *x1, *y, *x2, *y);
        }
    }
}

fn draw_borders(layer: &PdfLayerReference, x: f32, y: f32, width: f32, height: f32, borders: Borders) {
    layer.set_outline_color(rgb([0, 0, 0]));
    layer.set_outline_thickness(BORDER_THICKNESS);

    let (right, bottom) = (x + width, y + height);
    if borders.top {
        segment(layer, x, y, right, y);
    }
    if borders.bottom {
        segment(layer, x, bottom, right, bottom);
    }
    if borders.left {
        segment(layer, x, y, x, bottom);
    }
    if borders.right {
        segment(layer, right, y, right, bottom);
    }
}
